//! Error types for tapline

use thiserror::Error;

/// Result type alias for tapline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for tapline
///
/// Codec failures (`TruncatedHeader`, `MalformedHeader`) are per-frame: a
/// capture loop reports them for the offending frame and keeps going.
/// Everything else belongs to the operation that raised it.
#[derive(Error, Debug)]
pub enum Error {
    /// Byte region shorter than the protocol's minimum header
    #[error("{protocol} header truncated: need {required} bytes, have {available}")]
    TruncatedHeader {
        protocol: &'static str,
        required: usize,
        available: usize,
    },

    /// A length field inside the header disagrees with the buffer
    #[error("malformed {protocol} header: {reason}")]
    MalformedHeader {
        protocol: &'static str,
        reason: String,
    },

    /// No codec registered for a discriminator value.
    ///
    /// Decoding never returns this; the remainder becomes an opaque payload.
    #[error("no decoder registered for {0}")]
    UnsupportedDiscriminator(String),

    /// The driver rejected a filter expression
    #[error("filter compile error: {0}")]
    FilterCompile(String),

    /// A packet could not be assembled from the requested layers
    #[error("packet construction error: {0}")]
    PacketConstruction(String),

    /// Operation on a closed capture session
    #[error("capture session is closed")]
    SessionClosed,

    /// Operation on a freed compiled filter
    #[error("compiled filter has been freed")]
    FilterClosed,

    /// Operation on a closed capture-file writer
    #[error("capture file writer is closed")]
    DumperClosed,

    /// Operation not allowed in the session's current state
    #[error("cannot {operation} while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },

    /// Opaque error passed through from the capture driver
    #[error("driver error ({code}): {message}")]
    Driver { code: i32, message: String },

    /// Operation not available on this platform or driver build
    #[error("unsupported on this platform: {0}")]
    PlatformUnsupported(String),

    /// Address string or byte slice could not be parsed
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Interface not found
    #[error("interface '{0}' not found")]
    InterfaceNotFound(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a truncated-header error
    pub fn truncated(protocol: &'static str, required: usize, available: usize) -> Self {
        Error::TruncatedHeader {
            protocol,
            required,
            available,
        }
    }

    /// Create a malformed-header error with a custom message
    pub fn malformed<S: Into<String>>(protocol: &'static str, reason: S) -> Self {
        Error::MalformedHeader {
            protocol,
            reason: reason.into(),
        }
    }

    /// Create a driver passthrough error
    pub fn driver<S: Into<String>>(code: i32, message: S) -> Self {
        Error::Driver {
            code,
            message: message.into(),
        }
    }

    /// Create an invalid-state error
    pub fn invalid_state<S: ToString>(operation: &'static str, state: S) -> Self {
        Error::InvalidState {
            operation,
            state: state.to_string(),
        }
    }

    /// True for errors scoped to a single frame's decode
    pub fn is_per_frame(&self) -> bool {
        matches!(
            self,
            Error::TruncatedHeader { .. } | Error::MalformedHeader { .. }
        )
    }

    /// True for errors reporting a released handle
    pub fn is_closed_handle(&self) -> bool {
        matches!(self, Error::SessionClosed | Error::FilterClosed | Error::DumperClosed)
    }
}
