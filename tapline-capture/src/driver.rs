//! Capture driver boundary
//!
//! A [`CaptureHandle`] is the opaque device a [`CaptureSession`] owns: it
//! opens, activates, compiles and installs filters, yields raw frames and
//! closes. The session layers lifecycle checks and cancellation on top, so
//! drivers only need to do what the device itself does.
//!
//! [`CaptureSession`]: crate::session::CaptureSession

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tapline_core::{FrameMetadata, LinkType, Result};

use crate::session::CaptureConfig;

/// Netmask passed to the compiler when the capture network is unknown
pub const NETMASK_UNKNOWN: u32 = 0xffff_ffff;

/// Outcome of a successful activation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Activation {
    /// Non-fatal conditions the driver reported, e.g. promiscuous mode refused
    pub warnings: Vec<String>,
}

impl Activation {
    pub fn with_warning<S: Into<String>>(mut self, warning: S) -> Self {
        self.warnings.push(warning.into());
        self
    }

    /// Status code in the driver's convention: 0 success, 1 warning
    pub fn code(&self) -> i32 {
        if self.warnings.is_empty() {
            0
        } else {
            1
        }
    }
}

/// Counters reported by the driver
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverStats {
    /// Frames that passed the filter
    pub received: u32,
    /// Frames dropped for lack of buffer space
    pub dropped: u32,
    /// Frames dropped by the network interface
    pub if_dropped: u32,
}

/// Result of asking the driver for the next frame
#[derive(Debug)]
pub enum NextFrame<'a> {
    /// A captured frame; the bytes are valid until the next call
    Frame(FrameMetadata, &'a [u8]),
    /// The buffer timeout elapsed with nothing to deliver
    Timeout,
    /// The source has no more frames (end of a capture file)
    Eof,
}

/// A filter program produced by [`CaptureHandle::compile`]
///
/// Installing a program hands the driver its own reference, so the
/// program's owner may release it afterwards without affecting capture.
pub trait FilterProgram: Send + Sync {
    /// Source expression the program was compiled from
    fn expression(&self) -> &str;

    /// Whether the optimizer ran at compile time
    fn optimize(&self) -> bool;

    /// Netmask the program was compiled with
    fn netmask(&self) -> u32;

    /// Run the program against one frame in user space
    fn matches(&self, frame: &[u8]) -> bool;
}

impl fmt::Debug for dyn FilterProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterProgram")
            .field("expression", &self.expression())
            .field("optimize", &self.optimize())
            .field("netmask", &format_args!("{:#010x}", self.netmask()))
            .finish()
    }
}

/// Size of the classic capture-file header
pub const SAVEFILE_HEADER_LEN: u64 = 24;

/// Size of the per-record header in a classic capture file
pub const SAVEFILE_RECORD_HEADER_LEN: u64 = 16;

/// Writer for the driver's capture-file format
pub trait FrameDumper: Send {
    /// Append one frame record
    fn write(&mut self, meta: &FrameMetadata, frame: &[u8]) -> Result<()>;

    /// Push buffered records to the file
    fn flush(&mut self) -> Result<()>;

    /// Current offset in the file, header included
    fn position(&self) -> u64;

    /// Flush and release the file. Must be idempotent.
    fn close(&mut self) -> Result<()>;
}

/// Primitive operations of a capture device
pub trait CaptureHandle: Send {
    /// Short description of the source (interface name or file path)
    fn source(&self) -> &str;

    /// Open the device with `config`. Called exactly once.
    fn activate(&mut self, config: &CaptureConfig) -> Result<Activation>;

    /// Link-layer type of the activated device
    fn link_type(&self) -> Result<LinkType>;

    /// Snapshot length in effect: the configured value for a device, the
    /// value recorded in the file header for a capture file
    fn snaplen(&self) -> Result<i32>;

    /// Compile `expression` for this device's link type
    fn compile(
        &mut self,
        expression: &str,
        optimize: bool,
        netmask: u32,
    ) -> Result<Arc<dyn FilterProgram>>;

    /// Install `program`; frames it rejects are never returned by `next_frame`
    fn set_filter(&mut self, program: Arc<dyn FilterProgram>) -> Result<()>;

    /// Block until a frame arrives, the buffer timeout expires or the source ends
    fn next_frame(&mut self) -> Result<NextFrame<'_>>;

    /// Inject a raw frame
    fn send(&mut self, frame: &[u8]) -> Result<()>;

    fn stats(&mut self) -> Result<DriverStats>;

    /// Open a capture file at `path` for this device's link type and snaplen
    fn dump_open(&mut self, path: &Path) -> Result<Box<dyn FrameDumper>>;

    /// Whether the underlying descriptor is still usable
    fn is_open(&self) -> bool;

    /// Release the descriptor. Must be idempotent.
    fn close(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activation_code() {
        let clean = Activation::default();
        assert_eq!(clean.code(), 0);

        let warned = Activation::default().with_warning("promiscuous mode not supported");
        assert_eq!(warned.code(), 1);
        assert_eq!(warned.warnings.len(), 1);
    }
}
