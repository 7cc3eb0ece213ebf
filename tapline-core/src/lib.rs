//! tapline core library
//!
//! Fundamental value types shared by the codec and capture crates: the
//! error taxonomy, fixed-width address types, named protocol numbers with
//! their registries, link types and per-frame capture metadata.

pub mod address;
pub mod error;
pub mod frame;
pub mod link;
pub mod named;
pub mod numbers;

// Re-export commonly used types
pub use address::{Inet4Address, Inet6Address, MacAddress};
pub use error::{Error, Result};
pub use frame::FrameMetadata;
pub use link::LinkType;
pub use named::{NamedNumber, NamedNumberRegistry, NumberFamily};
pub use numbers::{EtherType, EtherTypes, IpProtocol, IpProtocols, Port, Ports};
