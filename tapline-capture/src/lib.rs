//! Packet capture library for tapline
//!
//! This crate wraps a capture driver in an owned, state-checked session and
//! feeds captured frames to listeners, raw or decoded.
//!
//! ## Features
//!
//! - **Sessions**: `Created -> Activated -> Looping -> Closed`, with closed
//!   handles rejected at the API boundary
//! - **BPF Filters**: compile / attach / free lifecycle, compiling without a
//!   capture, plus expression builders
//! - **Capture files**: read with `open_offline`, write with `dump_open`
//! - **Dispatch**: blocking loops on the calling thread, cooperative break
//! - **Drivers**: libpcap (live devices and savefiles) and an in-memory replay
//!   driver for tests
//! - **Statistics** and **interface enumeration**
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tapline_capture::{filters, CaptureDispatcher, CaptureSession, FramePayload};
//! use tapline_core::FrameMetadata;
//! use tapline_packet::Registry;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut session = CaptureSession::open_live("eth0", 65535, true, 1000)?;
//! session.set_filter(&filters::tcp_port(80), true)?;
//!
//! let dispatcher = CaptureDispatcher::new(Arc::new(Registry::with_defaults()));
//! let mut seen = 0usize;
//! dispatcher.run(
//!     &mut session,
//!     10,
//!     |seen: &mut usize, meta: &FrameMetadata, payload: FramePayload<'_>| {
//!         *seen += 1;
//!         println!("{} bytes: {:?}", meta.cap_len, payload.as_stack().map(|s| s.kinds()));
//!     },
//!     &mut seen,
//! )?;
//!
//! session.close();
//! # Ok(())
//! # }
//! ```

pub mod bpf;
pub mod dispatcher;
pub mod driver;
pub mod dump;
pub mod filters;
pub mod interface;
#[cfg(feature = "libpcap")]
pub mod pcap_driver;
pub mod replay;
pub mod session;
pub mod stats;

// Re-export main types
pub use bpf::CompiledFilter;
pub use dispatcher::{CaptureDispatcher, DeliveryMode, FramePayload};
pub use driver::{
    Activation, CaptureHandle, DriverStats, FilterProgram, FrameDumper, NextFrame, NETMASK_UNKNOWN,
};
pub use dump::CaptureDump;
pub use interface::{default_interface, get_interface, list_interfaces, InterfaceAddress, InterfaceInfo};
#[cfg(feature = "libpcap")]
pub use pcap_driver::PcapHandle;
pub use replay::{ReplayFeed, ReplayHandle};
pub use session::{
    BreakHandle, CaptureConfig, CaptureSession, LoopExit, LoopOutcome, SessionState, BREAK_CODE,
};
pub use stats::{CaptureStats, StatsAccumulator};
