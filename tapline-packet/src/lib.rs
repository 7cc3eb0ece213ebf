//! Layered packet codec for tapline
//!
//! This crate decodes captured frames into typed, nested header chains and
//! encodes them back into bytes. It includes support for:
//!
//! - **Ethernet II / 802.3** with optional **802.1Q** VLAN tags
//! - **ARP** for Ethernet/IPv4
//! - **IPv4** (options preserved) and the **IPv6** fixed header
//! - **TCP** (options preserved), **UDP** and **ICMP**
//!
//! # Architecture
//!
//! - [`header`] - the [`HeaderCodec`] contract and the [`Header`] tagged union
//! - [`registry`] - discriminator dispatch table and named-number lookups
//! - [`stack`] - [`Packet`] chains and the [`PacketStack`] root
//! - [`builder`] - fluent construction of transmit-ready stacks
//! - [`checksum`] - Internet checksum calculation utilities
//!
//! Decoding dispatches on the discriminator each header exposes (EtherType,
//! IP protocol, port) through a [`Registry`]. A discriminator nobody
//! registered is not an error: the remaining bytes are kept as an opaque
//! payload. Encoding writes every field as stored and never recomputes
//! lengths or checksums unless asked to, so `decode(encode(stack)) == stack`.
//!
//! # Quick Start
//!
//! ```rust
//! use tapline_core::LinkType;
//! use tapline_packet::{PacketStack, Registry};
//!
//! let registry = Registry::with_defaults();
//! let frame = [
//!     0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x88, 0xb5,
//!     0x01, 0x02,
//! ];
//!
//! let stack = PacketStack::decode(&frame, LinkType::Ethernet, &registry).unwrap();
//! assert_eq!(stack.depth(), 1);
//! assert_eq!(stack.application_payload().unwrap().as_ref(), &[0x01, 0x02]);
//! assert_eq!(stack.encode().as_ref(), &frame[..]);
//! ```

pub mod arp;
pub mod builder;
pub mod checksum;
pub mod ethernet;
pub mod header;
pub mod icmp;
pub mod ipv4;
pub mod ipv6;
pub mod registry;
pub mod stack;
pub mod tcp;
pub mod udp;
pub mod vlan;

// Re-export commonly used types for convenience
pub use arp::ArpHeader;
pub use builder::StackBuilder;
pub use checksum::{internet_checksum, transport_checksum};
pub use ethernet::EthernetHeader;
pub use header::{Header, HeaderCodec, LayerKind};
pub use icmp::IcmpHeader;
pub use ipv4::{IpFlags, Ipv4Header};
pub use ipv6::Ipv6Header;
pub use registry::{Discriminator, DispatchTable, Registry};
pub use stack::{Packet, PacketStack, Payload};
pub use tcp::{TcpFlags, TcpHeader};
pub use udp::UdpHeader;
pub use vlan::Dot1qHeader;
