//! Per-protocol header codecs and the closed set of layer variants
//!
//! Every protocol header implements [`HeaderCodec`]. [`Header`] is the tagged
//! union the stack stores, and [`LayerKind`] names a codec without carrying a
//! header, which is what the dispatch table maps discriminators to.

use bytes::{Bytes, BytesMut};
use std::fmt;
use tapline_core::{Error, Result};

use crate::arp::ArpHeader;
use crate::ethernet::EthernetHeader;
use crate::icmp::IcmpHeader;
use crate::ipv4::Ipv4Header;
use crate::ipv6::Ipv6Header;
use crate::registry::Discriminator;
use crate::tcp::TcpHeader;
use crate::udp::UdpHeader;
use crate::vlan::Dot1qHeader;

/// Decode/encode contract shared by all protocol headers
pub trait HeaderCodec: Sized {
    /// Protocol name used in errors and logs
    const PROTOCOL: &'static str;

    /// Smallest valid encoded header
    const MIN_LEN: usize;

    /// Decode the header at the start of `buf`.
    ///
    /// Fails with `TruncatedHeader` when `buf` is shorter than the header and
    /// with `MalformedHeader` when an internal length field is inconsistent.
    fn decode(buf: &Bytes) -> Result<Self>;

    /// Bytes this header occupies on the wire
    fn header_len(&self) -> usize;

    /// Length of this layer (header included) as declared by the header
    /// itself, for protocols that carry one
    fn declared_len(&self) -> Option<usize> {
        None
    }

    /// Append the header to `out`.
    ///
    /// Fields wider than their wire width are masked, never widened.
    fn encode(&self, out: &mut BytesMut);
}

/// Fail with `TruncatedHeader` unless `available >= required`
pub(crate) fn ensure_len(protocol: &'static str, required: usize, available: usize) -> Result<()> {
    if available < required {
        return Err(Error::truncated(protocol, required, available));
    }
    Ok(())
}

/// Option bytes zero-padded to a multiple of four, truncated to `max`
pub(crate) fn pad_to_words(options: &Bytes, max: usize) -> Bytes {
    let len = options.len().min(max);
    let padded = (len + 3) / 4 * 4;
    if padded == options.len() {
        return options.clone();
    }
    let mut out = BytesMut::with_capacity(padded);
    out.extend_from_slice(&options[..len]);
    out.resize(padded, 0);
    out.freeze()
}

/// A codec, named without a header value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    Ethernet,
    Dot1q,
    Arp,
    Ipv4,
    Ipv6,
    Icmp,
    Tcp,
    Udp,
}

impl LayerKind {
    pub fn name(self) -> &'static str {
        match self {
            LayerKind::Ethernet => EthernetHeader::PROTOCOL,
            LayerKind::Dot1q => Dot1qHeader::PROTOCOL,
            LayerKind::Arp => ArpHeader::PROTOCOL,
            LayerKind::Ipv4 => Ipv4Header::PROTOCOL,
            LayerKind::Ipv6 => Ipv6Header::PROTOCOL,
            LayerKind::Icmp => IcmpHeader::PROTOCOL,
            LayerKind::Tcp => TcpHeader::PROTOCOL,
            LayerKind::Udp => UdpHeader::PROTOCOL,
        }
    }

    pub fn min_len(self) -> usize {
        match self {
            LayerKind::Ethernet => EthernetHeader::MIN_LEN,
            LayerKind::Dot1q => Dot1qHeader::MIN_LEN,
            LayerKind::Arp => ArpHeader::MIN_LEN,
            LayerKind::Ipv4 => Ipv4Header::MIN_LEN,
            LayerKind::Ipv6 => Ipv6Header::MIN_LEN,
            LayerKind::Icmp => IcmpHeader::MIN_LEN,
            LayerKind::Tcp => TcpHeader::MIN_LEN,
            LayerKind::Udp => UdpHeader::MIN_LEN,
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One decoded protocol header
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Header {
    Ethernet(EthernetHeader),
    Dot1q(Dot1qHeader),
    Arp(ArpHeader),
    Ipv4(Ipv4Header),
    Ipv6(Ipv6Header),
    Icmp(IcmpHeader),
    Tcp(TcpHeader),
    Udp(UdpHeader),
}

macro_rules! with_header {
    ($header:expr, $h:ident => $body:expr) => {
        match $header {
            Header::Ethernet($h) => $body,
            Header::Dot1q($h) => $body,
            Header::Arp($h) => $body,
            Header::Ipv4($h) => $body,
            Header::Ipv6($h) => $body,
            Header::Icmp($h) => $body,
            Header::Tcp($h) => $body,
            Header::Udp($h) => $body,
        }
    };
}

impl Header {
    /// Decode a header of the given kind from the start of `buf`
    pub fn decode(kind: LayerKind, buf: &Bytes) -> Result<Self> {
        Ok(match kind {
            LayerKind::Ethernet => Header::Ethernet(EthernetHeader::decode(buf)?),
            LayerKind::Dot1q => Header::Dot1q(Dot1qHeader::decode(buf)?),
            LayerKind::Arp => Header::Arp(ArpHeader::decode(buf)?),
            LayerKind::Ipv4 => Header::Ipv4(Ipv4Header::decode(buf)?),
            LayerKind::Ipv6 => Header::Ipv6(Ipv6Header::decode(buf)?),
            LayerKind::Icmp => Header::Icmp(IcmpHeader::decode(buf)?),
            LayerKind::Tcp => Header::Tcp(TcpHeader::decode(buf)?),
            LayerKind::Udp => Header::Udp(UdpHeader::decode(buf)?),
        })
    }

    pub fn kind(&self) -> LayerKind {
        match self {
            Header::Ethernet(_) => LayerKind::Ethernet,
            Header::Dot1q(_) => LayerKind::Dot1q,
            Header::Arp(_) => LayerKind::Arp,
            Header::Ipv4(_) => LayerKind::Ipv4,
            Header::Ipv6(_) => LayerKind::Ipv6,
            Header::Icmp(_) => LayerKind::Icmp,
            Header::Tcp(_) => LayerKind::Tcp,
            Header::Udp(_) => LayerKind::Udp,
        }
    }

    pub fn header_len(&self) -> usize {
        with_header!(self, h => h.header_len())
    }

    pub fn declared_len(&self) -> Option<usize> {
        with_header!(self, h => h.declared_len())
    }

    pub fn encode(&self, out: &mut BytesMut) {
        with_header!(self, h => h.encode(out))
    }

    /// Field values that select the next layer's codec, most specific first
    pub fn discriminators(&self) -> [Option<Discriminator>; 2] {
        match self {
            Header::Ethernet(h) => [Some(Discriminator::EtherType(h.ether_type)), None],
            Header::Dot1q(h) => [Some(Discriminator::EtherType(h.ether_type)), None],
            Header::Ipv4(h) if h.is_trailing_fragment() => [None, None],
            Header::Ipv4(h) => [Some(Discriminator::IpProtocol(h.protocol)), None],
            Header::Ipv6(h) => [Some(Discriminator::IpProtocol(h.next_header)), None],
            Header::Tcp(h) => [
                Some(Discriminator::Port(h.destination_port)),
                Some(Discriminator::Port(h.source_port)),
            ],
            Header::Udp(h) => [
                Some(Discriminator::Port(h.destination_port)),
                Some(Discriminator::Port(h.source_port)),
            ],
            Header::Arp(_) | Header::Icmp(_) => [None, None],
        }
    }
}

macro_rules! impl_from_header {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for Header {
                fn from(header: $ty) -> Self {
                    Header::$variant(header)
                }
            }
        )*
    };
}

impl_from_header!(
    Ethernet(EthernetHeader),
    Dot1q(Dot1qHeader),
    Arp(ArpHeader),
    Ipv4(Ipv4Header),
    Ipv6(Ipv6Header),
    Icmp(IcmpHeader),
    Tcp(TcpHeader),
    Udp(UdpHeader),
);
