//! Decoded packet chains
//!
//! A [`Packet`] is one protocol header owning its payload: either the next
//! decoded [`Packet`] or the raw bytes nobody could decode. Bytes that follow
//! a layer's declared length inside its region (802.3 padding after a short
//! IPv4 datagram, for example) are kept as that packet's `trailer`, so
//! encoding reproduces the captured frame exactly.
//!
//! [`PacketStack`] is the root of such a chain together with the link type
//! it was decoded under.

use bytes::{Bytes, BytesMut};
use tapline_core::{LinkType, Result};
use tracing::trace;

use crate::arp::ArpHeader;
use crate::checksum::{internet_checksum, transport_checksum, transport_checksum_v6};
use crate::ethernet::EthernetHeader;
use crate::header::{Header, HeaderCodec, LayerKind};
use crate::icmp::IcmpHeader;
use crate::ipv4::Ipv4Header;
use crate::ipv6::Ipv6Header;
use crate::registry::Registry;
use crate::tcp::TcpHeader;
use crate::udp::UdpHeader;
use crate::vlan::Dot1qHeader;

/// Nesting limit; anything deeper is kept opaque
pub const MAX_DEPTH: usize = 16;

/// What follows a header
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// A decoded nested packet
    Packet(Box<Packet>),
    /// Undecoded bytes; empty when the layer carries nothing
    Opaque(Bytes),
}

impl Payload {
    pub fn empty() -> Self {
        Payload::Opaque(Bytes::new())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Payload::Opaque(bytes) if bytes.is_empty())
    }

    pub fn as_packet(&self) -> Option<&Packet> {
        match self {
            Payload::Packet(packet) => Some(packet),
            Payload::Opaque(_) => None,
        }
    }

    pub fn as_packet_mut(&mut self) -> Option<&mut Packet> {
        match self {
            Payload::Packet(packet) => Some(packet),
            Payload::Opaque(_) => None,
        }
    }

    pub fn as_opaque(&self) -> Option<&Bytes> {
        match self {
            Payload::Opaque(bytes) => Some(bytes),
            Payload::Packet(_) => None,
        }
    }

    pub fn encoded_len(&self) -> usize {
        match self {
            Payload::Packet(packet) => packet.encoded_len(),
            Payload::Opaque(bytes) => bytes.len(),
        }
    }

    pub fn encode(&self, out: &mut BytesMut) {
        match self {
            Payload::Packet(packet) => packet.encode(out),
            Payload::Opaque(bytes) => out.extend_from_slice(bytes),
        }
    }
}

impl Default for Payload {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Packet> for Payload {
    fn from(packet: Packet) -> Self {
        Payload::Packet(Box::new(packet))
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Payload::Opaque(bytes)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Opaque(Bytes::from(bytes))
    }
}

/// One header and everything it encloses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub header: Header,
    pub payload: Payload,
    /// Bytes after the declared end of this layer
    pub trailer: Bytes,
}

impl Packet {
    pub fn new(header: impl Into<Header>) -> Self {
        Self {
            header: header.into(),
            payload: Payload::empty(),
            trailer: Bytes::new(),
        }
    }

    pub fn with_payload(mut self, payload: impl Into<Payload>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Decode a packet of `kind` covering all of `buf`, recursing into the
    /// payload through `registry`
    pub fn decode(kind: LayerKind, buf: Bytes, registry: &Registry) -> Result<Self> {
        Self::decode_at_depth(kind, buf, registry, 0)
    }

    fn decode_at_depth(kind: LayerKind, buf: Bytes, registry: &Registry, depth: usize) -> Result<Self> {
        let header = Header::decode(kind, &buf)?;
        let header_len = header.header_len();
        let end = header
            .declared_len()
            .map_or(buf.len(), |declared| declared.min(buf.len()))
            .max(header_len);

        let body = buf.slice(header_len..end);
        let payload = if body.is_empty() {
            Payload::empty()
        } else if depth + 1 >= MAX_DEPTH {
            trace!(layer = %kind, depth, "nesting limit reached, keeping payload opaque");
            Payload::Opaque(body)
        } else {
            match registry.resolve(&header) {
                Some(next) => Self::decode_at_depth(next, body, registry, depth + 1)?.into(),
                None => Payload::Opaque(body),
            }
        };

        Ok(Self {
            header,
            payload,
            trailer: buf.slice(end..),
        })
    }

    pub fn kind(&self) -> LayerKind {
        self.header.kind()
    }

    /// Replace the payload, returning the one it displaced
    pub fn set_payload(&mut self, payload: impl Into<Payload>) -> Payload {
        std::mem::replace(&mut self.payload, payload.into())
    }

    pub fn inner(&self) -> Option<&Packet> {
        self.payload.as_packet()
    }

    pub fn inner_mut(&mut self) -> Option<&mut Packet> {
        self.payload.as_packet_mut()
    }

    /// Header, payload and trailer length
    pub fn encoded_len(&self) -> usize {
        self.header.header_len() + self.payload.encoded_len() + self.trailer.len()
    }

    pub fn encode(&self, out: &mut BytesMut) {
        self.header.encode(out);
        self.payload.encode(out);
        out.extend_from_slice(&self.trailer);
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut out);
        out.freeze()
    }

    /// First packet of `kind` in this chain, this one included
    pub fn find(&self, kind: LayerKind) -> Option<&Packet> {
        if self.kind() == kind {
            return Some(self);
        }
        self.inner()?.find(kind)
    }

    pub fn find_mut(&mut self, kind: LayerKind) -> Option<&mut Packet> {
        if self.kind() == kind {
            return Some(self);
        }
        self.inner_mut()?.find_mut(kind)
    }

    fn update_lengths(&mut self) {
        if let Some(inner) = self.inner_mut() {
            inner.update_lengths();
        }
        let payload_len = self.payload.encoded_len();

        match &mut self.header {
            Header::Ethernet(h) if h.is_length_field() => {
                h.ether_type = payload_len as u16;
            }
            Header::Ipv4(h) => {
                h.pad_options();
                h.ihl = (h.header_len() / 4) as u8;
                h.total_length = (h.header_len() + payload_len) as u16;
            }
            Header::Ipv6(h) => h.payload_length = payload_len as u16,
            Header::Udp(h) => h.length = (UdpHeader::HEADER_SIZE + payload_len) as u16,
            Header::Tcp(h) => {
                h.pad_options();
                h.data_offset = (h.header_len() / 4) as u8;
            }
            _ => {}
        }
    }

    fn update_checksums(&mut self, pseudo: Option<&PseudoHeader>) {
        let nested = match &self.header {
            Header::Ipv4(h) => Some(PseudoHeader::V4(h.source.octets(), h.destination.octets())),
            Header::Ipv6(h) => Some(PseudoHeader::V6(h.source.octets(), h.destination.octets())),
            _ => None,
        };
        if let Some(inner) = self.inner_mut() {
            inner.update_checksums(nested.as_ref().or(pseudo));
        }

        let segment = match self.kind() {
            LayerKind::Icmp | LayerKind::Tcp | LayerKind::Udp => self.segment_bytes(),
            _ => BytesMut::new(),
        };
        match &mut self.header {
            Header::Ipv4(h) => h.checksum = h.compute_checksum(),
            Header::Icmp(h) => h.checksum = internet_checksum(&segment),
            Header::Tcp(h) => {
                if let Some(pseudo) = pseudo {
                    h.checksum = pseudo.checksum(6, &segment);
                }
            }
            Header::Udp(h) => {
                if let Some(pseudo) = pseudo {
                    // An all-zero UDP checksum means "none"
                    h.checksum = match pseudo.checksum(17, &segment) {
                        0 => 0xffff,
                        sum => sum,
                    };
                }
            }
            _ => {}
        }
    }

    /// Header and payload with the checksum field zeroed
    fn segment_bytes(&self) -> BytesMut {
        let mut header = self.header.clone();
        match &mut header {
            Header::Tcp(h) => h.checksum = 0,
            Header::Udp(h) => h.checksum = 0,
            Header::Icmp(h) => h.checksum = 0,
            _ => {}
        }
        let mut out = BytesMut::with_capacity(header.header_len() + self.payload.encoded_len());
        header.encode(&mut out);
        self.payload.encode(&mut out);
        out
    }
}

enum PseudoHeader {
    V4([u8; 4], [u8; 4]),
    V6([u8; 16], [u8; 16]),
}

impl PseudoHeader {
    fn checksum(&self, protocol: u8, data: &[u8]) -> u16 {
        match self {
            PseudoHeader::V4(src, dst) => transport_checksum(src, dst, protocol, data),
            PseudoHeader::V6(src, dst) => transport_checksum_v6(src, dst, protocol, data),
        }
    }
}

/// A decoded frame: link type plus the root of the packet chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketStack {
    link_type: LinkType,
    root: Payload,
}

macro_rules! layer_accessors {
    ($($get:ident, $get_mut:ident => $variant:ident($ty:ty);)*) => {
        $(
            pub fn $get(&self) -> Option<&$ty> {
                self.layers().find_map(|packet| match &packet.header {
                    Header::$variant(h) => Some(h),
                    _ => None,
                })
            }

            pub fn $get_mut(&mut self) -> Option<&mut $ty> {
                match &mut self.root_mut()?.find_mut(LayerKind::$variant)?.header {
                    Header::$variant(h) => Some(h),
                    _ => None,
                }
            }
        )*
    };
}

impl PacketStack {
    /// Decode a captured frame.
    ///
    /// An unsupported link type, or a raw-IP frame with an unknown version,
    /// yields an opaque root rather than an error.
    pub fn decode(data: &[u8], link_type: LinkType, registry: &Registry) -> Result<Self> {
        Self::decode_bytes(Bytes::copy_from_slice(data), link_type, registry)
    }

    /// Zero-copy variant of [`PacketStack::decode`]
    pub fn decode_bytes(data: Bytes, link_type: LinkType, registry: &Registry) -> Result<Self> {
        let root_kind = match link_type {
            LinkType::Ethernet => Some(LayerKind::Ethernet),
            LinkType::Ipv4 => Some(LayerKind::Ipv4),
            LinkType::Ipv6 => Some(LayerKind::Ipv6),
            LinkType::Raw => match data.first().map(|b| b >> 4) {
                Some(4) => Some(LayerKind::Ipv4),
                Some(6) => Some(LayerKind::Ipv6),
                _ => None,
            },
            LinkType::Other(_) => None,
        };

        let root = match root_kind {
            Some(kind) => Packet::decode(kind, data, registry)?.into(),
            None => Payload::Opaque(data),
        };
        Ok(Self { link_type, root })
    }

    pub fn from_packet(link_type: LinkType, packet: Packet) -> Self {
        Self {
            link_type,
            root: packet.into(),
        }
    }

    pub fn link_type(&self) -> LinkType {
        self.link_type
    }

    pub fn root(&self) -> Option<&Packet> {
        self.root.as_packet()
    }

    pub fn root_mut(&mut self) -> Option<&mut Packet> {
        self.root.as_packet_mut()
    }

    /// Bytes of a frame that could not be decoded at all
    pub fn opaque_root(&self) -> Option<&Bytes> {
        self.root.as_opaque()
    }

    /// Packets from the outermost layer inwards
    pub fn layers(&self) -> Layers<'_> {
        Layers { next: self.root() }
    }

    /// Layer kinds from the outermost inwards
    pub fn kinds(&self) -> Vec<LayerKind> {
        self.layers().map(Packet::kind).collect()
    }

    /// Number of decoded layers
    pub fn depth(&self) -> usize {
        self.layers().count()
    }

    pub fn find(&self, kind: LayerKind) -> Option<&Packet> {
        self.root()?.find(kind)
    }

    pub fn find_mut(&mut self, kind: LayerKind) -> Option<&mut Packet> {
        self.root_mut()?.find_mut(kind)
    }

    layer_accessors! {
        ethernet, ethernet_mut => Ethernet(EthernetHeader);
        dot1q, dot1q_mut => Dot1q(Dot1qHeader);
        arp, arp_mut => Arp(ArpHeader);
        ipv4, ipv4_mut => Ipv4(Ipv4Header);
        ipv6, ipv6_mut => Ipv6(Ipv6Header);
        icmp, icmp_mut => Icmp(IcmpHeader);
        tcp, tcp_mut => Tcp(TcpHeader);
        udp, udp_mut => Udp(UdpHeader);
    }

    /// Opaque bytes carried by the innermost decoded layer, if non-empty
    pub fn application_payload(&self) -> Option<&Bytes> {
        let innermost = self.layers().last()?;
        innermost.payload.as_opaque().filter(|bytes| !bytes.is_empty())
    }

    pub fn encoded_len(&self) -> usize {
        self.root.encoded_len()
    }

    /// Flatten the chain back into wire bytes
    pub fn encode(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(self.encoded_len());
        self.root.encode(&mut out);
        out.freeze()
    }

    /// Recompute IPv4 total length/IHL, IPv6 payload length, UDP length,
    /// TCP data offset and 802.3 length fields from the current chain.
    ///
    /// IPv4 and TCP options are zero-padded to a 32-bit boundary first.
    pub fn update_lengths(&mut self) {
        if let Some(root) = self.root_mut() {
            root.update_lengths();
        }
    }

    /// Recompute IPv4 header, ICMP, TCP and UDP checksums.
    ///
    /// Transport checksums are only computed under an IP layer.
    pub fn update_checksums(&mut self) {
        if let Some(root) = self.root_mut() {
            root.update_checksums(None);
        }
    }
}

/// Iterator over a packet chain
pub struct Layers<'a> {
    next: Option<&'a Packet>,
}

impl<'a> Iterator for Layers<'a> {
    type Item = &'a Packet;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.inner();
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::validate_checksum;
    use crate::registry::Discriminator;
    use crate::tcp::TcpFlags;
    use tapline_core::{Error, Inet4Address, MacAddress};

    fn frame() -> Vec<u8> {
        vec![
            // Ethernet
            0xde, 0xad, 0xbe, 0xef, 0xc0, 0xfe, 0xaa, 0xaa, 0xaa, 0xbb, 0xbb, 0xbb, 0x08, 0x00,
            // IPv4
            0x45, 0x00, 0x00, 0x28, 0xc3, 0x2f, 0x00, 0x00, 0x2a, 0x06, 0x00, 0x00, 0xc0, 0xa8,
            0x01, 0x7c, 0xc0, 0xa8, 0x01, 0x9c,
            // TCP
            0x00, 0x32, 0x00, 0x41, 0x00, 0x00, 0x00, 0x18, 0x00, 0x00, 0x00, 0x00, 0x50, 0x02,
            0x20, 0x00, 0x00, 0x00, 0x00, 0x00,
        ]
    }

    #[test]
    fn test_decode_three_layers() {
        let registry = Registry::with_defaults();
        let data = frame();
        assert_eq!(data.len(), 54);

        let stack = PacketStack::decode(&data, LinkType::Ethernet, &registry).unwrap();
        assert_eq!(
            stack.kinds(),
            vec![LayerKind::Ethernet, LayerKind::Ipv4, LayerKind::Tcp]
        );

        let eth = stack.ethernet().unwrap();
        assert_eq!(eth.destination, "de:ad:be:ef:c0:fe".parse::<MacAddress>().unwrap());
        assert_eq!(eth.source, "aa:aa:aa:bb:bb:bb".parse::<MacAddress>().unwrap());
        assert_eq!(eth.ether_type, 0x0800);

        let ip = stack.ipv4().unwrap();
        assert_eq!(ip.source, Inet4Address::new(192, 168, 1, 124));
        assert_eq!(ip.destination, Inet4Address::new(192, 168, 1, 156));
        assert_eq!(ip.identification, 49967);
        assert_eq!(ip.ttl, 42);
        assert_eq!(ip.protocol, 6);

        let tcp = stack.tcp().unwrap();
        assert_eq!(tcp.source_port, 50);
        assert_eq!(tcp.destination_port, 65);
        assert_eq!(tcp.sequence_number, 24);
        assert_eq!(tcp.acknowledgment_number, 0);

        assert!(stack.application_payload().is_none());
        assert_eq!(&stack.encode()[..], &data[..]);
    }

    #[test]
    fn test_decode_encode_decode_is_stable() {
        let registry = Registry::with_defaults();
        let stack = PacketStack::decode(&frame(), LinkType::Ethernet, &registry).unwrap();
        let again = PacketStack::decode(&stack.encode(), LinkType::Ethernet, &registry).unwrap();
        assert_eq!(stack, again);
    }

    #[test]
    fn test_unknown_ether_type_is_opaque() {
        let registry = Registry::with_defaults();
        let mut data = frame();
        data[12..14].copy_from_slice(&0x88b5u16.to_be_bytes());

        let stack = PacketStack::decode(&data, LinkType::Ethernet, &registry).unwrap();
        assert_eq!(stack.depth(), 1);
        let root = stack.root().unwrap();
        assert_eq!(root.payload.as_opaque().unwrap(), &data[14..]);
        assert_eq!(&stack.encode()[..], &data[..]);
    }

    #[test]
    fn test_minimum_length_has_empty_payload() {
        let registry = Registry::with_defaults();
        let data = &frame()[..14];
        let stack = PacketStack::decode(data, LinkType::Ethernet, &registry).unwrap();
        assert_eq!(stack.depth(), 1);
        assert!(stack.root().unwrap().payload.is_empty());
    }

    #[test]
    fn test_truncated_frame_fails() {
        let registry = Registry::with_defaults();
        let err = PacketStack::decode(&frame()[..13], LinkType::Ethernet, &registry).unwrap_err();
        assert!(matches!(err, Error::TruncatedHeader { protocol: "Ethernet", .. }));

        // Truncated inside TCP
        let err = PacketStack::decode(&frame()[..50], LinkType::Ethernet, &registry).unwrap_err();
        assert!(matches!(err, Error::TruncatedHeader { protocol: "TCP", .. }));
    }

    #[test]
    fn test_padding_becomes_trailer() {
        let registry = Registry::with_defaults();
        let mut data = frame();
        data.extend_from_slice(&[0u8; 6]);

        let stack = PacketStack::decode(&data, LinkType::Ethernet, &registry).unwrap();
        let ip = stack.find(LayerKind::Ipv4).unwrap();
        assert_eq!(&ip.trailer[..], &[0u8; 6]);
        assert!(stack.tcp().is_some());
        assert_eq!(&stack.encode()[..], &data[..]);
    }

    #[test]
    fn test_total_length_beyond_capture_is_clipped() {
        let registry = Registry::with_defaults();
        let mut data = frame();
        data[16..18].copy_from_slice(&1500u16.to_be_bytes());

        let stack = PacketStack::decode(&data, LinkType::Ethernet, &registry).unwrap();
        assert_eq!(stack.ipv4().unwrap().total_length, 1500);
        assert!(stack.tcp().is_some());
        assert_eq!(&stack.encode()[..], &data[..]);
    }

    #[test]
    fn test_raw_link_uses_version_nibble() {
        let registry = Registry::with_defaults();
        let data = &frame()[14..];
        let stack = PacketStack::decode(data, LinkType::Raw, &registry).unwrap();
        assert_eq!(stack.kinds(), vec![LayerKind::Ipv4, LayerKind::Tcp]);

        let garbage = [0x10, 0x00, 0x00];
        let stack = PacketStack::decode(&garbage, LinkType::Raw, &registry).unwrap();
        assert_eq!(stack.depth(), 0);
        assert_eq!(&stack.opaque_root().unwrap()[..], &garbage);
    }

    #[test]
    fn test_unsupported_link_type_is_opaque() {
        let registry = Registry::with_defaults();
        let stack = PacketStack::decode(&frame(), LinkType::Other(105), &registry).unwrap();
        assert!(stack.root().is_none());
        assert_eq!(&stack.encode()[..], &frame()[..]);
    }

    #[test]
    fn test_port_registration_decodes_tunnel() {
        let registry = Registry::with_defaults();
        registry.register_decoder(Discriminator::Port(65), LayerKind::Ethernet);

        let mut data = frame();
        let inner = frame();
        data.extend_from_slice(&inner);
        let total = (20 + 20 + inner.len()) as u16;
        data[16..18].copy_from_slice(&total.to_be_bytes());

        let stack = PacketStack::decode(&data, LinkType::Ethernet, &registry).unwrap();
        assert_eq!(stack.depth(), 6);
        assert_eq!(&stack.encode()[..], &data[..]);
    }

    #[test]
    fn test_set_payload_replaces_nested_packet() {
        let registry = Registry::with_defaults();
        let mut stack = PacketStack::decode(&frame(), LinkType::Ethernet, &registry).unwrap();

        let ip = stack.find_mut(LayerKind::Ipv4).unwrap();
        let old = ip.set_payload(Bytes::from_static(b"hello"));
        assert_eq!(old.as_packet().unwrap().kind(), LayerKind::Tcp);
        assert!(stack.tcp().is_none());
        assert_eq!(stack.application_payload().unwrap(), &Bytes::from_static(b"hello"));
    }

    #[test]
    fn test_field_mutation_round_trips() {
        let registry = Registry::with_defaults();
        let mut stack = PacketStack::decode(&frame(), LinkType::Ethernet, &registry).unwrap();
        stack.ipv4_mut().unwrap().ttl = 1;
        stack
            .ethernet_mut()
            .unwrap()
            .source
            .update(&MacAddress::new([0x02, 0, 0, 0, 0, 1]));
        stack.tcp_mut().unwrap().flags = TcpFlags::SYN_ACK;

        let bytes = stack.encode();
        let decoded = PacketStack::decode(&bytes, LinkType::Ethernet, &registry).unwrap();
        assert_eq!(decoded, stack);
        assert_eq!(decoded.ipv4().unwrap().ttl, 1);
        assert_eq!(bytes[13 + 34], 0x12);
    }

    #[test]
    fn test_update_lengths_and_checksums() {
        let registry = Registry::with_defaults();
        let mut stack = PacketStack::decode(&frame(), LinkType::Ethernet, &registry).unwrap();
        stack
            .find_mut(LayerKind::Tcp)
            .unwrap()
            .set_payload(Bytes::from_static(b"GET / HTTP/1.0\r\n\r\n"));
        stack.update_lengths();
        stack.update_checksums();

        let ip = stack.ipv4().unwrap();
        assert_eq!(ip.total_length, 40 + 18);

        let bytes = stack.encode();
        assert!(validate_checksum(&bytes[14..34]));

        let tcp_segment = &bytes[34..];
        let mut pseudo = Vec::new();
        pseudo.extend_from_slice(&[192, 168, 1, 124, 192, 168, 1, 156, 0, 6]);
        pseudo.extend_from_slice(&(tcp_segment.len() as u16).to_be_bytes());
        pseudo.extend_from_slice(tcp_segment);
        assert!(validate_checksum(&pseudo));
    }

    fn fragment(protocol: u8, data: &[u8]) -> Vec<u8> {
        let mut out = frame()[..34].to_vec();
        out[16..18].copy_from_slice(&((20 + data.len()) as u16).to_be_bytes());
        out[20..22].copy_from_slice(&185u16.to_be_bytes());
        out[23] = protocol;
        out.extend_from_slice(data);
        out
    }

    #[test]
    fn test_trailing_tcp_fragment_is_opaque() {
        let registry = Registry::with_defaults();
        let data = fragment(6, b"fragment");

        let stack = PacketStack::decode(&data, LinkType::Ethernet, &registry).unwrap();
        assert_eq!(stack.kinds(), vec![LayerKind::Ethernet, LayerKind::Ipv4]);
        assert_eq!(stack.ipv4().unwrap().fragment_offset, 185);
        assert_eq!(stack.application_payload().unwrap(), &Bytes::from_static(b"fragment"));
        assert_eq!(&stack.encode()[..], &data[..]);
    }

    #[test]
    fn test_trailing_udp_fragment_is_opaque() {
        let registry = Registry::with_defaults();
        let data = fragment(17, b"payload payload!");

        let stack = PacketStack::decode(&data, LinkType::Ethernet, &registry).unwrap();
        assert!(stack.udp().is_none());
        assert_eq!(stack.depth(), 2);
        assert_eq!(&stack.encode()[..], &data[..]);
    }

    #[test]
    fn test_first_fragment_decodes_transport() {
        let registry = Registry::with_defaults();
        let mut data = frame();
        data[20..22].copy_from_slice(&0x2000u16.to_be_bytes());

        let stack = PacketStack::decode(&data, LinkType::Ethernet, &registry).unwrap();
        assert!(stack.ipv4().unwrap().is_fragment());
        assert!(stack.tcp().is_some());
    }

    #[test]
    fn test_update_lengths_pads_unaligned_options() {
        let registry = Registry::with_defaults();
        let mut stack = PacketStack::decode(&frame(), LinkType::Ethernet, &registry).unwrap();
        stack.ipv4_mut().unwrap().options = Bytes::from_static(&[0x94, 0x04, 0x00]);
        stack.tcp_mut().unwrap().options = Bytes::from_static(&[0x01, 0x01, 0x04, 0x02, 0x01]);
        stack.update_lengths();
        stack.update_checksums();

        let ip = stack.ipv4().unwrap();
        assert_eq!(ip.ihl, 6);
        assert_eq!(ip.header_len(), 24);
        assert_eq!(ip.total_length, 24 + 28);
        assert_eq!(stack.tcp().unwrap().data_offset, 7);

        let again = PacketStack::decode(&stack.encode(), LinkType::Ethernet, &registry).unwrap();
        assert_eq!(again, stack);
    }

    #[test]
    fn test_empty_registry_keeps_everything_opaque() {
        let registry = Registry::empty();
        let stack = PacketStack::decode(&frame(), LinkType::Ethernet, &registry).unwrap();
        assert_eq!(stack.depth(), 1);
    }
}
