//! IPv6 fixed header (RFC 8200)
//!
//! Extension headers are not decoded. The next-header value is used as-is to
//! select the payload codec, so a datagram carrying extension headers ends
//! at an opaque payload.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tapline_core::{Inet6Address, Result};

use crate::header::{ensure_len, HeaderCodec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv6Header {
    /// Version nibble, normally 6
    pub version: u8,
    pub traffic_class: u8,
    /// Flow label (20 bits)
    pub flow_label: u32,
    /// Payload length in bytes, extension headers included
    pub payload_length: u16,
    pub next_header: u8,
    pub hop_limit: u8,
    pub source: Inet6Address,
    pub destination: Inet6Address,
}

impl Ipv6Header {
    pub const HEADER_SIZE: usize = 40;

    pub fn new(source: Inet6Address, destination: Inet6Address, next_header: u8, payload_len: usize) -> Self {
        Self {
            version: 6,
            traffic_class: 0,
            flow_label: 0,
            payload_length: payload_len as u16,
            next_header,
            hop_limit: 64,
            source,
            destination,
        }
    }
}

impl HeaderCodec for Ipv6Header {
    const PROTOCOL: &'static str = "IPv6";
    const MIN_LEN: usize = Self::HEADER_SIZE;

    fn decode(buf: &Bytes) -> Result<Self> {
        ensure_len(Self::PROTOCOL, Self::MIN_LEN, buf.len())?;
        let mut cursor = &buf[..Self::HEADER_SIZE];

        let first = cursor.get_u32();
        let payload_length = cursor.get_u16();
        let next_header = cursor.get_u8();
        let hop_limit = cursor.get_u8();
        let mut address = [0u8; 16];
        cursor.copy_to_slice(&mut address);
        let source = Inet6Address::new(address);
        cursor.copy_to_slice(&mut address);

        Ok(Self {
            version: (first >> 28) as u8,
            traffic_class: (first >> 20) as u8,
            flow_label: first & 0x000f_ffff,
            payload_length,
            next_header,
            hop_limit,
            source,
            destination: Inet6Address::new(address),
        })
    }

    fn header_len(&self) -> usize {
        Self::HEADER_SIZE
    }

    fn declared_len(&self) -> Option<usize> {
        Some(Self::HEADER_SIZE + self.payload_length as usize)
    }

    fn encode(&self, out: &mut BytesMut) {
        out.put_u32(
            ((self.version as u32 & 0x0f) << 28)
                | ((self.traffic_class as u32) << 20)
                | (self.flow_label & 0x000f_ffff),
        );
        out.put_u16(self.payload_length);
        out.put_u8(self.next_header);
        out.put_u8(self.hop_limit);
        out.put_slice(self.source.as_bytes());
        out.put_slice(self.destination.as_bytes());
    }
}
