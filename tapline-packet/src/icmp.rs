//! ICMP header (RFC 792)
//!
//! Only the common 8-byte prefix is decoded; the type-specific body is the
//! opaque payload.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tapline_core::Result;

use crate::header::{ensure_len, HeaderCodec};

/// Common ICMP message types
pub mod icmp_type {
    pub const ECHO_REPLY: u8 = 0;
    pub const DESTINATION_UNREACHABLE: u8 = 3;
    pub const REDIRECT: u8 = 5;
    pub const ECHO_REQUEST: u8 = 8;
    pub const TIME_EXCEEDED: u8 = 11;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IcmpHeader {
    pub icmp_type: u8,
    pub code: u8,
    pub checksum: u16,
    /// Type-dependent word (identifier/sequence for echo)
    pub rest: u32,
}

impl IcmpHeader {
    pub const HEADER_SIZE: usize = 8;

    /// Echo request with the given identifier and sequence number
    pub fn echo_request(identifier: u16, sequence: u16) -> Self {
        Self {
            icmp_type: icmp_type::ECHO_REQUEST,
            code: 0,
            checksum: 0,
            rest: ((identifier as u32) << 16) | sequence as u32,
        }
    }

    pub fn identifier(&self) -> u16 {
        (self.rest >> 16) as u16
    }

    pub fn sequence(&self) -> u16 {
        self.rest as u16
    }
}

impl HeaderCodec for IcmpHeader {
    const PROTOCOL: &'static str = "ICMP";
    const MIN_LEN: usize = Self::HEADER_SIZE;

    fn decode(buf: &Bytes) -> Result<Self> {
        ensure_len(Self::PROTOCOL, Self::MIN_LEN, buf.len())?;
        let mut cursor = &buf[..Self::HEADER_SIZE];
        Ok(Self {
            icmp_type: cursor.get_u8(),
            code: cursor.get_u8(),
            checksum: cursor.get_u16(),
            rest: cursor.get_u32(),
        })
    }

    fn header_len(&self) -> usize {
        Self::HEADER_SIZE
    }

    fn encode(&self, out: &mut BytesMut) {
        out.put_u8(self.icmp_type);
        out.put_u8(self.code);
        out.put_u16(self.checksum);
        out.put_u32(self.rest);
    }
}
