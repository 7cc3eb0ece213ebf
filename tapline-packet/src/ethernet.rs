//! Ethernet II / IEEE 802.3 header
//!
//! The type/length field is kept as a raw `u16`. Values up to 1500 are an
//! 802.3 payload length, in which case the header declares the layer length
//! and anything captured past it (minimum-size padding, FCS) becomes the
//! frame's trailer.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tapline_core::{EtherType, MacAddress, Result};

use crate::header::{ensure_len, HeaderCodec};

/// Ethernet header: destination, source, type/length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EthernetHeader {
    pub destination: MacAddress,
    pub source: MacAddress,
    /// EtherType, or payload length when `<= 1500`
    pub ether_type: u16,
}

impl EthernetHeader {
    /// Ethernet header size (dst + src + type/length)
    pub const HEADER_SIZE: usize = 14;

    /// Minimum frame size without FCS
    pub const MIN_FRAME_SIZE: usize = 60;

    pub fn new(destination: MacAddress, source: MacAddress, ether_type: u16) -> Self {
        Self {
            destination,
            source,
            ether_type,
        }
    }

    /// True when the type field holds an 802.3 length
    pub fn is_length_field(&self) -> bool {
        EtherType::is_length(self.ether_type)
    }
}

impl HeaderCodec for EthernetHeader {
    const PROTOCOL: &'static str = "Ethernet";
    const MIN_LEN: usize = Self::HEADER_SIZE;

    fn decode(buf: &Bytes) -> Result<Self> {
        ensure_len(Self::PROTOCOL, Self::MIN_LEN, buf.len())?;
        let mut cursor = &buf[..Self::HEADER_SIZE];

        let mut destination = [0u8; 6];
        cursor.copy_to_slice(&mut destination);
        let mut source = [0u8; 6];
        cursor.copy_to_slice(&mut source);

        Ok(Self {
            destination: MacAddress::new(destination),
            source: MacAddress::new(source),
            ether_type: cursor.get_u16(),
        })
    }

    fn header_len(&self) -> usize {
        Self::HEADER_SIZE
    }

    fn declared_len(&self) -> Option<usize> {
        self.is_length_field()
            .then(|| Self::HEADER_SIZE + self.ether_type as usize)
    }

    fn encode(&self, out: &mut BytesMut) {
        out.put_slice(self.destination.as_bytes());
        out.put_slice(self.source.as_bytes());
        out.put_u16(self.ether_type);
    }
}
