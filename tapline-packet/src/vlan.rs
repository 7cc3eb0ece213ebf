//! IEEE 802.1Q VLAN tag

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tapline_core::Result;

use crate::header::{ensure_len, HeaderCodec};

/// 802.1Q tag control information followed by the inner EtherType
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dot1qHeader {
    /// Priority code point (3 bits)
    pub priority: u8,
    /// Drop eligible indicator
    pub drop_eligible: bool,
    /// VLAN identifier (12 bits)
    pub vlan_id: u16,
    pub ether_type: u16,
}

impl Dot1qHeader {
    pub const HEADER_SIZE: usize = 4;

    pub fn new(vlan_id: u16, ether_type: u16) -> Self {
        Self {
            priority: 0,
            drop_eligible: false,
            vlan_id,
            ether_type,
        }
    }

    fn tci(&self) -> u16 {
        (((self.priority & 0x07) as u16) << 13)
            | ((self.drop_eligible as u16) << 12)
            | (self.vlan_id & 0x0fff)
    }
}

impl HeaderCodec for Dot1qHeader {
    const PROTOCOL: &'static str = "802.1Q";
    const MIN_LEN: usize = Self::HEADER_SIZE;

    fn decode(buf: &Bytes) -> Result<Self> {
        ensure_len(Self::PROTOCOL, Self::MIN_LEN, buf.len())?;
        let mut cursor = &buf[..Self::HEADER_SIZE];
        let tci = cursor.get_u16();

        Ok(Self {
            priority: (tci >> 13) as u8,
            drop_eligible: tci & 0x1000 != 0,
            vlan_id: tci & 0x0fff,
            ether_type: cursor.get_u16(),
        })
    }

    fn header_len(&self) -> usize {
        Self::HEADER_SIZE
    }

    fn encode(&self, out: &mut BytesMut) {
        out.put_u16(self.tci());
        out.put_u16(self.ether_type);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_tci() {
        // PCP 5, DEI set, VID 100, inner IPv4
        let data = Bytes::from_static(&[0xb0, 0x64, 0x08, 0x00]);
        let tag = Dot1qHeader::decode(&data).unwrap();
        assert_eq!(tag.priority, 5);
        assert!(tag.drop_eligible);
        assert_eq!(tag.vlan_id, 100);
        assert_eq!(tag.ether_type, 0x0800);

        let mut out = BytesMut::new();
        tag.encode(&mut out);
        assert_eq!(&out[..], &data[..]);
    }

    #[test]
    fn test_encode_masks_oversized_fields() {
        let tag = Dot1qHeader {
            priority: 0xff,
            drop_eligible: false,
            vlan_id: 0xf123,
            ether_type: 0x86dd,
        };
        let mut out = BytesMut::new();
        tag.encode(&mut out);
        assert_eq!(&out[..], &[0xe1, 0x23, 0x86, 0xdd]);
    }

    #[test]
    fn test_truncated() {
        assert!(Dot1qHeader::decode(&Bytes::from_static(&[0x00, 0x01, 0x08])).is_err());
    }
}
