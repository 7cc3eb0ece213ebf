//! ARP over Ethernet/IPv4 (RFC 826)

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tapline_core::{Error, Inet4Address, MacAddress, Result};

use crate::header::{ensure_len, HeaderCodec};

/// ARP operation codes
pub mod operation {
    pub const REQUEST: u16 = 1;
    pub const REPLY: u16 = 2;
}

/// ARP packet for Ethernet hardware and IPv4 protocol addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArpHeader {
    pub hardware_type: u16,
    pub protocol_type: u16,
    pub operation: u16,
    pub sender_hardware: MacAddress,
    pub sender_protocol: Inet4Address,
    pub target_hardware: MacAddress,
    pub target_protocol: Inet4Address,
}

impl ArpHeader {
    pub const HEADER_SIZE: usize = 28;
    pub const HARDWARE_ETHERNET: u16 = 1;

    /// Who-has request for `target`
    pub fn request(sender_hardware: MacAddress, sender: Inet4Address, target: Inet4Address) -> Self {
        Self {
            hardware_type: Self::HARDWARE_ETHERNET,
            protocol_type: 0x0800,
            operation: operation::REQUEST,
            sender_hardware,
            sender_protocol: sender,
            target_hardware: MacAddress::ZERO,
            target_protocol: target,
        }
    }
}

impl HeaderCodec for ArpHeader {
    const PROTOCOL: &'static str = "ARP";
    const MIN_LEN: usize = Self::HEADER_SIZE;

    fn decode(buf: &Bytes) -> Result<Self> {
        ensure_len(Self::PROTOCOL, Self::MIN_LEN, buf.len())?;
        let mut cursor = &buf[..Self::HEADER_SIZE];

        let hardware_type = cursor.get_u16();
        let protocol_type = cursor.get_u16();
        let hardware_len = cursor.get_u8();
        let protocol_len = cursor.get_u8();
        if hardware_len as usize != MacAddress::LENGTH
            || protocol_len as usize != Inet4Address::LENGTH
        {
            return Err(Error::malformed(
                Self::PROTOCOL,
                format!(
                    "unsupported address lengths: hardware {}, protocol {}",
                    hardware_len, protocol_len
                ),
            ));
        }
        let operation = cursor.get_u16();

        let mut mac = [0u8; 6];
        let mut ip = [0u8; 4];
        cursor.copy_to_slice(&mut mac);
        cursor.copy_to_slice(&mut ip);
        let sender_hardware = MacAddress::new(mac);
        let sender_protocol = Inet4Address::from(ip);
        cursor.copy_to_slice(&mut mac);
        cursor.copy_to_slice(&mut ip);

        Ok(Self {
            hardware_type,
            protocol_type,
            operation,
            sender_hardware,
            sender_protocol,
            target_hardware: MacAddress::new(mac),
            target_protocol: Inet4Address::from(ip),
        })
    }

    fn header_len(&self) -> usize {
        Self::HEADER_SIZE
    }

    fn declared_len(&self) -> Option<usize> {
        Some(Self::HEADER_SIZE)
    }

    fn encode(&self, out: &mut BytesMut) {
        out.put_u16(self.hardware_type);
        out.put_u16(self.protocol_type);
        out.put_u8(MacAddress::LENGTH as u8);
        out.put_u8(Inet4Address::LENGTH as u8);
        out.put_u16(self.operation);
        out.put_slice(self.sender_hardware.as_bytes());
        out.put_slice(self.sender_protocol.as_bytes());
        out.put_slice(self.target_hardware.as_bytes());
        out.put_slice(self.target_protocol.as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_encode_decode() {
        let request = ArpHeader::request(
            "00:11:22:33:44:55".parse().unwrap(),
            Inet4Address::new(10, 0, 0, 1),
            Inet4Address::new(10, 0, 0, 2),
        );
        let mut out = BytesMut::new();
        request.encode(&mut out);
        assert_eq!(out.len(), 28);
        assert_eq!(&out[4..6], &[6, 4]);

        let decoded = ArpHeader::decode(&out.freeze()).unwrap();
        assert_eq!(decoded, request);
        assert_eq!(decoded.operation, operation::REQUEST);
    }

    #[test]
    fn test_rejects_non_ethernet_lengths() {
        let mut data = vec![0u8; 28];
        data[4] = 8;
        data[5] = 4;
        let err = ArpHeader::decode(&Bytes::from(data)).unwrap_err();
        assert!(matches!(err, Error::MalformedHeader { .. }));
    }
}
