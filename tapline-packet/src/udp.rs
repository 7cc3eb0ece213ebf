//! UDP header (RFC 768)

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tapline_core::{Error, Result};

use crate::header::{ensure_len, HeaderCodec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UdpHeader {
    pub source_port: u16,
    pub destination_port: u16,
    /// Header plus payload, in bytes
    pub length: u16,
    pub checksum: u16,
}

impl UdpHeader {
    /// UDP header size (always 8 bytes)
    pub const HEADER_SIZE: usize = 8;

    pub fn new(source_port: u16, destination_port: u16, payload_len: usize) -> Self {
        Self {
            source_port,
            destination_port,
            length: (Self::HEADER_SIZE + payload_len) as u16,
            checksum: 0,
        }
    }

    /// Payload size as declared by the length field
    pub fn payload_len(&self) -> usize {
        (self.length as usize).saturating_sub(Self::HEADER_SIZE)
    }
}

impl HeaderCodec for UdpHeader {
    const PROTOCOL: &'static str = "UDP";
    const MIN_LEN: usize = Self::HEADER_SIZE;

    fn decode(buf: &Bytes) -> Result<Self> {
        ensure_len(Self::PROTOCOL, Self::MIN_LEN, buf.len())?;
        let mut cursor = &buf[..Self::HEADER_SIZE];

        let source_port = cursor.get_u16();
        let destination_port = cursor.get_u16();
        let length = cursor.get_u16();
        if (length as usize) < Self::HEADER_SIZE {
            return Err(Error::malformed(
                Self::PROTOCOL,
                format!("length {} shorter than the 8-byte header", length),
            ));
        }

        Ok(Self {
            source_port,
            destination_port,
            length,
            checksum: cursor.get_u16(),
        })
    }

    fn header_len(&self) -> usize {
        Self::HEADER_SIZE
    }

    fn declared_len(&self) -> Option<usize> {
        Some(self.length as usize)
    }

    fn encode(&self, out: &mut BytesMut) {
        out.put_u16(self.source_port);
        out.put_u16(self.destination_port);
        out.put_u16(self.length);
        out.put_u16(self.checksum);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_fields() {
        let data = Bytes::from_static(&[0x30, 0x39, 0x00, 0x35, 0x00, 0x0c, 0xab, 0xcd]);
        let header = UdpHeader::decode(&data).unwrap();
        assert_eq!(header.source_port, 12345);
        assert_eq!(header.destination_port, 53);
        assert_eq!(header.length, 12);
        assert_eq!(header.payload_len(), 4);
        assert_eq!(header.checksum, 0xabcd);
        assert_eq!(header.declared_len(), Some(12));

        let mut out = BytesMut::new();
        header.encode(&mut out);
        assert_eq!(&out[..], &data[..]);
    }

    #[test]
    fn test_length_below_header() {
        let data = Bytes::from_static(&[0x00, 0x35, 0x00, 0x35, 0x00, 0x04, 0x00, 0x00]);
        let err = UdpHeader::decode(&data).unwrap_err();
        assert!(matches!(err, Error::MalformedHeader { protocol: "UDP", .. }));
    }
}
