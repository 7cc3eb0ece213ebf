//! IPv4 header (RFC 791)

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tapline_core::{Error, Inet4Address, Result};

use crate::checksum::internet_checksum;
use crate::header::{ensure_len, pad_to_words, HeaderCodec};

/// IP flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct IpFlags {
    /// Reserved bit (must be 0)
    pub reserved: bool,
    /// Don't Fragment flag
    pub dont_fragment: bool,
    /// More Fragments flag
    pub more_fragments: bool,
}

impl IpFlags {
    /// No flags set
    pub const NONE: IpFlags = IpFlags {
        reserved: false,
        dont_fragment: false,
        more_fragments: false,
    };

    /// Don't Fragment flag set
    pub const DONT_FRAGMENT: IpFlags = IpFlags {
        reserved: false,
        dont_fragment: true,
        more_fragments: false,
    };

    /// Convert to 3-bit value
    pub fn to_bits(self) -> u8 {
        ((self.reserved as u8) << 2) | ((self.dont_fragment as u8) << 1) | self.more_fragments as u8
    }

    /// Parse from the low 3 bits of `bits`
    pub fn from_bits(bits: u8) -> Self {
        IpFlags {
            reserved: bits & 0b100 != 0,
            dont_fragment: bits & 0b010 != 0,
            more_fragments: bits & 0b001 != 0,
        }
    }
}

/// IPv4 header, options included
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ipv4Header {
    /// Version nibble, normally 4
    pub version: u8,
    /// Header length in 32-bit words
    pub ihl: u8,
    pub tos: u8,
    /// Header plus payload, in bytes
    pub total_length: u16,
    pub identification: u16,
    pub flags: IpFlags,
    /// Fragment offset in 8-byte units (13 bits)
    pub fragment_offset: u16,
    pub ttl: u8,
    /// IP protocol number of the payload
    pub protocol: u8,
    pub checksum: u16,
    pub source: Inet4Address,
    pub destination: Inet4Address,
    /// Raw option bytes, `(ihl - 5) * 4` long
    pub options: Bytes,
}

impl Ipv4Header {
    /// Minimum header size without options
    pub const MIN_HEADER_SIZE: usize = 20;

    /// Maximum header size with options
    pub const MAX_HEADER_SIZE: usize = 60;

    /// Header with no options, zero checksum and a payload of `payload_len`
    pub fn new(source: Inet4Address, destination: Inet4Address, protocol: u8, payload_len: usize) -> Self {
        Self {
            version: 4,
            ihl: 5,
            tos: 0,
            total_length: (Self::MIN_HEADER_SIZE + payload_len) as u16,
            identification: 0,
            flags: IpFlags::DONT_FRAGMENT,
            fragment_offset: 0,
            ttl: 64,
            protocol,
            checksum: 0,
            source,
            destination,
            options: Bytes::new(),
        }
    }

    /// Recompute the header checksum over the encoded header
    pub fn compute_checksum(&self) -> u16 {
        let mut buffer = BytesMut::with_capacity(self.header_len());
        let mut copy = self.clone();
        copy.checksum = 0;
        copy.encode(&mut buffer);
        internet_checksum(&buffer)
    }

    /// True for any fragment other than an unfragmented datagram
    pub fn is_fragment(&self) -> bool {
        self.flags.more_fragments || self.fragment_offset != 0
    }

    /// True for fragments after the first; their payload starts mid-datagram
    /// and carries no transport header
    pub fn is_trailing_fragment(&self) -> bool {
        self.fragment_offset != 0
    }

    /// Zero-pad options to a 32-bit boundary, capped at the maximum header size
    pub fn pad_options(&mut self) {
        self.options = pad_to_words(&self.options, Self::MAX_HEADER_SIZE - Self::MIN_HEADER_SIZE);
    }
}

impl HeaderCodec for Ipv4Header {
    const PROTOCOL: &'static str = "IPv4";
    const MIN_LEN: usize = Self::MIN_HEADER_SIZE;

    fn decode(buf: &Bytes) -> Result<Self> {
        ensure_len(Self::PROTOCOL, Self::MIN_LEN, buf.len())?;
        let mut cursor = &buf[..Self::MIN_HEADER_SIZE];

        let version_ihl = cursor.get_u8();
        let version = version_ihl >> 4;
        let ihl = version_ihl & 0x0f;
        let header_len = ihl as usize * 4;
        if header_len < Self::MIN_HEADER_SIZE {
            return Err(Error::malformed(
                Self::PROTOCOL,
                format!("IHL {} below minimum of 5", ihl),
            ));
        }
        if header_len > buf.len() {
            return Err(Error::malformed(
                Self::PROTOCOL,
                format!("IHL {} exceeds the {} bytes available", ihl, buf.len()),
            ));
        }

        let tos = cursor.get_u8();
        let total_length = cursor.get_u16();
        if (total_length as usize) < header_len {
            return Err(Error::malformed(
                Self::PROTOCOL,
                format!(
                    "total length {} shorter than header length {}",
                    total_length, header_len
                ),
            ));
        }
        let identification = cursor.get_u16();
        let flags_fragment = cursor.get_u16();
        let ttl = cursor.get_u8();
        let protocol = cursor.get_u8();
        let checksum = cursor.get_u16();
        let source = Inet4Address::from_u32(cursor.get_u32());
        let destination = Inet4Address::from_u32(cursor.get_u32());

        Ok(Self {
            version,
            ihl,
            tos,
            total_length,
            identification,
            flags: IpFlags::from_bits((flags_fragment >> 13) as u8),
            fragment_offset: flags_fragment & 0x1fff,
            ttl,
            protocol,
            checksum,
            source,
            destination,
            options: buf.slice(Self::MIN_HEADER_SIZE..header_len),
        })
    }

    fn header_len(&self) -> usize {
        Self::MIN_HEADER_SIZE + self.options.len()
    }

    fn declared_len(&self) -> Option<usize> {
        Some(self.total_length as usize)
    }

    fn encode(&self, out: &mut BytesMut) {
        out.put_u8(((self.version & 0x0f) << 4) | (self.ihl & 0x0f));
        out.put_u8(self.tos);
        out.put_u16(self.total_length);
        out.put_u16(self.identification);
        out.put_u16(((self.flags.to_bits() as u16) << 13) | (self.fragment_offset & 0x1fff));
        out.put_u8(self.ttl);
        out.put_u8(self.protocol);
        out.put_u16(self.checksum);
        out.put_u32(self.source.to_u32());
        out.put_u32(self.destination.to_u32());
        out.put_slice(&self.options);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<u8> {
        vec![
            0x45, 0x00, 0x00, 0x28, // version/IHL, TOS, total length 40
            0xc3, 0x2f, 0x00, 0x00, // id 49967, flags/offset
            0x2a, 0x06, 0x00, 0x00, // TTL 42, TCP, checksum
            0xc0, 0xa8, 0x01, 0x7c, // 192.168.1.124
            0xc0, 0xa8, 0x01, 0x9c, // 192.168.1.156
        ]
    }

    #[test]
    fn test_decode_fields() {
        let header = Ipv4Header::decode(&Bytes::from(sample())).unwrap();
        assert_eq!(header.version, 4);
        assert_eq!(header.ihl, 5);
        assert_eq!(header.total_length, 40);
        assert_eq!(header.identification, 49967);
        assert_eq!(header.ttl, 42);
        assert_eq!(header.protocol, 6);
        assert_eq!(header.source.to_string(), "192.168.1.124");
        assert_eq!(header.destination.to_string(), "192.168.1.156");
        assert_eq!(header.declared_len(), Some(40));
        assert!(!header.is_fragment());
    }

    #[test]
    fn test_ihl_below_minimum() {
        let mut data = sample();
        data[0] = 0x44;
        let err = Ipv4Header::decode(&Bytes::from(data)).unwrap_err();
        assert!(matches!(err, Error::MalformedHeader { protocol: "IPv4", .. }));
    }

    #[test]
    fn test_ihl_beyond_buffer() {
        let mut data = sample();
        data[0] = 0x46;
        let err = Ipv4Header::decode(&Bytes::from(data)).unwrap_err();
        assert!(matches!(err, Error::MalformedHeader { .. }));
    }

    #[test]
    fn test_total_length_shorter_than_header() {
        let mut data = sample();
        data[2..4].copy_from_slice(&19u16.to_be_bytes());
        assert!(Ipv4Header::decode(&Bytes::from(data)).is_err());
    }

    #[test]
    fn test_options_round_trip() {
        let mut data = sample();
        data[0] = 0x46;
        data.extend_from_slice(&[0x01, 0x01, 0x01, 0x00]);
        let header = Ipv4Header::decode(&Bytes::from(data.clone())).unwrap();
        assert_eq!(header.header_len(), 24);
        assert_eq!(&header.options[..], &[0x01, 0x01, 0x01, 0x00]);

        let mut out = BytesMut::new();
        header.encode(&mut out);
        assert_eq!(&out[..], &data[..]);
    }

    #[test]
    fn test_flags_and_fragment_offset() {
        let mut data = sample();
        data[6..8].copy_from_slice(&0x2010u16.to_be_bytes());
        let header = Ipv4Header::decode(&Bytes::from(data)).unwrap();
        assert!(header.flags.more_fragments);
        assert!(!header.flags.dont_fragment);
        assert_eq!(header.fragment_offset, 0x10);
        assert!(header.is_fragment());
        assert!(header.is_trailing_fragment());
    }

    #[test]
    fn test_first_fragment_is_not_trailing() {
        let mut data = sample();
        data[6..8].copy_from_slice(&0x2000u16.to_be_bytes());
        let header = Ipv4Header::decode(&Bytes::from(data)).unwrap();
        assert!(header.is_fragment());
        assert!(!header.is_trailing_fragment());
    }

    #[test]
    fn test_pad_options() {
        let mut header = Ipv4Header::new(Inet4Address::ZERO, Inet4Address::ZERO, 17, 0);
        header.options = Bytes::from_static(&[0x94, 0x04, 0x00]);
        header.pad_options();
        assert_eq!(&header.options[..], &[0x94, 0x04, 0x00, 0x00]);
        assert_eq!(header.header_len(), 24);

        header.options = Bytes::from(vec![0x01; 41]);
        header.pad_options();
        assert_eq!(header.header_len(), Ipv4Header::MAX_HEADER_SIZE);
    }

    #[test]
    fn test_compute_checksum_validates() {
        let mut header = Ipv4Header::decode(&Bytes::from(sample())).unwrap();
        header.checksum = header.compute_checksum();

        let mut out = BytesMut::new();
        header.encode(&mut out);
        assert!(crate::checksum::validate_checksum(&out));
    }

    #[test]
    fn test_encode_masks_fragment_offset() {
        let mut header = Ipv4Header::new(Inet4Address::ZERO, Inet4Address::ZERO, 17, 0);
        header.flags = IpFlags::NONE;
        header.fragment_offset = 0xffff;
        let mut out = BytesMut::new();
        header.encode(&mut out);
        assert_eq!(&out[6..8], &[0x1f, 0xff]);
    }
}
