//! TCP header (RFC 793)

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tapline_core::{Error, Result};

use crate::header::{ensure_len, pad_to_words, HeaderCodec};

/// TCP flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TcpFlags {
    /// FIN - No more data from sender
    pub fin: bool,
    /// SYN - Synchronize sequence numbers
    pub syn: bool,
    /// RST - Reset the connection
    pub rst: bool,
    /// PSH - Push function
    pub psh: bool,
    /// ACK - Acknowledgment field is significant
    pub ack: bool,
    /// URG - Urgent pointer field is significant
    pub urg: bool,
    /// ECE - ECN-Echo
    pub ece: bool,
    /// CWR - Congestion Window Reduced
    pub cwr: bool,
}

impl TcpFlags {
    /// No flags set
    pub const NONE: TcpFlags = TcpFlags::from_u8(0);

    /// SYN flag (connection initiation)
    pub const SYN: TcpFlags = TcpFlags::from_u8(0b0000_0010);

    /// SYN+ACK flags (connection acknowledgment)
    pub const SYN_ACK: TcpFlags = TcpFlags::from_u8(0b0001_0010);

    /// ACK flag
    pub const ACK: TcpFlags = TcpFlags::from_u8(0b0001_0000);

    /// RST flag (connection reset)
    pub const RST: TcpFlags = TcpFlags::from_u8(0b0000_0100);

    /// PSH+ACK flags (push data)
    pub const PSH_ACK: TcpFlags = TcpFlags::from_u8(0b0001_1000);

    /// Convert flags to u8 value
    pub fn to_u8(self) -> u8 {
        (self.fin as u8)
            | (self.syn as u8) << 1
            | (self.rst as u8) << 2
            | (self.psh as u8) << 3
            | (self.ack as u8) << 4
            | (self.urg as u8) << 5
            | (self.ece as u8) << 6
            | (self.cwr as u8) << 7
    }

    /// Parse flags from u8 value
    pub const fn from_u8(value: u8) -> Self {
        TcpFlags {
            fin: (value & 0b0000_0001) != 0,
            syn: (value & 0b0000_0010) != 0,
            rst: (value & 0b0000_0100) != 0,
            psh: (value & 0b0000_1000) != 0,
            ack: (value & 0b0001_0000) != 0,
            urg: (value & 0b0010_0000) != 0,
            ece: (value & 0b0100_0000) != 0,
            cwr: (value & 0b1000_0000) != 0,
        }
    }
}

/// TCP header, options included
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TcpHeader {
    pub source_port: u16,
    pub destination_port: u16,
    pub sequence_number: u32,
    pub acknowledgment_number: u32,
    /// Header length in 32-bit words
    pub data_offset: u8,
    /// Reserved bits, NS included (4 bits)
    pub reserved: u8,
    pub flags: TcpFlags,
    pub window_size: u16,
    pub checksum: u16,
    pub urgent_pointer: u16,
    /// Raw option bytes, `(data_offset - 5) * 4` long
    pub options: Bytes,
}

impl TcpHeader {
    /// Minimum TCP header size (without options)
    pub const MIN_HEADER_SIZE: usize = 20;

    /// Maximum TCP header size (with maximum options)
    pub const MAX_HEADER_SIZE: usize = 60;

    pub fn new(source_port: u16, destination_port: u16, sequence_number: u32, flags: TcpFlags) -> Self {
        Self {
            source_port,
            destination_port,
            sequence_number,
            acknowledgment_number: 0,
            data_offset: 5,
            reserved: 0,
            flags,
            window_size: 65535,
            checksum: 0,
            urgent_pointer: 0,
            options: Bytes::new(),
        }
    }

    /// Zero-pad options to a 32-bit boundary, capped at the maximum header size
    pub fn pad_options(&mut self) {
        self.options = pad_to_words(&self.options, Self::MAX_HEADER_SIZE - Self::MIN_HEADER_SIZE);
    }
}

impl HeaderCodec for TcpHeader {
    const PROTOCOL: &'static str = "TCP";
    const MIN_LEN: usize = Self::MIN_HEADER_SIZE;

    fn decode(buf: &Bytes) -> Result<Self> {
        ensure_len(Self::PROTOCOL, Self::MIN_LEN, buf.len())?;
        let mut cursor = &buf[..Self::MIN_HEADER_SIZE];

        let source_port = cursor.get_u16();
        let destination_port = cursor.get_u16();
        let sequence_number = cursor.get_u32();
        let acknowledgment_number = cursor.get_u32();

        let offset_reserved = cursor.get_u8();
        let data_offset = offset_reserved >> 4;
        let header_len = data_offset as usize * 4;
        if header_len < Self::MIN_HEADER_SIZE {
            return Err(Error::malformed(
                Self::PROTOCOL,
                format!("data offset {} below minimum of 5", data_offset),
            ));
        }
        if header_len > buf.len() {
            return Err(Error::malformed(
                Self::PROTOCOL,
                format!(
                    "data offset {} exceeds the {} bytes available",
                    data_offset,
                    buf.len()
                ),
            ));
        }

        Ok(Self {
            source_port,
            destination_port,
            sequence_number,
            acknowledgment_number,
            data_offset,
            reserved: offset_reserved & 0x0f,
            flags: TcpFlags::from_u8(cursor.get_u8()),
            window_size: cursor.get_u16(),
            checksum: cursor.get_u16(),
            urgent_pointer: cursor.get_u16(),
            options: buf.slice(Self::MIN_HEADER_SIZE..header_len),
        })
    }

    fn header_len(&self) -> usize {
        Self::MIN_HEADER_SIZE + self.options.len()
    }

    fn encode(&self, out: &mut BytesMut) {
        out.put_u16(self.source_port);
        out.put_u16(self.destination_port);
        out.put_u32(self.sequence_number);
        out.put_u32(self.acknowledgment_number);
        // Data offset (4 bits) + Reserved (3 bits) + NS flag (1 bit)
        out.put_u8(((self.data_offset & 0x0f) << 4) | (self.reserved & 0x0f));
        out.put_u8(self.flags.to_u8());
        out.put_u16(self.window_size);
        out.put_u16(self.checksum);
        out.put_u16(self.urgent_pointer);
        out.put_slice(&self.options);
    }
}
