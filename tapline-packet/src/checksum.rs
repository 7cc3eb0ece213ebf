//! Internet checksum (RFC 1071) helpers
//!
//! Decoding never checks these and encoding never fills them in; headers
//! carry whatever checksum they were given. [`crate::PacketStack::update_checksums`]
//! recomputes them explicitly.

/// One's-complement sum of `data` folded into 16 bits, starting from `initial`
pub fn checksum_accumulate(initial: u32, data: &[u8]) -> u32 {
    let mut sum = initial;

    let mut chunks = data.chunks_exact(2);
    for chunk in &mut chunks {
        sum += u16::from_be_bytes([chunk[0], chunk[1]]) as u32;
    }

    // Odd trailing byte is padded with zero
    if let Some(&byte) = chunks.remainder().first() {
        sum += (byte as u32) << 8;
    }

    while (sum >> 16) != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }

    sum
}

/// Calculates the Internet Checksum as defined in RFC 1071.
///
/// ```
/// use tapline_packet::checksum::internet_checksum;
///
/// let header = [0x45, 0x00, 0x00, 0x3c];
/// let checksum = internet_checksum(&header);
/// assert_ne!(checksum, 0);
/// ```
pub fn internet_checksum(data: &[u8]) -> u16 {
    !(checksum_accumulate(0, data) as u16)
}

/// TCP/UDP checksum over an IPv4 pseudo-header plus `data`
pub fn transport_checksum(src_ip: &[u8; 4], dst_ip: &[u8; 4], protocol: u8, data: &[u8]) -> u16 {
    let mut pseudo = [0u8; 12];
    pseudo[0..4].copy_from_slice(src_ip);
    pseudo[4..8].copy_from_slice(dst_ip);
    pseudo[9] = protocol;
    pseudo[10..12].copy_from_slice(&(data.len() as u16).to_be_bytes());

    let sum = checksum_accumulate(0, &pseudo);
    !(checksum_accumulate(sum, data) as u16)
}

/// TCP/UDP checksum over an IPv6 pseudo-header plus `data` (RFC 8200 §8.1)
pub fn transport_checksum_v6(
    src_ip: &[u8; 16],
    dst_ip: &[u8; 16],
    next_header: u8,
    data: &[u8],
) -> u16 {
    let mut pseudo = [0u8; 40];
    pseudo[0..16].copy_from_slice(src_ip);
    pseudo[16..32].copy_from_slice(dst_ip);
    pseudo[32..36].copy_from_slice(&(data.len() as u32).to_be_bytes());
    pseudo[39] = next_header;

    let sum = checksum_accumulate(0, &pseudo);
    !(checksum_accumulate(sum, data) as u16)
}

/// True when `data`, checksum field included, sums to all-ones
pub fn validate_checksum(data: &[u8]) -> bool {
    let result = internet_checksum(data);
    result == 0 || result == 0xFFFF
}
