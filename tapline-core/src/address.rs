//! Fixed-width link and network address types
//!
//! Each address is a plain byte array of exact length. Equality and hashing
//! are byte-wise; broadcast/multicast classification is computed on demand.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use crate::error::{Error, Result};

/// MAC Address (6 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// Address length in bytes
    pub const LENGTH: usize = 6;

    /// Zero MAC address (00:00:00:00:00:00)
    pub const ZERO: MacAddress = MacAddress([0x00; 6]);

    /// Broadcast MAC address (ff:ff:ff:ff:ff:ff)
    pub const BROADCAST: MacAddress = MacAddress([0xff; 6]);

    /// Base of the IPv4 multicast mapping (01:00:5e:00:00:00)
    pub const IPV4_MULTICAST: MacAddress = MacAddress([0x01, 0x00, 0x5e, 0x00, 0x00, 0x00]);

    /// Create a new MAC address
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Create a MAC address from a slice of exactly 6 bytes
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        let bytes: [u8; 6] = slice.try_into().map_err(|_| {
            Error::InvalidAddress(format!("MAC address needs 6 bytes, got {}", slice.len()))
        })?;
        Ok(Self(bytes))
    }

    /// Create a MAC address from the low 48 bits of an integer
    pub fn from_u64(value: u64) -> Self {
        let b = value.to_be_bytes();
        Self([b[2], b[3], b[4], b[5], b[6], b[7]])
    }

    /// The address as a 48-bit integer
    pub fn to_u64(&self) -> u64 {
        self.0.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
    }

    /// Check a string for `aa:bb:cc:dd:ee:ff` or `aa-bb-cc-dd-ee-ff` form
    pub fn is_valid(s: &str) -> bool {
        let bytes = s.as_bytes();
        if bytes.len() != 17 {
            return false;
        }
        let sep = bytes[2];
        if sep != b':' && sep != b'-' {
            return false;
        }
        bytes.iter().enumerate().all(|(i, &c)| {
            if i % 3 == 2 {
                c == sep
            } else {
                c.is_ascii_hexdigit()
            }
        })
    }

    /// Get bytes as slice
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Convert to array
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Organizationally unique identifier (first three octets)
    pub fn oui(&self) -> [u8; 3] {
        [self.0[0], self.0[1], self.0[2]]
    }

    /// Replace the address bytes in place
    pub fn update(&mut self, other: &MacAddress) {
        self.0 = other.0;
    }

    /// All-ones address
    pub fn is_broadcast(&self) -> bool {
        self.0 == [0xff; 6]
    }

    /// Group bit set, excluding broadcast
    pub fn is_multicast(&self) -> bool {
        !self.is_broadcast() && self.0[0] & 0x01 != 0
    }

    /// Neither multicast nor broadcast
    pub fn is_unicast(&self) -> bool {
        self.0[0] & 0x01 == 0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl FromStr for MacAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidAddress(format!("'{}' is not a MAC address", s));
        let separator = s.chars().find(|c| *c == ':' || *c == '-').ok_or_else(invalid)?;
        let parts: Vec<&str> = s.split(separator).collect();
        if parts.len() != Self::LENGTH {
            return Err(invalid());
        }

        let mut bytes = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            if part.is_empty() || part.len() > 2 || !part.bytes().all(|c| c.is_ascii_hexdigit()) {
                return Err(Error::InvalidAddress(format!("bad MAC octet '{}'", part)));
            }
            bytes[i] = u8::from_str_radix(part, 16)
                .map_err(|_| Error::InvalidAddress(format!("bad MAC octet '{}'", part)))?;
        }

        Ok(MacAddress(bytes))
    }
}

impl From<[u8; 6]> for MacAddress {
    fn from(bytes: [u8; 6]) -> Self {
        MacAddress(bytes)
    }
}

impl From<MacAddress> for [u8; 6] {
    fn from(mac: MacAddress) -> Self {
        mac.0
    }
}

/// IPv4 address (4 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Inet4Address([u8; 4]);

impl Inet4Address {
    /// Address length in bytes
    pub const LENGTH: usize = 4;

    /// 0.0.0.0
    pub const ZERO: Inet4Address = Inet4Address([0; 4]);

    /// 255.255.255.255
    pub const BROADCAST: Inet4Address = Inet4Address([0xff; 4]);

    pub const fn new(a: u8, b: u8, c: u8, d: u8) -> Self {
        Self([a, b, c, d])
    }

    /// Create an address from a slice of exactly 4 bytes
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        let bytes: [u8; 4] = slice.try_into().map_err(|_| {
            Error::InvalidAddress(format!("IPv4 address needs 4 bytes, got {}", slice.len()))
        })?;
        Ok(Self(bytes))
    }

    pub fn from_u32(value: u32) -> Self {
        Self(value.to_be_bytes())
    }

    pub fn to_u32(&self) -> u32 {
        u32::from_be_bytes(self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn octets(&self) -> [u8; 4] {
        self.0
    }

    /// Replace the address bytes in place
    pub fn update(&mut self, other: &Inet4Address) {
        self.0 = other.0;
    }

    pub fn is_broadcast(&self) -> bool {
        self.0 == [0xff; 4]
    }

    /// 224.0.0.0/4
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0xf0 == 0xe0
    }
}

impl fmt::Display for Inet4Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Ipv4Addr::from(self.0).fmt(f)
    }
}

impl FromStr for Inet4Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.parse::<Ipv4Addr>()
            .map(Self::from)
            .map_err(|_| Error::InvalidAddress(format!("'{}' is not an IPv4 address", s)))
    }
}

impl From<Ipv4Addr> for Inet4Address {
    fn from(addr: Ipv4Addr) -> Self {
        Self(addr.octets())
    }
}

impl From<Inet4Address> for Ipv4Addr {
    fn from(addr: Inet4Address) -> Self {
        Ipv4Addr::from(addr.0)
    }
}

impl From<[u8; 4]> for Inet4Address {
    fn from(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }
}

/// IPv6 address (16 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Inet6Address([u8; 16]);

impl Inet6Address {
    /// Address length in bytes
    pub const LENGTH: usize = 16;

    /// ::
    pub const ZERO: Inet6Address = Inet6Address([0; 16]);

    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Create an address from a slice of exactly 16 bytes
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        let bytes: [u8; 16] = slice.try_into().map_err(|_| {
            Error::InvalidAddress(format!("IPv6 address needs 16 bytes, got {}", slice.len()))
        })?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn octets(&self) -> [u8; 16] {
        self.0
    }

    /// Replace the address bytes in place
    pub fn update(&mut self, other: &Inet6Address) {
        self.0 = other.0;
    }

    /// IPv6 has no broadcast address
    pub fn is_broadcast(&self) -> bool {
        false
    }

    /// ff00::/8
    pub fn is_multicast(&self) -> bool {
        self.0[0] == 0xff
    }
}

impl fmt::Display for Inet6Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Ipv6Addr::from(self.0).fmt(f)
    }
}

impl FromStr for Inet6Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.parse::<Ipv6Addr>()
            .map(Self::from)
            .map_err(|_| Error::InvalidAddress(format!("'{}' is not an IPv6 address", s)))
    }
}

impl From<Ipv6Addr> for Inet6Address {
    fn from(addr: Ipv6Addr) -> Self {
        Self(addr.octets())
    }
}

impl From<Inet6Address> for Ipv6Addr {
    fn from(addr: Inet6Address) -> Self {
        Ipv6Addr::from(addr.0)
    }
}

impl From<[u8; 16]> for Inet6Address {
    fn from(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_parse_and_display() {
        let mac: MacAddress = "DE:AD:BE:EF:C0:FE".parse().unwrap();
        assert_eq!(mac.octets(), [0xde, 0xad, 0xbe, 0xef, 0xc0, 0xfe]);
        assert_eq!(mac.to_string(), "de:ad:be:ef:c0:fe");

        let dashed: MacAddress = "de-ad-be-ef-c0-fe".parse().unwrap();
        assert_eq!(mac, dashed);
    }

    #[test]
    fn test_mac_parse_rejects_bad_input() {
        assert!("de:ad:be:ef:c0".parse::<MacAddress>().is_err());
        assert!("de:ad:be:ef:c0:fe:01".parse::<MacAddress>().is_err());
        assert!("zz:ad:be:ef:c0:fe".parse::<MacAddress>().is_err());
        assert!("dead:be:ef:c0:fe:0".parse::<MacAddress>().is_err());
        assert!("+f:00:00:00:00:00".parse::<MacAddress>().is_err());
        assert!("aa:bb-cc:dd:ee:ff".parse::<MacAddress>().is_err());
        assert!("aabbccddeeff".parse::<MacAddress>().is_err());
    }

    #[test]
    fn test_mac_classification() {
        let broadcast: MacAddress = "ff:ff:ff:ff:ff:ff".parse().unwrap();
        assert!(broadcast.is_broadcast());
        assert!(!broadcast.is_multicast());

        let multicast: MacAddress = "01:00:5e:00:00:01".parse().unwrap();
        assert!(multicast.is_multicast());
        assert!(!multicast.is_broadcast());
        assert!(!multicast.is_unicast());

        let unicast: MacAddress = "aa:aa:aa:bb:bb:bb".parse().unwrap();
        assert!(!unicast.is_multicast());
        assert!(unicast.is_unicast());
    }

    #[test]
    fn test_mac_numeric_form() {
        let mac = MacAddress::from_u64(0x0000_dead_beef_c0fe);
        assert_eq!(mac.to_string(), "de:ad:be:ef:c0:fe");
        assert_eq!(mac.to_u64(), 0xdead_beef_c0fe);
        assert_eq!(mac.oui(), [0xde, 0xad, 0xbe]);
    }

    #[test]
    fn test_mac_is_valid() {
        assert!(MacAddress::is_valid("00:11:22:33:44:55"));
        assert!(MacAddress::is_valid("00-11-22-33-44-55"));
        assert!(!MacAddress::is_valid("00:11-22:33:44:55"));
        assert!(!MacAddress::is_valid("0:11:22:33:44:55"));
    }

    #[test]
    fn test_mac_update_in_place() {
        let mut mac = MacAddress::ZERO;
        mac.update(&MacAddress::BROADCAST);
        assert_eq!(mac, MacAddress::BROADCAST);
    }

    #[test]
    fn test_mac_from_slice_length() {
        assert!(MacAddress::from_slice(&[1, 2, 3, 4, 5, 6]).is_ok());
        assert!(MacAddress::from_slice(&[1, 2, 3, 4, 5]).is_err());
    }

    #[test]
    fn test_inet4() {
        let addr: Inet4Address = "192.168.1.124".parse().unwrap();
        assert_eq!(addr.octets(), [192, 168, 1, 124]);
        assert_eq!(addr.to_string(), "192.168.1.124");
        assert_eq!(Inet4Address::from_u32(addr.to_u32()), addr);
        assert!(Inet4Address::BROADCAST.is_broadcast());
        assert!(Inet4Address::new(224, 0, 0, 251).is_multicast());
        assert!(!addr.is_multicast());
        assert!("192.168.1".parse::<Inet4Address>().is_err());
    }

    #[test]
    fn test_inet6() {
        let addr: Inet6Address = "ff02::1".parse().unwrap();
        assert!(addr.is_multicast());
        assert!(!addr.is_broadcast());
        assert_eq!(addr.to_string(), "ff02::1");

        let std_addr: Ipv6Addr = addr.into();
        assert_eq!(Inet6Address::from(std_addr), addr);
        assert!(Inet6Address::from_slice(&[0; 15]).is_err());
    }
}
