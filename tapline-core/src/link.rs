//! Data link types

use std::fmt;

/// Link-layer header type of a capture source (libpcap DLT values)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkType {
    /// IEEE 802.3 Ethernet (DLT_EN10MB)
    Ethernet,
    /// Raw IP, version taken from the first nibble (DLT_RAW)
    Raw,
    /// Raw IPv4 (LINKTYPE_IPV4)
    Ipv4,
    /// Raw IPv6 (LINKTYPE_IPV6)
    Ipv6,
    /// Any other link type; frames decode to an opaque payload
    Other(i32),
}

impl LinkType {
    /// Convert from a DLT/LINKTYPE number
    pub fn from_dlt(value: i32) -> Self {
        match value {
            1 => LinkType::Ethernet,
            // DLT_RAW differs between platforms, 101 is the savefile value
            12 | 14 | 101 => LinkType::Raw,
            228 => LinkType::Ipv4,
            229 => LinkType::Ipv6,
            other => LinkType::Other(other),
        }
    }

    /// DLT number used when talking to the driver
    pub fn to_dlt(self) -> i32 {
        match self {
            LinkType::Ethernet => 1,
            LinkType::Raw => 12,
            LinkType::Ipv4 => 228,
            LinkType::Ipv6 => 229,
            LinkType::Other(value) => value,
        }
    }

    /// Whether the codec can decode frames of this link type
    pub fn is_supported(self) -> bool {
        !matches!(self, LinkType::Other(_))
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkType::Ethernet => write!(f, "EN10MB"),
            LinkType::Raw => write!(f, "RAW"),
            LinkType::Ipv4 => write!(f, "IPV4"),
            LinkType::Ipv6 => write!(f, "IPV6"),
            LinkType::Other(value) => write!(f, "DLT({})", value),
        }
    }
}
