//! Well-known protocol number families

use std::fmt;

use crate::named::{NamedNumber, NumberFamily, UNKNOWN};

/// EtherType family (16-bit, IEEE 802)
pub struct EtherTypes;

/// EtherType value
pub type EtherType = NamedNumber<EtherTypes>;

impl EtherType {
    /// Values up to this one are IEEE 802.3 frame lengths, not types
    pub const IEEE802_3_MAX_LENGTH: u16 = 1500;

    pub const IPV4: EtherType = NamedNumber::constant(0x0800, "IPv4");
    pub const ARP: EtherType = NamedNumber::constant(0x0806, "ARP");
    pub const DOT1Q_VLAN_TAGGED_FRAMES: EtherType =
        NamedNumber::constant(0x8100, "IEEE 802.1Q VLAN-tagged frames");
    pub const RARP: EtherType = NamedNumber::constant(0x8035, "RARP");
    pub const APPLETALK: EtherType = NamedNumber::constant(0x809b, "Appletalk");
    pub const IPV6: EtherType = NamedNumber::constant(0x86dd, "IPv6");
    pub const PPP: EtherType = NamedNumber::constant(0x880b, "PPP");
    pub const MPLS: EtherType = NamedNumber::constant(0x8847, "MPLS");
    pub const PPPOE_DISCOVERY_STAGE: EtherType =
        NamedNumber::constant(0x8863, "PPPoE Discovery Stage");
    pub const PPPOE_SESSION_STAGE: EtherType =
        NamedNumber::constant(0x8864, "PPPoE Session Stage");
    pub const LLDP: EtherType = NamedNumber::constant(0x88cc, "LLDP");
    pub const QINQ: EtherType = NamedNumber::constant(0x88a8, "IEEE 802.1ad Q-in-Q");
    pub const UNKNOWN: EtherType = NamedNumber::constant(0xffff, UNKNOWN);

    /// True when the value is an 802.3 length rather than a type
    pub fn is_length(value: u16) -> bool {
        value <= Self::IEEE802_3_MAX_LENGTH
    }
}

impl NumberFamily for EtherTypes {
    type Value = u16;

    const FAMILY: &'static str = "EtherType";

    fn unknown() -> EtherType {
        EtherType::UNKNOWN
    }

    fn is_in_range(value: u16) -> bool {
        EtherType::is_length(value)
    }

    fn well_known() -> Vec<EtherType> {
        vec![
            EtherType::IPV4,
            EtherType::ARP,
            EtherType::DOT1Q_VLAN_TAGGED_FRAMES,
            EtherType::RARP,
            EtherType::APPLETALK,
            EtherType::IPV6,
            EtherType::PPP,
            EtherType::MPLS,
            EtherType::PPPOE_DISCOVERY_STAGE,
            EtherType::PPPOE_SESSION_STAGE,
            EtherType::LLDP,
            EtherType::QINQ,
        ]
    }

    fn format_value(value: u16, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if EtherType::is_length(value) {
            write!(f, "{}", value)
        } else {
            write!(f, "0x{:04x}", value)
        }
    }
}

/// IP protocol number family (IPv4 protocol / IPv6 next header)
pub struct IpProtocols;

/// IP protocol number
pub type IpProtocol = NamedNumber<IpProtocols>;

impl IpProtocol {
    pub const HOPOPT: IpProtocol = NamedNumber::constant(0, "IPv6 Hop-by-Hop Option");
    pub const ICMP: IpProtocol = NamedNumber::constant(1, "ICMP");
    pub const IGMP: IpProtocol = NamedNumber::constant(2, "IGMP");
    pub const IPV4: IpProtocol = NamedNumber::constant(4, "IPv4 encapsulation");
    pub const TCP: IpProtocol = NamedNumber::constant(6, "TCP");
    pub const UDP: IpProtocol = NamedNumber::constant(17, "UDP");
    pub const IPV6: IpProtocol = NamedNumber::constant(41, "IPv6 encapsulation");
    pub const IPV6_ROUTE: IpProtocol = NamedNumber::constant(43, "Routing Header for IPv6");
    pub const IPV6_FRAG: IpProtocol = NamedNumber::constant(44, "Fragment Header for IPv6");
    pub const GRE: IpProtocol = NamedNumber::constant(47, "GRE");
    pub const ESP: IpProtocol = NamedNumber::constant(50, "ESP");
    pub const AH: IpProtocol = NamedNumber::constant(51, "AH");
    pub const ICMPV6: IpProtocol = NamedNumber::constant(58, "ICMPv6");
    pub const IPV6_NONXT: IpProtocol = NamedNumber::constant(59, "No Next Header for IPv6");
    pub const OSPF: IpProtocol = NamedNumber::constant(89, "OSPF");
    pub const SCTP: IpProtocol = NamedNumber::constant(132, "SCTP");
    pub const UNKNOWN: IpProtocol = NamedNumber::constant(255, UNKNOWN);
}

impl NumberFamily for IpProtocols {
    type Value = u8;

    const FAMILY: &'static str = "IpProtocol";

    fn unknown() -> IpProtocol {
        IpProtocol::UNKNOWN
    }

    // 255 is reserved by IANA
    fn is_in_range(value: u8) -> bool {
        value != u8::MAX
    }

    fn well_known() -> Vec<IpProtocol> {
        vec![
            IpProtocol::HOPOPT,
            IpProtocol::ICMP,
            IpProtocol::IGMP,
            IpProtocol::IPV4,
            IpProtocol::TCP,
            IpProtocol::UDP,
            IpProtocol::IPV6,
            IpProtocol::IPV6_ROUTE,
            IpProtocol::IPV6_FRAG,
            IpProtocol::GRE,
            IpProtocol::ESP,
            IpProtocol::AH,
            IpProtocol::ICMPV6,
            IpProtocol::IPV6_NONXT,
            IpProtocol::OSPF,
            IpProtocol::SCTP,
        ]
    }

    fn format_value(value: u8, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", value)
    }
}

/// TCP/UDP port family
pub struct Ports;

/// Transport port number
pub type Port = NamedNumber<Ports>;

impl Port {
    pub const FTP_DATA: Port = NamedNumber::constant(20, "FTP Data");
    pub const FTP: Port = NamedNumber::constant(21, "FTP");
    pub const SSH: Port = NamedNumber::constant(22, "SSH");
    pub const TELNET: Port = NamedNumber::constant(23, "Telnet");
    pub const SMTP: Port = NamedNumber::constant(25, "SMTP");
    pub const DOMAIN: Port = NamedNumber::constant(53, "Domain Name Server");
    pub const BOOTPS: Port = NamedNumber::constant(67, "Bootstrap Protocol Server");
    pub const BOOTPC: Port = NamedNumber::constant(68, "Bootstrap Protocol Client");
    pub const HTTP: Port = NamedNumber::constant(80, "HTTP");
    pub const POP3: Port = NamedNumber::constant(110, "POP3");
    pub const NTP: Port = NamedNumber::constant(123, "NTP");
    pub const SNMP: Port = NamedNumber::constant(161, "SNMP");
    pub const HTTPS: Port = NamedNumber::constant(443, "HTTPS");
    pub const UNKNOWN: Port = NamedNumber::constant(0, UNKNOWN);
}

impl NumberFamily for Ports {
    type Value = u16;

    const FAMILY: &'static str = "Port";

    fn unknown() -> Port {
        Port::UNKNOWN
    }

    // Port 0 is reserved
    fn is_in_range(value: u16) -> bool {
        value != 0
    }

    fn well_known() -> Vec<Port> {
        vec![
            Port::FTP_DATA,
            Port::FTP,
            Port::SSH,
            Port::TELNET,
            Port::SMTP,
            Port::DOMAIN,
            Port::BOOTPS,
            Port::BOOTPC,
            Port::HTTP,
            Port::POP3,
            Port::NTP,
            Port::SNMP,
            Port::HTTPS,
        ]
    }

    fn format_value(value: u16, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::named::NamedNumberRegistry;

    #[test]
    fn test_registered_lookup() {
        let registry = NamedNumberRegistry::<EtherTypes>::with_defaults();
        assert_eq!(registry.get_instance(0x0800), EtherType::IPV4);
        assert_eq!(registry.get_instance(0x86dd).name(), "IPv6");
    }

    #[test]
    fn test_lookup_is_idempotent() {
        let registry = NamedNumberRegistry::<EtherTypes>::with_defaults();
        let before = registry.len();
        let first = registry.get_instance(0x0806);
        let second = registry.get_instance(0x0806);
        assert_eq!(first, second);

        let a = registry.get_instance(0x1234);
        let b = registry.get_instance(0x1234);
        assert_eq!(a, b);
        assert_eq!(registry.len(), before);
    }

    #[test]
    fn test_length_range_is_unnamed() {
        let registry = NamedNumberRegistry::<EtherTypes>::with_defaults();
        let number = registry.get_instance(64);
        assert_eq!(number.value(), 64);
        assert!(number.is_unnamed());
        assert!(!number.is_unknown());
        assert_eq!(number.to_string(), "64 (-)");
    }

    #[test]
    fn test_out_of_range_is_unknown() {
        let registry = NamedNumberRegistry::<EtherTypes>::with_defaults();
        let number = registry.get_instance(0x9999);
        assert!(number.is_unknown());
        assert_eq!(number, EtherType::UNKNOWN);

        let protocols = NamedNumberRegistry::<IpProtocols>::with_defaults();
        assert!(protocols.get_instance(255).is_unknown());
        assert!(protocols.get_instance(200).is_unnamed());
    }

    #[test]
    fn test_register_replaces_and_returns_previous() {
        let registry = NamedNumberRegistry::<EtherTypes>::with_defaults();
        let custom = EtherType::new(0x88b5, "Local Experimental");
        assert!(registry.register(custom.clone()).is_none());
        assert_eq!(registry.get_instance(0x88b5), custom);

        let renamed = EtherType::new(0x88b5, "Lab Protocol");
        let previous = registry.register(renamed.clone());
        assert_eq!(previous, Some(custom));
        assert_eq!(registry.get_instance(0x88b5), renamed);

        // Re-registering the same binding is a no-op apart from the return value
        assert_eq!(registry.register(renamed.clone()), Some(renamed));
    }

    #[test]
    fn test_display_includes_value_and_name() {
        assert_eq!(EtherType::IPV4.to_string(), "0x0800 (IPv4)");
        assert_eq!(IpProtocol::TCP.to_string(), "6 (TCP)");
        assert_eq!(Port::HTTPS.to_string(), "443 (HTTPS)");
    }

    #[test]
    fn test_ordering_by_value() {
        let registry = NamedNumberRegistry::<IpProtocols>::with_defaults();
        let entries = registry.entries();
        assert!(entries.windows(2).all(|w| w[0].value() < w[1].value()));
        assert_eq!(entries.first().map(|n| n.value()), Some(0));
    }
}
