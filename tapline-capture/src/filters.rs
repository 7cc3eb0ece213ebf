//! Filter expression builders
//!
//! Small helpers that render expressions in the standard capture-filter
//! grammar. They only build strings; compiling is the driver's job (see
//! [`CompiledFilter::compile`](crate::bpf::CompiledFilter::compile)).

use std::fmt::Display;
use tapline_core::{EtherType, IpProtocol, MacAddress};

/// Frames with the given EtherType
pub fn ether_proto(ether_type: EtherType) -> String {
    format!("ether proto 0x{:04x}", ether_type.value())
}

/// IPv4 or IPv6 packets carrying the given protocol
pub fn ip_proto(protocol: IpProtocol) -> String {
    format!(
        "(ip proto {} or ip6 proto {})",
        protocol.value(),
        protocol.value()
    )
}

/// Packets to or from `address`
pub fn host<A: Display>(address: A) -> String {
    format!("host {}", address)
}

pub fn src_host<A: Display>(address: A) -> String {
    format!("src host {}", address)
}

pub fn dst_host<A: Display>(address: A) -> String {
    format!("dst host {}", address)
}

/// Frames to or from a link-layer address
pub fn ether_host(mac: MacAddress) -> String {
    format!("ether host {}", mac)
}

/// TCP or UDP traffic on `port` in either direction
pub fn port(port: u16) -> String {
    format!("port {}", port)
}

pub fn tcp_port(port: u16) -> String {
    format!("tcp port {}", port)
}

pub fn udp_port(port: u16) -> String {
    format!("udp port {}", port)
}

/// 802.1Q tagged frames, optionally for a single VLAN
pub fn vlan(vlan_id: Option<u16>) -> String {
    match vlan_id {
        Some(id) => format!("vlan {}", id),
        None => "vlan".to_string(),
    }
}

/// Combine filters with AND; an empty list matches everything
pub fn all_of<S: AsRef<str>>(filters: &[S]) -> String {
    join(filters, " and ")
}

/// Combine filters with OR; an empty list matches everything
pub fn any_of<S: AsRef<str>>(filters: &[S]) -> String {
    join(filters, " or ")
}

/// Negate a filter
pub fn not(filter: &str) -> String {
    format!("not ({})", filter)
}

fn join<S: AsRef<str>>(filters: &[S], separator: &str) -> String {
    match filters {
        [] => String::new(),
        [single] => single.as_ref().to_string(),
        _ => filters
            .iter()
            .map(|f| format!("({})", f.as_ref()))
            .collect::<Vec<_>>()
            .join(separator),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tapline_core::Inet4Address;

    #[test]
    fn test_protocol_filters() {
        assert_eq!(ether_proto(EtherType::ARP), "ether proto 0x0806");
        assert_eq!(ip_proto(IpProtocol::TCP), "(ip proto 6 or ip6 proto 6)");
    }

    #[test]
    fn test_host_filters() {
        let addr = Inet4Address::new(192, 168, 1, 1);
        assert_eq!(host(addr), "host 192.168.1.1");
        assert_eq!(src_host(addr), "src host 192.168.1.1");
        assert_eq!(dst_host("10.0.0.1"), "dst host 10.0.0.1");

        let mac = MacAddress::new([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
        assert_eq!(ether_host(mac), "ether host aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn test_port_filters() {
        assert_eq!(port(53), "port 53");
        assert_eq!(tcp_port(80), "tcp port 80");
        assert_eq!(udp_port(67), "udp port 67");
    }

    #[test]
    fn test_vlan_filters() {
        assert_eq!(vlan(None), "vlan");
        assert_eq!(vlan(Some(100)), "vlan 100");
    }

    #[test]
    fn test_all_of() {
        assert_eq!(all_of(&["tcp", "port 80"]), "(tcp) and (port 80)");
        assert_eq!(all_of(&["arp"]), "arp");

        let empty: [&str; 0] = [];
        assert_eq!(all_of(&empty), "");
    }

    #[test]
    fn test_any_of() {
        let filters = vec![tcp_port(80), tcp_port(443)];
        assert_eq!(any_of(&filters), "(tcp port 80) or (tcp port 443)");
    }

    #[test]
    fn test_not() {
        assert_eq!(not("tcp"), "not (tcp)");
        assert_eq!(not(&port(22)), "not (port 22)");
    }

    #[test]
    fn test_nesting() {
        let filter = all_of(&[ether_proto(EtherType::IPV4), not(&any_of(&[port(22), port(23)]))]);
        assert_eq!(
            filter,
            "(ether proto 0x0800) and (not ((port 22) or (port 23)))"
        );
    }
}
