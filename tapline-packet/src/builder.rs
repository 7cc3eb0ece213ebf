//! Packet builder for constructing packet stacks with a fluent API
//!
//! The builder assembles typed headers from layer 2 (Ethernet, optionally
//! VLAN-tagged) down to layer 4 (TCP/UDP/ICMP echo), then fills in length
//! fields and checksums so the result is ready to transmit.

use bytes::Bytes;
use tapline_core::{
    EtherType, Error, Inet4Address, Inet6Address, IpProtocol, LinkType, MacAddress, Result,
};

use crate::ethernet::EthernetHeader;
use crate::header::Header;
use crate::icmp::IcmpHeader;
use crate::ipv4::Ipv4Header;
use crate::ipv6::Ipv6Header;
use crate::stack::{Packet, PacketStack, Payload};
use crate::tcp::{TcpFlags, TcpHeader};
use crate::udp::UdpHeader;
use crate::vlan::Dot1qHeader;

/// Layer 2 frame type
#[derive(Debug, Clone, Copy)]
struct Layer2 {
    src: MacAddress,
    dst: MacAddress,
    vlan: Option<u16>,
}

/// Layer 3 packet type
#[derive(Debug, Clone, Copy)]
enum Layer3 {
    Ipv4 {
        src: Inet4Address,
        dst: Inet4Address,
        ttl: u8,
        identification: u16,
    },
    Ipv6 {
        src: Inet6Address,
        dst: Inet6Address,
        hop_limit: u8,
    },
}

/// Layer 4 segment/datagram type
#[derive(Debug, Clone, Copy)]
enum Layer4 {
    Udp {
        src_port: u16,
        dst_port: u16,
    },
    Tcp {
        src_port: u16,
        dst_port: u16,
        seq: u32,
        ack: u32,
        flags: TcpFlags,
        window: u16,
    },
    IcmpEcho {
        identifier: u16,
        sequence: u16,
    },
}

/// Fluent builder for transmit-ready [`PacketStack`]s
///
/// # Examples
///
/// ```
/// use tapline_core::{Inet4Address, MacAddress};
/// use tapline_packet::{StackBuilder, TcpFlags};
///
/// let frame = StackBuilder::new()
///     .ethernet(MacAddress::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]), MacAddress::BROADCAST)
///     .ipv4(Inet4Address::new(10, 0, 0, 1), Inet4Address::new(10, 0, 0, 2))
///     .tcp(40000, 80, 1, 0, TcpFlags::SYN)
///     .build_bytes()
///     .unwrap();
/// assert_eq!(frame.len(), 54);
/// ```
#[derive(Debug, Clone, Default)]
pub struct StackBuilder {
    layer2: Option<Layer2>,
    layer3: Option<Layer3>,
    layer4: Option<Layer4>,
    payload: Bytes,
}

impl StackBuilder {
    /// Create a new packet builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an Ethernet layer. Without one the stack uses the raw IP link type.
    pub fn ethernet(mut self, src: MacAddress, dst: MacAddress) -> Self {
        self.layer2 = Some(Layer2 {
            src,
            dst,
            vlan: None,
        });
        self
    }

    /// Tag the Ethernet frame with an 802.1Q VLAN id
    ///
    /// Must be called after `ethernet()`.
    pub fn vlan(mut self, vlan_id: u16) -> Self {
        if let Some(layer2) = self.layer2.as_mut() {
            layer2.vlan = Some(vlan_id);
        }
        self
    }

    /// Add an IPv4 layer
    pub fn ipv4(mut self, src: Inet4Address, dst: Inet4Address) -> Self {
        self.layer3 = Some(Layer3::Ipv4 {
            src,
            dst,
            ttl: 64,
            identification: 0,
        });
        self
    }

    /// Add an IPv6 layer
    pub fn ipv6(mut self, src: Inet6Address, dst: Inet6Address) -> Self {
        self.layer3 = Some(Layer3::Ipv6 {
            src,
            dst,
            hop_limit: 64,
        });
        self
    }

    /// Set the TTL (IPv4) or hop limit (IPv6)
    ///
    /// Must be called after `ipv4()` or `ipv6()`.
    pub fn ttl(mut self, new_ttl: u8) -> Self {
        match self.layer3 {
            Some(Layer3::Ipv4 { ref mut ttl, .. }) => *ttl = new_ttl,
            Some(Layer3::Ipv6 {
                ref mut hop_limit, ..
            }) => *hop_limit = new_ttl,
            None => {}
        }
        self
    }

    /// Set the identification for the IPv4 layer
    ///
    /// Must be called after `ipv4()`.
    pub fn identification(mut self, id: u16) -> Self {
        if let Some(Layer3::Ipv4 {
            ref mut identification,
            ..
        }) = self.layer3
        {
            *identification = id;
        }
        self
    }

    /// Add a UDP layer
    pub fn udp(mut self, src_port: u16, dst_port: u16) -> Self {
        self.layer4 = Some(Layer4::Udp { src_port, dst_port });
        self
    }

    /// Add a TCP layer
    pub fn tcp(mut self, src_port: u16, dst_port: u16, seq: u32, ack: u32, flags: TcpFlags) -> Self {
        self.layer4 = Some(Layer4::Tcp {
            src_port,
            dst_port,
            seq,
            ack,
            flags,
            window: 65535,
        });
        self
    }

    /// Set the TCP window size
    ///
    /// Must be called after `tcp()`.
    pub fn window(mut self, new_window: u16) -> Self {
        if let Some(Layer4::Tcp { ref mut window, .. }) = self.layer4 {
            *window = new_window;
        }
        self
    }

    /// Add an ICMP echo request (IPv4 only)
    pub fn icmp_echo(mut self, identifier: u16, sequence: u16) -> Self {
        self.layer4 = Some(Layer4::IcmpEcho {
            identifier,
            sequence,
        });
        self
    }

    /// Set the payload data
    pub fn payload(mut self, data: impl Into<Bytes>) -> Self {
        self.payload = data.into();
        self
    }

    /// Build the stack with lengths and checksums filled in
    ///
    /// # Errors
    ///
    /// Returns an error if the layer configuration is invalid (Layer 4
    /// without Layer 3, ICMP over IPv6, or nothing but a payload).
    pub fn build(self) -> Result<PacketStack> {
        let mut inner: Payload = self.payload.into();

        if let Some(layer4) = self.layer4 {
            let layer3 = self
                .layer3
                .ok_or_else(|| Error::PacketConstruction("Layer 4 requires Layer 3".into()))?;

            let header: Header = match layer4 {
                Layer4::Udp { src_port, dst_port } => {
                    UdpHeader::new(src_port, dst_port, inner.encoded_len()).into()
                }
                Layer4::Tcp {
                    src_port,
                    dst_port,
                    seq,
                    ack,
                    flags,
                    window,
                } => {
                    let mut tcp = TcpHeader::new(src_port, dst_port, seq, flags);
                    tcp.acknowledgment_number = ack;
                    tcp.window_size = window;
                    tcp.into()
                }
                Layer4::IcmpEcho {
                    identifier,
                    sequence,
                } => {
                    if matches!(layer3, Layer3::Ipv6 { .. }) {
                        return Err(Error::PacketConstruction(
                            "ICMP echo requires IPv4".into(),
                        ));
                    }
                    IcmpHeader::echo_request(identifier, sequence).into()
                }
            };
            inner = Packet::new(header).with_payload(inner).into();
        }

        let protocol = match self.layer4 {
            Some(Layer4::Udp { .. }) => IpProtocol::UDP.value(),
            Some(Layer4::Tcp { .. }) => IpProtocol::TCP.value(),
            Some(Layer4::IcmpEcho { .. }) => IpProtocol::ICMP.value(),
            None => IpProtocol::IPV6_NONXT.value(),
        };

        let mut ether_type = None;
        if let Some(layer3) = self.layer3 {
            let payload_len = inner.encoded_len();
            let packet = match layer3 {
                Layer3::Ipv4 {
                    src,
                    dst,
                    ttl,
                    identification,
                } => {
                    let mut ip = Ipv4Header::new(src, dst, protocol, payload_len);
                    ip.ttl = ttl;
                    ip.identification = identification;
                    ether_type = Some(EtherType::IPV4.value());
                    Packet::new(ip)
                }
                Layer3::Ipv6 {
                    src,
                    dst,
                    hop_limit,
                } => {
                    let mut ip = Ipv6Header::new(src, dst, protocol, payload_len);
                    ip.hop_limit = hop_limit;
                    ether_type = Some(EtherType::IPV6.value());
                    Packet::new(ip)
                }
            };
            inner = packet.with_payload(inner).into();
        }

        let (link_type, root) = match self.layer2 {
            Some(layer2) => {
                let ether_type = ether_type.ok_or_else(|| {
                    Error::PacketConstruction("Ethernet frame requires Layer 3".into())
                })?;
                let (outer_type, body): (u16, Payload) = match layer2.vlan {
                    Some(vlan_id) => (
                        EtherType::DOT1Q_VLAN_TAGGED_FRAMES.value(),
                        Packet::new(Dot1qHeader::new(vlan_id, ether_type))
                            .with_payload(inner)
                            .into(),
                    ),
                    None => (ether_type, inner),
                };
                let ethernet = EthernetHeader::new(layer2.dst, layer2.src, outer_type);
                (LinkType::Ethernet, Packet::new(ethernet).with_payload(body))
            }
            None => match inner {
                Payload::Packet(packet) => (LinkType::Raw, *packet),
                Payload::Opaque(_) => {
                    return Err(Error::PacketConstruction(
                        "at least one header layer is required".into(),
                    ))
                }
            },
        };

        let mut stack = PacketStack::from_packet(link_type, root);
        stack.update_lengths();
        stack.update_checksums();
        Ok(stack)
    }

    /// Build the stack and flatten it to wire bytes
    pub fn build_bytes(self) -> Result<Bytes> {
        Ok(self.build()?.encode())
    }

    /// Build and send the packet
    ///
    /// This is a convenience method that builds the packet and sends it
    /// using the provided transmit function.
    pub fn send<F>(self, mut tx: F) -> Result<()>
    where
        F: FnMut(&[u8]) -> Result<()>,
    {
        let packet = self.build_bytes()?;
        tx(&packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::validate_checksum;
    use crate::header::LayerKind;
    use crate::registry::Registry;

    fn mac(last: u8) -> MacAddress {
        MacAddress::new([0x02, 0x00, 0x00, 0x00, 0x00, last])
    }

    #[test]
    fn test_build_tcp_syn() {
        let stack = StackBuilder::new()
            .ethernet(mac(1), mac(2))
            .ipv4(Inet4Address::new(192, 168, 1, 1), Inet4Address::new(192, 168, 1, 2))
            .ttl(32)
            .tcp(1234, 80, 1000, 0, TcpFlags::SYN)
            .window(1024)
            .build()
            .unwrap();

        assert_eq!(stack.link_type(), LinkType::Ethernet);
        assert_eq!(
            stack.kinds(),
            vec![LayerKind::Ethernet, LayerKind::Ipv4, LayerKind::Tcp]
        );
        let ip = stack.ipv4().unwrap();
        assert_eq!(ip.total_length, 40);
        assert_eq!(ip.ttl, 32);
        assert_eq!(ip.protocol, 6);
        assert_eq!(stack.tcp().unwrap().window_size, 1024);
        assert_eq!(stack.ethernet().unwrap().destination, mac(2));

        let bytes = stack.encode();
        assert_eq!(bytes.len(), 54);
        assert!(validate_checksum(&bytes[14..34]));

        let registry = Registry::with_defaults();
        let decoded = PacketStack::decode(&bytes, LinkType::Ethernet, &registry).unwrap();
        assert_eq!(decoded, stack);
    }

    #[test]
    fn test_build_udp_with_payload_over_vlan() {
        let stack = StackBuilder::new()
            .ethernet(mac(1), MacAddress::BROADCAST)
            .vlan(42)
            .ipv4(Inet4Address::new(10, 0, 0, 1), Inet4Address::BROADCAST)
            .udp(68, 67)
            .payload(vec![0xaa; 12])
            .build()
            .unwrap();

        assert_eq!(stack.dot1q().unwrap().vlan_id, 42);
        assert_eq!(stack.ethernet().unwrap().ether_type, 0x8100);
        let udp = stack.udp().unwrap();
        assert_eq!(udp.length, 20);
        assert_ne!(udp.checksum, 0);
        assert_eq!(stack.ipv4().unwrap().total_length, 40);
        assert_eq!(stack.application_payload().unwrap().len(), 12);
    }

    #[test]
    fn test_build_ipv6_without_link_layer() {
        let stack = StackBuilder::new()
            .ipv6("fe80::1".parse().unwrap(), "fe80::2".parse().unwrap())
            .udp(546, 547)
            .payload(Bytes::from_static(b"dhcp"))
            .build()
            .unwrap();

        assert_eq!(stack.link_type(), LinkType::Raw);
        assert_eq!(stack.ipv6().unwrap().payload_length, 12);
        assert_eq!(stack.ipv6().unwrap().next_header, 17);

        let registry = Registry::with_defaults();
        let decoded = PacketStack::decode(&stack.encode(), LinkType::Raw, &registry).unwrap();
        assert_eq!(decoded, stack);
    }

    #[test]
    fn test_icmp_echo_checksum() {
        let stack = StackBuilder::new()
            .ipv4(Inet4Address::new(10, 0, 0, 1), Inet4Address::new(10, 0, 0, 2))
            .icmp_echo(7, 1)
            .payload(vec![0x61; 8])
            .build()
            .unwrap();
        let bytes = stack.encode();
        assert!(validate_checksum(&bytes[20..]));
    }

    #[test]
    fn test_layer4_requires_layer3() {
        let result = StackBuilder::new()
            .ethernet(mac(1), mac(2))
            .udp(1, 2)
            .build();
        assert!(matches!(result, Err(Error::PacketConstruction(_))));
    }

    #[test]
    fn test_icmp_over_ipv6_rejected() {
        let result = StackBuilder::new()
            .ipv6(Inet6Address::ZERO, Inet6Address::ZERO)
            .icmp_echo(1, 1)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_send_uses_transmit_fn() {
        let mut sent = Vec::new();
        StackBuilder::new()
            .ipv4(Inet4Address::new(10, 0, 0, 1), Inet4Address::new(10, 0, 0, 2))
            .udp(5000, 5001)
            .send(|bytes| {
                sent.extend_from_slice(bytes);
                Ok(())
            })
            .unwrap();
        assert_eq!(sent.len(), 28);
    }
}
