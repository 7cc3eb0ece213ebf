//! Codec dispatch table and the shared protocol registry
//!
//! A [`Registry`] is built once with [`Registry::with_defaults`] and handed
//! around as `Arc<Registry>`. It bundles the named-number registries used for
//! display with the [`DispatchTable`] the stack decoder consults to pick the
//! next layer's codec.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use tapline_core::{
    EtherType, EtherTypes, IpProtocol, IpProtocols, NamedNumberRegistry, Port, Ports,
};
use tracing::trace;

use crate::header::{Header, LayerKind};

/// A field value that selects the next layer's codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Discriminator {
    EtherType(u16),
    IpProtocol(u8),
    Port(u16),
}

impl fmt::Display for Discriminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Discriminator::EtherType(v) => write!(f, "ethertype 0x{:04x}", v),
            Discriminator::IpProtocol(v) => write!(f, "ip protocol {}", v),
            Discriminator::Port(v) => write!(f, "port {}", v),
        }
    }
}

/// Discriminator-to-codec mapping
pub struct DispatchTable {
    entries: RwLock<HashMap<Discriminator, LayerKind>>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Table with the built-in link, network and transport bindings.
    /// No port bindings are installed.
    pub fn with_defaults() -> Self {
        let table = Self::new();
        {
            let mut entries = table.entries.write();
            entries.insert(Discriminator::EtherType(EtherType::IPV4.value()), LayerKind::Ipv4);
            entries.insert(Discriminator::EtherType(EtherType::IPV6.value()), LayerKind::Ipv6);
            entries.insert(Discriminator::EtherType(EtherType::ARP.value()), LayerKind::Arp);
            entries.insert(
                Discriminator::EtherType(EtherType::DOT1Q_VLAN_TAGGED_FRAMES.value()),
                LayerKind::Dot1q,
            );
            entries.insert(Discriminator::IpProtocol(IpProtocol::TCP.value()), LayerKind::Tcp);
            entries.insert(Discriminator::IpProtocol(IpProtocol::UDP.value()), LayerKind::Udp);
            entries.insert(Discriminator::IpProtocol(IpProtocol::ICMP.value()), LayerKind::Icmp);
            entries.insert(Discriminator::IpProtocol(IpProtocol::IPV4.value()), LayerKind::Ipv4);
            entries.insert(Discriminator::IpProtocol(IpProtocol::IPV6.value()), LayerKind::Ipv6);
        }
        table
    }

    pub fn get(&self, discriminator: Discriminator) -> Option<LayerKind> {
        self.entries.read().get(&discriminator).copied()
    }

    /// Bind a discriminator, returning the previous binding
    pub fn insert(&self, discriminator: Discriminator, kind: LayerKind) -> Option<LayerKind> {
        self.entries.write().insert(discriminator, kind)
    }

    pub fn remove(&self, discriminator: Discriminator) -> Option<LayerKind> {
        self.entries.write().remove(&discriminator)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for DispatchTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchTable")
            .field("entries", &self.len())
            .finish()
    }
}

/// Process-wide protocol registry
#[derive(Debug)]
pub struct Registry {
    pub ether_types: NamedNumberRegistry<EtherTypes>,
    pub ip_protocols: NamedNumberRegistry<IpProtocols>,
    pub ports: NamedNumberRegistry<Ports>,
    pub dispatch: DispatchTable,
}

impl Registry {
    /// Registry with no names and no codec bindings; every payload decodes opaque
    pub fn empty() -> Self {
        Self {
            ether_types: NamedNumberRegistry::new(),
            ip_protocols: NamedNumberRegistry::new(),
            ports: NamedNumberRegistry::new(),
            dispatch: DispatchTable::new(),
        }
    }

    pub fn with_defaults() -> Self {
        Self {
            ether_types: NamedNumberRegistry::with_defaults(),
            ip_protocols: NamedNumberRegistry::with_defaults(),
            ports: NamedNumberRegistry::with_defaults(),
            dispatch: DispatchTable::with_defaults(),
        }
    }

    /// Codec for the layer nested inside `header`, if any discriminator is bound
    pub fn resolve(&self, header: &Header) -> Option<LayerKind> {
        let discriminators = header.discriminators();
        let found = discriminators
            .iter()
            .flatten()
            .find_map(|d| self.dispatch.get(*d));
        if found.is_none() {
            if let Some(first) = discriminators[0] {
                trace!(
                    layer = %header.kind(),
                    discriminator = %first,
                    "no decoder registered, keeping payload opaque"
                );
            }
        }
        found
    }

    /// Bind `discriminator` to a codec, returning the previous binding
    pub fn register_decoder(&self, discriminator: Discriminator, kind: LayerKind) -> Option<LayerKind> {
        self.dispatch.insert(discriminator, kind)
    }

    pub fn unregister_decoder(&self, discriminator: Discriminator) -> Option<LayerKind> {
        self.dispatch.remove(discriminator)
    }

    pub fn ether_type(&self, value: u16) -> EtherType {
        self.ether_types.get_instance(value)
    }

    pub fn ip_protocol(&self, value: u8) -> IpProtocol {
        self.ip_protocols.get_instance(value)
    }

    pub fn port(&self, value: u16) -> Port {
        self.ports.get_instance(value)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ethernet::EthernetHeader;
    use crate::udp::UdpHeader;
    use tapline_core::MacAddress;

    #[test]
    fn test_default_bindings() {
        let registry = Registry::with_defaults();
        assert_eq!(
            registry.dispatch.get(Discriminator::EtherType(0x0800)),
            Some(LayerKind::Ipv4)
        );
        assert_eq!(
            registry.dispatch.get(Discriminator::IpProtocol(6)),
            Some(LayerKind::Tcp)
        );
        assert_eq!(registry.dispatch.get(Discriminator::Port(80)), None);
    }

    #[test]
    fn test_resolve_unknown_ether_type() {
        let registry = Registry::with_defaults();
        let header: Header =
            EthernetHeader::new(MacAddress::BROADCAST, MacAddress::ZERO, 0x88b5).into();
        assert_eq!(registry.resolve(&header), None);
    }

    #[test]
    fn test_port_binding_prefers_destination() {
        let registry = Registry::with_defaults();
        registry.register_decoder(Discriminator::Port(4789), LayerKind::Ethernet);
        registry.register_decoder(Discriminator::Port(5000), LayerKind::Ipv4);

        let header: Header = UdpHeader::new(5000, 4789, 0).into();
        assert_eq!(registry.resolve(&header), Some(LayerKind::Ethernet));

        let reply: Header = UdpHeader::new(4789, 6000, 0).into();
        assert_eq!(registry.resolve(&reply), Some(LayerKind::Ethernet));
    }

    #[test]
    fn test_register_returns_previous() {
        let registry = Registry::with_defaults();
        let previous = registry.register_decoder(Discriminator::EtherType(0x0800), LayerKind::Ipv6);
        assert_eq!(previous, Some(LayerKind::Ipv4));
        assert_eq!(
            registry.unregister_decoder(Discriminator::EtherType(0x0800)),
            Some(LayerKind::Ipv6)
        );
        assert_eq!(registry.dispatch.get(Discriminator::EtherType(0x0800)), None);
    }

    #[test]
    fn test_name_lookups() {
        let registry = Registry::with_defaults();
        assert_eq!(registry.ether_type(0x86dd).name(), "IPv6");
        assert_eq!(registry.ip_protocol(17).name(), "UDP");
        assert_eq!(registry.port(22).name(), "SSH");
        assert!(registry.port(0).is_unknown());
    }
}
