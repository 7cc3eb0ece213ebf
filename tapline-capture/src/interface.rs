//! Capture source enumeration
//!
//! With the `libpcap` feature the device list comes from libpcap itself, so
//! it includes pseudo-devices such as `any`, `nflog` or `usbmon0`. The
//! link-layer address and OS index, which libpcap does not report, are
//! filled in from the OS interface table.

use pnet_datalink::NetworkInterface;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use tapline_core::{Error, MacAddress, Result};
use tracing::debug;

use crate::driver::NETMASK_UNKNOWN;

/// One address bound to a capture source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceAddress {
    pub addr: IpAddr,
    pub netmask: Option<IpAddr>,
    pub broadcast: Option<IpAddr>,
}

/// A device a session can be created on
#[derive(Debug, Clone)]
pub struct InterfaceInfo {
    /// Name to pass to `CaptureSession::create`
    pub name: String,
    pub description: Option<String>,
    pub mac: Option<MacAddress>,
    pub addresses: Vec<InterfaceAddress>,
    pub is_up: bool,
    pub is_running: bool,
    pub is_loopback: bool,
    pub is_wireless: bool,
    /// OS interface index; pseudo-devices have none
    pub index: Option<u32>,
}

impl InterfaceInfo {
    /// Up and not a loopback
    pub fn is_capture_capable(&self) -> bool {
        self.is_up && !self.is_loopback
    }

    pub fn primary_ipv4(&self) -> Option<Ipv4Addr> {
        self.addresses.iter().find_map(|a| match a.addr {
            IpAddr::V4(addr) => Some(addr),
            IpAddr::V6(_) => None,
        })
    }

    /// Netmask of the first IPv4 network, as passed to filter compilation.
    /// [`NETMASK_UNKNOWN`] when the device has no IPv4 network.
    pub fn ipv4_netmask(&self) -> u32 {
        self.addresses
            .iter()
            .find_map(|a| match (a.addr, a.netmask) {
                (IpAddr::V4(_), Some(IpAddr::V4(mask))) => Some(u32::from(mask)),
                _ => None,
            })
            .unwrap_or(NETMASK_UNKNOWN)
    }

    #[cfg(feature = "libpcap")]
    fn enrich(&mut self, os: &NetworkInterface) {
        self.mac = os_mac(os);
        self.index = Some(os.index);
    }
}

fn os_mac(iface: &NetworkInterface) -> Option<MacAddress> {
    iface
        .mac
        .map(|mac| MacAddress::new([mac.0, mac.1, mac.2, mac.3, mac.4, mac.5]))
        .filter(|mac| *mac != MacAddress::ZERO)
}

fn os_interfaces() -> HashMap<String, NetworkInterface> {
    pnet_datalink::interfaces()
        .into_iter()
        .map(|iface| (iface.name.clone(), iface))
        .collect()
}

#[cfg(feature = "libpcap")]
impl From<pcap::Device> for InterfaceInfo {
    fn from(device: pcap::Device) -> Self {
        let addresses = device
            .addresses
            .iter()
            .map(|a| InterfaceAddress {
                addr: a.addr,
                netmask: a.netmask,
                broadcast: a.broadcast_addr,
            })
            .collect();
        InterfaceInfo {
            is_up: device.flags.is_up(),
            is_running: device.flags.is_running(),
            is_loopback: device.flags.is_loopback(),
            is_wireless: device.flags.is_wireless(),
            name: device.name,
            description: device.desc,
            mac: None,
            addresses,
            index: None,
        }
    }
}

#[cfg(not(feature = "libpcap"))]
impl From<&NetworkInterface> for InterfaceInfo {
    fn from(iface: &NetworkInterface) -> Self {
        let addresses = iface
            .ips
            .iter()
            .map(|network| InterfaceAddress {
                addr: network.ip(),
                netmask: Some(network.mask()),
                broadcast: None,
            })
            .collect();
        InterfaceInfo {
            name: iface.name.clone(),
            description: Some(iface.description.clone()).filter(|d| !d.is_empty()),
            mac: os_mac(iface),
            addresses,
            is_up: iface.is_up(),
            is_running: iface.is_up(),
            is_loopback: iface.is_loopback(),
            is_wireless: false,
            index: Some(iface.index),
        }
    }
}

/// Every device libpcap can open
#[cfg(feature = "libpcap")]
pub fn list_interfaces() -> Result<Vec<InterfaceInfo>> {
    let devices = pcap::Device::list()
        .map_err(|e| Error::driver(-1, format!("failed to enumerate devices: {}", e)))?;
    let os = os_interfaces();

    Ok(devices
        .into_iter()
        .map(|device| {
            let mut info = InterfaceInfo::from(device);
            if let Some(iface) = os.get(&info.name) {
                info.enrich(iface);
            }
            info
        })
        .collect())
}

/// Every interface in the OS table
#[cfg(not(feature = "libpcap"))]
pub fn list_interfaces() -> Result<Vec<InterfaceInfo>> {
    let interfaces: Vec<InterfaceInfo> = os_interfaces().values().map(InterfaceInfo::from).collect();
    if interfaces.is_empty() {
        return Err(Error::PlatformUnsupported(
            "no network interfaces found".to_string(),
        ));
    }
    Ok(interfaces)
}

/// Look up one device by name
pub fn get_interface(name: &str) -> Result<InterfaceInfo> {
    list_interfaces()?
        .into_iter()
        .find(|iface| iface.name == name)
        .ok_or_else(|| Error::InterfaceNotFound(name.to_string()))
}

/// The driver's default device, else the first capture-capable one
pub fn default_interface() -> Result<InterfaceInfo> {
    #[cfg(feature = "libpcap")]
    {
        match pcap::Device::lookup() {
            Ok(Some(device)) => {
                debug!("libpcap default device: {}", device.name);
                let mut info = InterfaceInfo::from(device);
                if let Some(iface) = os_interfaces().get(&info.name) {
                    info.enrich(iface);
                }
                return Ok(info);
            }
            Ok(None) => debug!("libpcap reports no default device"),
            Err(e) => debug!("default device lookup failed: {}", e),
        }
    }

    list_interfaces()?
        .into_iter()
        .find(InterfaceInfo::is_capture_capable)
        .ok_or_else(|| Error::InterfaceNotFound("default".to_string()))
}
