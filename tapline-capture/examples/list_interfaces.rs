//! Example: List devices usable as capture sources
//!
//! Run with: cargo run --example list_interfaces

use tapline_capture::{default_interface, list_interfaces};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    for iface in list_interfaces()? {
        let mac = iface
            .mac
            .map(|mac| mac.to_string())
            .unwrap_or_else(|| "-".to_string());
        let index = iface
            .index
            .map(|index| index.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>3} {:<18} {:<17} up={} running={} loopback={} wireless={}",
            index,
            iface.name,
            mac,
            iface.is_up,
            iface.is_running,
            iface.is_loopback,
            iface.is_wireless
        );
        if let Some(description) = &iface.description {
            println!("      {}", description);
        }
        for address in &iface.addresses {
            match address.netmask {
                Some(mask) => println!("      {} mask {}", address.addr, mask),
                None => println!("      {}", address.addr),
            }
        }
    }

    match default_interface() {
        Ok(iface) => println!("\nDefault: {}", iface.name),
        Err(e) => println!("\nNo default interface: {}", e),
    }

    Ok(())
}
