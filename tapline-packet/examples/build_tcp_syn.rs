//! Example: Building a TCP SYN packet and decoding it back
//!
//! This example demonstrates how to use the tapline-packet crate to build
//! a TCP SYN frame, then walk the decoded layers of the result.

use tapline_core::{Inet4Address, LinkType, MacAddress};
use tapline_packet::{PacketStack, Registry, StackBuilder, TcpFlags};

fn main() {
    let registry = Registry::with_defaults();

    // Network addresses
    let src_mac = MacAddress::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
    let dst_mac = MacAddress::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
    let src_ip = Inet4Address::new(192, 168, 1, 100);
    let dst_ip = Inet4Address::new(192, 168, 1, 1);

    // Build TCP SYN packet
    let packet = StackBuilder::new()
        .ethernet(src_mac, dst_mac)
        .ipv4(src_ip, dst_ip)
        .ttl(64)
        .tcp(
            54321, // Source port
            80,    // Destination port (HTTP)
            1000,  // Initial sequence number
            0,     // Acknowledgment number (0 for SYN)
            TcpFlags::SYN,
        )
        .window(65535)
        .build_bytes()
        .expect("Failed to build TCP SYN packet");

    println!("TCP SYN packet built successfully!");
    println!("Total size: {} bytes", packet.len());

    let stack = PacketStack::decode(&packet, LinkType::Ethernet, &registry)
        .expect("Failed to decode the frame we just built");

    for layer in stack.layers() {
        println!("  {} ({} header bytes)", layer.kind(), layer.header.header_len());
    }

    if let Some(ip) = stack.ipv4() {
        println!(
            "  {} -> {} protocol {}",
            ip.source,
            ip.destination,
            registry.ip_protocol(ip.protocol)
        );
    }
    if let Some(tcp) = stack.tcp() {
        println!(
            "  port {} -> {}, SYN set: {}",
            registry.port(tcp.source_port),
            registry.port(tcp.destination_port),
            tcp.flags.syn
        );
    }
}
