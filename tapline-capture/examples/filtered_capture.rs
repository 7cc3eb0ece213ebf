//! Example: Filtered packet capture
//!
//! Compiles a filter from the expression helpers, attaches it, frees it and
//! prints the TCP/UDP endpoints of the first 20 matching frames.
//! Note: Requires root/administrator privileges to run.
//!
//! Run with: sudo cargo run --example filtered_capture

use std::sync::Arc;
use tapline_capture::{
    default_interface, filters, CaptureDispatcher, CaptureSession, CompiledFilter, FramePayload,
};
use tapline_core::{EtherType, FrameMetadata, IpProtocol};
use tapline_packet::Registry;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let iface = default_interface()?;
    println!(
        "Capturing on: {} ({})",
        iface.name,
        iface.description.as_deref().unwrap_or("no description")
    );

    let mut session = CaptureSession::open_live(&iface.name, 65535, true, 1000)?;

    let expression = filters::all_of(&[
        filters::ether_proto(EtherType::IPV4),
        filters::any_of(&[filters::ip_proto(IpProtocol::TCP), filters::ip_proto(IpProtocol::UDP)]),
        filters::not(&filters::port(22)),
    ]);
    println!("BPF Filter: {}\n", expression);

    let mut filter = CompiledFilter::compile(&mut session, &expression, true, iface.ipv4_netmask())?;
    filter.attach(&mut session)?;
    filter.free()?;

    let registry = Arc::new(Registry::with_defaults());
    let dispatcher = CaptureDispatcher::new(Arc::clone(&registry));

    dispatcher.run(
        &mut session,
        20,
        |registry: &mut Arc<Registry>, meta: &FrameMetadata, payload: FramePayload<'_>| {
            let Some(stack) = payload.as_stack() else {
                return;
            };
            let Some(ip) = stack.ipv4() else {
                return;
            };
            let (sport, dport) = match (stack.tcp(), stack.udp()) {
                (Some(tcp), _) => (tcp.source_port, tcp.destination_port),
                (None, Some(udp)) => (udp.source_port, udp.destination_port),
                _ => return,
            };
            println!(
                "{:>5} bytes  {}:{} -> {}:{} ({})",
                meta.orig_len,
                ip.source,
                registry.port(sport),
                ip.destination,
                registry.port(dport),
                registry.ip_protocol(ip.protocol)
            );
        },
        &mut Arc::clone(&registry),
    )?;

    println!("\n=== Capture Complete ===");
    println!("{}", session.stats()?);

    Ok(())
}
