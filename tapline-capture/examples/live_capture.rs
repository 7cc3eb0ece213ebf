//! Example: Decode live traffic until a timer breaks the loop
//!
//! Note: Requires root/administrator privileges to run.
//!
//! Run with: sudo cargo run --example live_capture -- [interface]

use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tapline_capture::{default_interface, CaptureDispatcher, CaptureSession, FramePayload};
use tapline_core::FrameMetadata;
use tapline_packet::Registry;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let device = match std::env::args().nth(1) {
        Some(name) => name,
        None => default_interface()?.name,
    };

    let mut session = CaptureSession::create(&device)?;
    session.set_snaplen(256)?;
    session.set_timeout(100)?;
    let activation = session.activate()?;
    println!(
        "Capturing on {} ({}), activation code {}",
        device,
        session.datalink()?,
        activation.code()
    );

    // Stop after ten seconds no matter how much traffic arrives
    let breaker = session.break_handle();
    thread::spawn(move || {
        thread::sleep(Duration::from_secs(10));
        breaker.break_loop();
    });

    let registry = Arc::new(Registry::with_defaults());
    let dispatcher = CaptureDispatcher::new(Arc::clone(&registry));
    let mut count = 0usize;

    let outcome = dispatcher.run(
        &mut session,
        -1,
        |count: &mut usize, meta: &FrameMetadata, payload: FramePayload<'_>| {
            *count += 1;
            match payload {
                FramePayload::Decoded(stack) => {
                    let layers = stack
                        .kinds()
                        .iter()
                        .map(|kind| kind.name())
                        .collect::<Vec<_>>()
                        .join(" / ");
                    println!("[{}] {} bytes: {}", count, meta.orig_len, layers);
                }
                FramePayload::DecodeFailed { error, raw } => {
                    println!("[{}] {} bytes, undecodable: {}", count, raw.len(), error);
                }
                FramePayload::Raw(raw) => println!("[{}] {} raw bytes", count, raw.len()),
            }
        },
        &mut count,
    )?;

    println!("\nLoop returned code {} after {} frames", outcome.code(), outcome.delivered);
    println!("{}", session.stats()?);
    session.close();
    Ok(())
}
