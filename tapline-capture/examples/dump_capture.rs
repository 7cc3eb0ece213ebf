//! Example: Save live frames to a capture file and read them back
//!
//! Note: Requires root/administrator privileges to run.
//!
//! Run with: sudo cargo run --example dump_capture -- <interface> <file.pcap>

use tapline_capture::{CaptureSession, LoopExit};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let (Some(device), Some(path)) = (args.next(), args.next()) else {
        eprintln!("usage: dump_capture <interface> <file.pcap>");
        std::process::exit(2);
    };

    let mut session = CaptureSession::open_live(&device, 65535, true, 1000)?;
    let mut dump = session.dump_open(&path)?;

    let mut write_error = None;
    session.run_loop(50, |meta, frame| {
        if write_error.is_none() {
            write_error = dump.write(meta, frame).err();
        }
    })?;
    if let Some(e) = write_error {
        return Err(e.into());
    }
    println!("Wrote {} frames, {} bytes", dump.frames_written(), dump.position()?);
    dump.close()?;
    session.close();

    let mut replay = CaptureSession::open_offline(&path)?;
    println!("{}: link type {}, snaplen {}", path, replay.datalink()?, replay.snaplen()?);
    let outcome = replay.run_loop(-1, |meta, _| {
        println!("{}.{:06} {} bytes", meta.tv_sec, meta.tv_usec, meta.orig_len);
    })?;
    assert_eq!(outcome.exit, LoopExit::Exhausted);

    Ok(())
}
