//! libpcap-backed capture driver

use bytes::Buf;
use pcap::{Activated, Active, BpfProgram, Capture, Device, Linktype, Offline, Packet, PacketHeader, Savefile};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tapline_core::{Error, FrameMetadata, LinkType, Result};
use tracing::{debug, info, warn};

use crate::driver::{
    Activation, CaptureHandle, DriverStats, FilterProgram, FrameDumper, NextFrame,
    NETMASK_UNKNOWN, SAVEFILE_HEADER_LEN, SAVEFILE_RECORD_HEADER_LEN,
};
use crate::session::CaptureConfig;

/// PCAP_ERROR from pcap.h
const PCAP_ERROR: i32 = -1;

fn driver_error(context: &str, err: pcap::Error) -> Error {
    Error::driver(PCAP_ERROR, format!("{}: {}", context, err))
}

enum Source {
    Device(String),
    File(PathBuf),
}

enum State {
    Pending(Source),
    Live(Capture<Active>),
    Offline(Capture<Offline>),
    Closed,
}

/// Run `$body` against whichever capture is open
macro_rules! with_capture {
    ($state:expr, $cap:ident => $body:expr) => {
        match $state {
            State::Live($cap) => $body,
            State::Offline($cap) => $body,
            State::Pending(_) => Err(Error::driver(PCAP_ERROR, "capture is not activated")),
            State::Closed => Err(Error::driver(PCAP_ERROR, "capture descriptor is closed")),
        }
    };
}

/// Compiled BPF instructions.
///
/// libpcap only reads them (`pcap_offline_filter`), so a program can be
/// shared between threads once compiled.
struct Instructions(BpfProgram);

unsafe impl Send for Instructions {}
unsafe impl Sync for Instructions {}

/// A program compiled once and kept with its compile options
struct PcapProgram {
    expression: String,
    optimize: bool,
    netmask: u32,
    instructions: Instructions,
}

impl PcapProgram {
    fn compile<T: Activated + ?Sized>(
        cap: &mut Capture<T>,
        expression: &str,
        optimize: bool,
        netmask: u32,
    ) -> Result<Self> {
        if netmask != NETMASK_UNKNOWN {
            // The binding always compiles with PCAP_NETMASK_UNKNOWN; only
            // `ip broadcast` depends on the netmask.
            debug!(netmask, "netmask recorded but not passed to libpcap");
        }
        let program = cap
            .compile(expression, optimize)
            .map_err(|e| Error::FilterCompile(e.to_string()))?;
        Ok(Self {
            expression: expression.to_string(),
            optimize,
            netmask,
            instructions: Instructions(program),
        })
    }
}

impl FilterProgram for PcapProgram {
    fn expression(&self) -> &str {
        &self.expression
    }

    fn optimize(&self) -> bool {
        self.optimize
    }

    fn netmask(&self) -> u32 {
        self.netmask
    }

    fn matches(&self, frame: &[u8]) -> bool {
        self.instructions.0.filter(frame)
    }
}

/// Compile `expression` for `link_type` without opening a device
pub(crate) fn compile_dead(
    link_type: LinkType,
    expression: &str,
    optimize: bool,
    netmask: u32,
) -> Result<Arc<dyn FilterProgram>> {
    let mut dead = Capture::dead(Linktype(link_type.to_dlt()))
        .map_err(|e| driver_error("failed to open dead capture", e))?;
    Ok(Arc::new(PcapProgram::compile(&mut dead, expression, optimize, netmask)?))
}

/// An open savefile; the dumper is only ever used by its owner
struct DumpFile(Savefile);

unsafe impl Send for DumpFile {}

struct PcapDumper {
    file: Option<DumpFile>,
    position: u64,
}

impl FrameDumper for PcapDumper {
    fn write(&mut self, meta: &FrameMetadata, frame: &[u8]) -> Result<()> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| Error::driver(PCAP_ERROR, "dump file is closed"))?;
        let caplen = frame.len() as u32;
        let header = PacketHeader {
            ts: libc::timeval {
                tv_sec: meta.tv_sec as libc::time_t,
                tv_usec: meta.tv_usec as libc::suseconds_t,
            },
            caplen,
            len: meta.orig_len.max(caplen),
        };
        file.0.write(&Packet::new(&header, frame));
        self.position += SAVEFILE_RECORD_HEADER_LEN + u64::from(caplen);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        match self.file.as_mut() {
            Some(file) => file.0.flush().map_err(|e| driver_error("failed to flush dump file", e)),
            None => Err(Error::driver(PCAP_ERROR, "dump file is closed")),
        }
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn close(&mut self) -> Result<()> {
        match self.file.take() {
            // Dropping the savefile closes it
            Some(mut file) => file.0.flush().map_err(|e| driver_error("failed to flush dump file", e)),
            None => Ok(()),
        }
    }
}

fn read_u32(mut bytes: &[u8], little_endian: bool) -> u32 {
    if little_endian {
        bytes.get_u32_le()
    } else {
        bytes.get_u32()
    }
}

/// Snapshot length stored in a capture file header (classic or pcapng)
fn recorded_snaplen(path: &Path) -> io::Result<Option<i32>> {
    let mut file = File::open(path)?;
    let mut head = [0u8; 24];
    file.read_exact(&mut head)?;

    let snaplen = match read_u32(&head[..4], true) {
        0xa1b2_c3d4 | 0xa1b2_3c4d => read_u32(&head[16..20], true),
        0xd4c3_b2a1 | 0x4d3c_b2a1 => read_u32(&head[16..20], false),
        0x0a0d_0d0a => {
            // Section header block, then the first interface description block
            let little_endian = read_u32(&head[8..12], true) == 0x1a2b_3c4d;
            let section_len = read_u32(&head[4..8], little_endian);
            let mut idb = [0u8; 16];
            file.seek(SeekFrom::Start(u64::from(section_len)))?;
            file.read_exact(&mut idb)?;
            if read_u32(&idb[..4], little_endian) != 1 {
                return Ok(None);
            }
            read_u32(&idb[12..16], little_endian)
        }
        _ => return Ok(None),
    };
    Ok(i32::try_from(snaplen).ok().filter(|&n| n > 0))
}

/// Capture driver over a network device or a savefile
pub struct PcapHandle {
    name: String,
    state: State,
    snaplen: i32,
}

impl PcapHandle {
    /// Handle for a live device, opened on activation
    pub fn device(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: State::Pending(Source::Device(name.to_string())),
            snaplen: 0,
        }
    }

    /// Handle for a capture file, opened on activation
    pub fn file<P: Into<PathBuf>>(path: P) -> Self {
        let path = path.into();
        Self {
            name: path.display().to_string(),
            state: State::Pending(Source::File(path)),
            snaplen: 0,
        }
    }

    fn open_device(name: &str, config: &CaptureConfig) -> Result<Capture<Active>> {
        let mut capture = Capture::from_device(Device::from(name))
            .map_err(|e| driver_error("failed to create capture", e))?
            .promisc(config.promiscuous)
            .snaplen(config.snaplen)
            .timeout(config.timeout_ms)
            .immediate_mode(config.immediate_mode);

        if config.buffer_size > 0 {
            capture = capture.buffer_size(config.buffer_size);
        }

        capture
            .open()
            .map_err(|e| driver_error(&format!("failed to open capture on '{}'", name), e))
    }
}

impl CaptureHandle for PcapHandle {
    fn source(&self) -> &str {
        &self.name
    }

    fn activate(&mut self, config: &CaptureConfig) -> Result<Activation> {
        let source = match &self.state {
            State::Pending(source) => source,
            _ => return Err(Error::driver(PCAP_ERROR, "capture is already activated")),
        };

        let mut activation = Activation::default();
        let (state, snaplen) = match source {
            Source::Device(name) => {
                let capture = Self::open_device(name, config)?;
                if config.promiscuous && name == "any" {
                    activation = activation
                        .with_warning("promiscuous mode is not supported on the \"any\" device");
                }
                (State::Live(capture), config.snaplen)
            }
            Source::File(path) => {
                let capture = Capture::from_file(path)
                    .map_err(|e| driver_error("failed to open capture file", e))?;
                let snaplen = match recorded_snaplen(path) {
                    Ok(Some(snaplen)) => snaplen,
                    Ok(None) => config.snaplen,
                    Err(e) => {
                        warn!(path = %path.display(), "could not read snaplen from file header: {}", e);
                        config.snaplen
                    }
                };
                (State::Offline(capture), snaplen)
            }
        };
        self.state = state;
        self.snaplen = snaplen;

        info!(source = %self.name, snaplen, "pcap capture activated");
        Ok(activation)
    }

    fn link_type(&self) -> Result<LinkType> {
        with_capture!(&self.state, cap => Ok(LinkType::from_dlt(cap.get_datalink().0)))
    }

    fn snaplen(&self) -> Result<i32> {
        with_capture!(&self.state, _cap => Ok(self.snaplen))
    }

    fn compile(
        &mut self,
        expression: &str,
        optimize: bool,
        netmask: u32,
    ) -> Result<Arc<dyn FilterProgram>> {
        let program = with_capture!(&mut self.state, cap => {
            PcapProgram::compile(cap, expression, optimize, netmask)
        })?;
        Ok(Arc::new(program))
    }

    fn set_filter(&mut self, program: Arc<dyn FilterProgram>) -> Result<()> {
        // The binding installs filters from source, so recompile with the
        // program's own options
        with_capture!(&mut self.state, cap => {
            cap.filter(program.expression(), program.optimize())
                .map_err(|e| driver_error("failed to install filter", e))
        })
    }

    fn next_frame(&mut self) -> Result<NextFrame<'_>> {
        let next = with_capture!(&mut self.state, cap => Ok(cap.next_packet()))?;
        match next {
            Ok(packet) => {
                let meta = FrameMetadata::new(
                    packet.header.caplen,
                    packet.header.len,
                    packet.header.ts.tv_sec as i64,
                    packet.header.ts.tv_usec as i64,
                );
                Ok(NextFrame::Frame(meta, packet.data))
            }
            Err(pcap::Error::TimeoutExpired) => Ok(NextFrame::Timeout),
            Err(pcap::Error::NoMorePackets) => Ok(NextFrame::Eof),
            Err(e) => Err(driver_error("capture error", e)),
        }
    }

    fn send(&mut self, frame: &[u8]) -> Result<()> {
        match &mut self.state {
            State::Live(cap) => cap
                .sendpacket(frame)
                .map_err(|e| driver_error("failed to send frame", e)),
            State::Offline(_) => Err(Error::PlatformUnsupported(
                "cannot send on an offline capture".to_string(),
            )),
            _ => Err(Error::driver(PCAP_ERROR, "capture is not open")),
        }
    }

    fn stats(&mut self) -> Result<DriverStats> {
        with_capture!(&mut self.state, cap => {
            cap.stats()
                .map(|stat| DriverStats {
                    received: stat.received,
                    dropped: stat.dropped,
                    if_dropped: stat.if_dropped,
                })
                .map_err(|e| driver_error("failed to read stats", e))
        })
    }

    fn dump_open(&mut self, path: &Path) -> Result<Box<dyn FrameDumper>> {
        let savefile = with_capture!(&self.state, cap => {
            cap.savefile(path)
                .map_err(|e| driver_error(&format!("failed to open dump file {}", path.display()), e))
        })?;
        info!(source = %self.name, path = %path.display(), "capture file opened for writing");
        Ok(Box::new(PcapDumper {
            file: Some(DumpFile(savefile)),
            position: SAVEFILE_HEADER_LEN,
        }))
    }

    fn is_open(&self) -> bool {
        matches!(self.state, State::Live(_) | State::Offline(_))
    }

    fn close(&mut self) {
        if self.is_open() {
            debug!(source = %self.name, "closing pcap descriptor");
        }
        self.state = State::Closed;
    }
}
