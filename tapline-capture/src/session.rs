//! Capture sessions
//!
//! A [`CaptureSession`] owns one driver handle and walks it through
//! `Created -> Activated -> Looping -> Closed`. Every operation checks the
//! state first, so a closed session reports [`Error::SessionClosed`] no
//! matter what the driver would have done.
//!
//! Loop calls block the calling thread. A [`BreakHandle`] obtained before the
//! loop starts can be moved to another thread to stop it.

use bytes::Bytes;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tapline_core::{Error, FrameMetadata, LinkType, Result};
use tracing::{debug, error, info, warn};

use crate::driver::{Activation, CaptureHandle, FilterProgram, NextFrame};
use crate::dump::CaptureDump;
use crate::stats::{CaptureStats, StatsAccumulator};

/// Default snapshot length (maximum bytes per packet)
pub const DEFAULT_SNAPLEN: i32 = 65535;

/// Default timeout for packet capture (milliseconds)
pub const DEFAULT_TIMEOUT_MS: i32 = 1000;

/// Result code of a loop call that stopped on a break request
pub const BREAK_CODE: i32 = -2;

/// Configuration for packet capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Maximum bytes to capture per packet
    pub snaplen: i32,
    /// Timeout in milliseconds
    pub timeout_ms: i32,
    /// Enable promiscuous mode
    pub promiscuous: bool,
    /// Buffer size (0 = default)
    pub buffer_size: i32,
    /// Enable immediate mode (deliver packets immediately)
    pub immediate_mode: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            snaplen: DEFAULT_SNAPLEN,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            promiscuous: true,
            buffer_size: 0,
            immediate_mode: true,
        }
    }
}

/// Lifecycle state of a capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Handle opened, configuration still mutable
    Created,
    /// Device active, ready to loop
    Activated,
    /// A loop call is running
    Looping,
    /// Descriptor released; terminal
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Created => "Created",
            SessionState::Activated => "Activated",
            SessionState::Looping => "Looping",
            SessionState::Closed => "Closed",
        };
        f.write_str(name)
    }
}

/// Cross-thread handle for interrupting a session's loop
#[derive(Debug, Clone)]
pub struct BreakHandle {
    flag: Arc<AtomicBool>,
}

impl BreakHandle {
    /// Ask the running (or next) loop call to return [`BREAK_CODE`]
    pub fn break_loop(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Whether a break is pending and not yet observed by a loop
    pub fn is_pending(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Why a loop call returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// The requested number of frames was delivered
    Count,
    /// The source ran out of frames
    Exhausted,
    /// A buffer timeout elapsed (dispatch only)
    Timeout,
    /// A break request was observed
    Break,
}

/// Result of a loop or dispatch call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopOutcome {
    pub exit: LoopExit,
    /// Frames handed to the callback by this call
    pub delivered: usize,
}

impl LoopOutcome {
    /// Driver-style result code: [`BREAK_CODE`] after a break, else the frame count
    pub fn code(&self) -> i32 {
        match self.exit {
            LoopExit::Break => BREAK_CODE,
            _ => i32::try_from(self.delivered).unwrap_or(i32::MAX),
        }
    }

    pub fn is_break(&self) -> bool {
        self.exit == LoopExit::Break
    }
}

/// An owned capture descriptor with an explicit lifecycle
pub struct CaptureSession {
    handle: Box<dyn CaptureHandle>,
    config: CaptureConfig,
    state: SessionState,
    link_type: Option<LinkType>,
    break_flag: Arc<AtomicBool>,
    stats: StatsAccumulator,
    attached_filter: Option<String>,
}

impl CaptureSession {
    /// Wrap a driver handle in a `Created` session
    pub fn from_handle<H: CaptureHandle + 'static>(handle: H) -> Self {
        debug!("Created capture session on {}", handle.source());
        Self {
            handle: Box::new(handle),
            config: CaptureConfig::default(),
            state: SessionState::Created,
            link_type: None,
            break_flag: Arc::new(AtomicBool::new(false)),
            stats: StatsAccumulator::new(),
            attached_filter: None,
        }
    }

    /// Create a session on a network device without activating it.
    ///
    /// The name is not checked here; a device libpcap cannot open fails
    /// [`activate`](Self::activate) with a driver error.
    #[cfg(feature = "libpcap")]
    pub fn create(device: &str) -> Result<Self> {
        Ok(Self::from_handle(crate::pcap_driver::PcapHandle::device(device)))
    }

    /// Create and activate a live session in one step
    #[cfg(feature = "libpcap")]
    pub fn open_live(device: &str, snaplen: i32, promiscuous: bool, timeout_ms: i32) -> Result<Self> {
        let mut session = Self::create(device)?;
        session.set_snaplen(snaplen)?;
        session.set_promiscuous(promiscuous)?;
        session.set_timeout(timeout_ms)?;
        session.activate()?;
        Ok(session)
    }

    /// Open a capture file; the returned session is already activated
    #[cfg(feature = "libpcap")]
    pub fn open_offline<P: Into<std::path::PathBuf>>(path: P) -> Result<Self> {
        let mut session = Self::from_handle(crate::pcap_driver::PcapHandle::file(path));
        session.activate()?;
        Ok(session)
    }

    #[cfg(not(feature = "libpcap"))]
    pub fn open_live(_device: &str, _snaplen: i32, _promiscuous: bool, _timeout_ms: i32) -> Result<Self> {
        Err(Error::PlatformUnsupported(
            "live capture requires the libpcap feature".to_string(),
        ))
    }

    #[cfg(not(feature = "libpcap"))]
    pub fn open_offline<P: Into<std::path::PathBuf>>(_path: P) -> Result<Self> {
        Err(Error::PlatformUnsupported(
            "offline capture requires the libpcap feature".to_string(),
        ))
    }

    /// Open the device with the current configuration
    ///
    /// Warnings (e.g. promiscuous mode refused) do not fail activation; they
    /// are logged and returned to the caller.
    pub fn activate(&mut self) -> Result<Activation> {
        self.ensure_open()?;
        if self.state != SessionState::Created {
            return Err(Error::invalid_state("activate", self.state));
        }

        let activation = self.handle.activate(&self.config).map_err(|e| {
            error!("Failed to activate capture on {}: {}", self.handle.source(), e);
            e
        })?;
        for warning in &activation.warnings {
            warn!("{}: {}", self.handle.source(), warning);
        }

        self.link_type = Some(self.handle.link_type()?);
        self.state = SessionState::Activated;
        self.stats.reset();
        info!(
            "Capture activated on {} (link type {})",
            self.handle.source(),
            self.datalink()?
        );
        Ok(activation)
    }

    fn configure(&mut self, operation: &'static str) -> Result<&mut CaptureConfig> {
        self.ensure_open()?;
        if self.state != SessionState::Created {
            return Err(Error::invalid_state(operation, self.state));
        }
        Ok(&mut self.config)
    }

    /// Set snapshot length
    pub fn set_snaplen(&mut self, snaplen: i32) -> Result<()> {
        self.configure("set snaplen")?.snaplen = snaplen;
        debug!("Snapshot length: {}", snaplen);
        Ok(())
    }

    /// Set promiscuous mode
    pub fn set_promiscuous(&mut self, enable: bool) -> Result<()> {
        self.configure("set promiscuous mode")?.promiscuous = enable;
        debug!("Promiscuous mode: {}", enable);
        Ok(())
    }

    /// Set capture timeout
    pub fn set_timeout(&mut self, timeout_ms: i32) -> Result<()> {
        self.configure("set timeout")?.timeout_ms = timeout_ms;
        debug!("Timeout: {}ms", timeout_ms);
        Ok(())
    }

    pub fn set_buffer_size(&mut self, buffer_size: i32) -> Result<()> {
        self.configure("set buffer size")?.buffer_size = buffer_size;
        Ok(())
    }

    pub fn set_immediate_mode(&mut self, enable: bool) -> Result<()> {
        self.configure("set immediate mode")?.immediate_mode = enable;
        Ok(())
    }

    /// Replace the whole configuration
    pub fn set_config(&mut self, config: CaptureConfig) -> Result<()> {
        *self.configure("configure")? = config;
        Ok(())
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    /// Interface name or file path this session reads from
    pub fn source(&self) -> &str {
        self.handle.source()
    }

    pub fn break_handle(&self) -> BreakHandle {
        BreakHandle {
            flag: Arc::clone(&self.break_flag),
        }
    }

    /// Request a break from the owning thread, e.g. inside a callback
    pub fn break_loop(&self) {
        self.break_flag.store(true, Ordering::Release);
    }

    /// Link-layer type of the activated source
    pub fn datalink(&self) -> Result<LinkType> {
        self.ensure_activated("read link type")?;
        self.link_type
            .ok_or_else(|| Error::invalid_state("read link type", self.state))
    }

    /// Snapshot length in effect; for a capture file, the one it was recorded with
    pub fn snaplen(&self) -> Result<i32> {
        self.ensure_activated("read snaplen")?;
        self.handle.snaplen()
    }

    /// Expression of the most recently attached filter
    pub fn filter_expression(&self) -> Option<&str> {
        self.attached_filter.as_deref()
    }

    /// Process frames until `max_frames` are delivered, the source is
    /// exhausted or a break is requested. Buffer timeouts keep waiting.
    ///
    /// `max_frames <= 0` means unbounded.
    pub fn run_loop<F>(&mut self, max_frames: i32, on_frame: F) -> Result<LoopOutcome>
    where
        F: FnMut(&FrameMetadata, &[u8]),
    {
        self.pump("loop", max_frames, false, on_frame)
    }

    /// Like [`run_loop`](Self::run_loop) but also returns when a buffer
    /// timeout elapses
    pub fn dispatch<F>(&mut self, max_frames: i32, on_frame: F) -> Result<LoopOutcome>
    where
        F: FnMut(&FrameMetadata, &[u8]),
    {
        self.pump("dispatch", max_frames, true, on_frame)
    }

    /// Pull a single frame; `None` on buffer timeout or end of file
    pub fn next_frame(&mut self) -> Result<Option<(FrameMetadata, Bytes)>> {
        self.ensure_activated("read frame")?;
        let frame = match self.handle.next_frame() {
            Ok(NextFrame::Frame(meta, bytes)) => Ok(Some((meta, Bytes::copy_from_slice(bytes)))),
            Ok(NextFrame::Timeout | NextFrame::Eof) => Ok(None),
            Err(e) => Err(e),
        };
        match frame {
            Ok(Some((meta, bytes))) => {
                self.stats.record_frame(bytes.len());
                Ok(Some((meta, bytes)))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                self.after_driver_error("read frame", &e);
                Err(e)
            }
        }
    }

    fn pump<F>(
        &mut self,
        operation: &'static str,
        max_frames: i32,
        return_on_timeout: bool,
        mut on_frame: F,
    ) -> Result<LoopOutcome>
    where
        F: FnMut(&FrameMetadata, &[u8]),
    {
        self.ensure_activated(operation)?;
        let limit = usize::try_from(max_frames).ok().filter(|&n| n > 0);

        self.state = SessionState::Looping;
        debug!("Entering {} on {} (limit {:?})", operation, self.handle.source(), limit);

        let mut delivered = 0usize;
        let result = loop {
            if self.break_flag.swap(false, Ordering::AcqRel) {
                break Ok(LoopExit::Break);
            }
            if limit.is_some_and(|limit| delivered >= limit) {
                break Ok(LoopExit::Count);
            }
            match self.handle.next_frame() {
                Ok(NextFrame::Frame(meta, bytes)) => {
                    self.stats.record_frame(bytes.len());
                    on_frame(&meta, bytes);
                    delivered += 1;
                }
                Ok(NextFrame::Timeout) => {
                    if return_on_timeout {
                        break Ok(LoopExit::Timeout);
                    }
                }
                Ok(NextFrame::Eof) => break Ok(LoopExit::Exhausted),
                Err(e) => break Err(e),
            }
        };

        match result {
            Ok(exit) => {
                self.state = SessionState::Activated;
                if exit == LoopExit::Break {
                    info!("{} on {} interrupted after {} frames", operation, self.handle.source(), delivered);
                } else {
                    debug!("{} on {} finished: {:?}, {} frames", operation, self.handle.source(), exit, delivered);
                }
                Ok(LoopOutcome { exit, delivered })
            }
            Err(e) => {
                self.state = SessionState::Activated;
                self.after_driver_error(operation, &e);
                Err(e)
            }
        }
    }

    fn after_driver_error(&mut self, operation: &str, err: &Error) {
        error!("{} on {} failed: {}", operation, self.handle.source(), err);
        if !self.handle.is_open() {
            warn!("Descriptor for {} is no longer valid, closing session", self.handle.source());
            self.close();
        }
    }

    /// Inject a raw frame
    pub fn send_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.ensure_activated("send frame")?;
        self.handle.send(frame)
    }

    /// Driver counters joined with the session's own
    pub fn stats(&mut self) -> Result<CaptureStats> {
        self.ensure_activated("read stats")?;
        let driver = self.handle.stats()?;
        Ok(self.stats.snapshot(driver))
    }

    /// Open a capture file at `path` for this session's link type and snaplen
    pub fn dump_open<P: AsRef<Path>>(&mut self, path: P) -> Result<CaptureDump> {
        self.ensure_activated("open dump file")?;
        let path = path.as_ref();
        let dumper = self.handle.dump_open(path).map_err(|e| {
            error!("Failed to open {} for writing: {}", path.display(), e);
            e
        })?;
        Ok(CaptureDump::new(path.to_path_buf(), dumper))
    }

    /// Session-side counters, shareable with other threads
    pub fn stats_accumulator(&self) -> &StatsAccumulator {
        &self.stats
    }

    /// Release the descriptor. Idempotent.
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.handle.close();
        self.state = SessionState::Closed;
        self.attached_filter = None;
        info!("Capture session on {} closed", self.handle.source());
    }

    pub(crate) fn compile_program(
        &mut self,
        expression: &str,
        optimize: bool,
        netmask: u32,
    ) -> Result<(Arc<dyn FilterProgram>, LinkType)> {
        let link_type = self.datalink()?;
        let program = self.handle.compile(expression, optimize, netmask)?;
        Ok((program, link_type))
    }

    pub(crate) fn install_program(&mut self, program: Arc<dyn FilterProgram>) -> Result<()> {
        self.ensure_activated("attach filter")?;
        let expression = program.expression().to_string();
        self.handle.set_filter(program)?;
        self.attached_filter = Some(expression);
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state == SessionState::Closed {
            return Err(Error::SessionClosed);
        }
        Ok(())
    }

    fn ensure_activated(&self, operation: &'static str) -> Result<()> {
        match self.state {
            SessionState::Closed => Err(Error::SessionClosed),
            SessionState::Created => Err(Error::invalid_state(operation, self.state)),
            SessionState::Activated | SessionState::Looping => Ok(()),
        }
    }
}

impl fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureSession")
            .field("source", &self.handle.source())
            .field("state", &self.state)
            .field("link_type", &self.link_type)
            .field("config", &self.config)
            .finish()
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        // Release the descriptor on every exit path
        self.close();
    }
}
