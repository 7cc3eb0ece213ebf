//! In-memory capture driver
//!
//! [`ReplayHandle`] plays back frames queued through a [`ReplayFeed`]. It
//! needs no privileges and no network device, which makes it the driver of
//! choice for exercising sessions, filters and dispatch in tests. Filter
//! expressions are resolved against predicates registered with
//! [`ReplayHandle::define_filter`]; any other expression fails to compile the
//! way a syntax error would. Capture files opened with `dump_open` are
//! recorded in memory and read back through [`ReplayFeed::dumped_frames`].

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tapline_core::{Error, FrameMetadata, LinkType, Result};
use tracing::debug;

use crate::driver::{
    Activation, CaptureHandle, DriverStats, FilterProgram, FrameDumper, NextFrame,
    SAVEFILE_HEADER_LEN, SAVEFILE_RECORD_HEADER_LEN,
};
use crate::session::CaptureConfig;

type Matcher = Arc<dyn Fn(&[u8]) -> bool + Send + Sync>;

enum Event {
    Frame(FrameMetadata, Vec<u8>),
    Timeout,
    Error {
        code: i32,
        message: String,
        fatal: bool,
    },
}

#[derive(Default)]
struct Shared {
    queue: VecDeque<Event>,
    sent: Vec<Vec<u8>>,
    dumped: Vec<(PathBuf, FrameMetadata, Vec<u8>)>,
    dropped: u32,
    if_dropped: u32,
    finished: bool,
    closed: bool,
}

/// Producer side of a [`ReplayHandle`], usable from any thread
#[derive(Clone)]
pub struct ReplayFeed {
    shared: Arc<Mutex<Shared>>,
}

impl ReplayFeed {
    /// Queue a complete frame stamped with the current time
    pub fn push_frame<B: AsRef<[u8]>>(&self, frame: B) {
        let frame = frame.as_ref().to_vec();
        let meta = FrameMetadata::now(frame.len() as u32);
        self.shared.lock().queue.push_back(Event::Frame(meta, frame));
    }

    /// Queue a frame with explicit metadata
    pub fn push_frame_with<B: AsRef<[u8]>>(&self, meta: FrameMetadata, frame: B) {
        self.shared
            .lock()
            .queue
            .push_back(Event::Frame(meta, frame.as_ref().to_vec()));
    }

    /// Queue one buffer timeout
    pub fn push_timeout(&self) {
        self.shared.lock().queue.push_back(Event::Timeout);
    }

    /// Queue a driver error. A fatal error also invalidates the descriptor.
    pub fn push_error<S: Into<String>>(&self, code: i32, message: S, fatal: bool) {
        self.shared.lock().queue.push_back(Event::Error {
            code,
            message: message.into(),
            fatal,
        });
    }

    /// Mark the source exhausted once the queue drains
    pub fn finish(&self) {
        self.shared.lock().finished = true;
    }

    pub fn set_drops(&self, dropped: u32, if_dropped: u32) {
        let mut shared = self.shared.lock();
        shared.dropped = dropped;
        shared.if_dropped = if_dropped;
    }

    /// Frames that have not been read yet
    pub fn pending(&self) -> usize {
        self.shared.lock().queue.len()
    }

    /// Frames injected through [`CaptureHandle::send`]
    pub fn sent_frames(&self) -> Vec<Vec<u8>> {
        self.shared.lock().sent.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    /// Records written to `path` through a dumper opened on the handle
    pub fn dumped_frames(&self, path: &Path) -> Vec<(FrameMetadata, Vec<u8>)> {
        self.shared
            .lock()
            .dumped
            .iter()
            .filter(|(dump_path, _, _)| dump_path == path)
            .map(|(_, meta, frame)| (*meta, frame.clone()))
            .collect()
    }
}

struct ReplayProgram {
    expression: String,
    optimize: bool,
    netmask: u32,
    matcher: Matcher,
}

impl FilterProgram for ReplayProgram {
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
        (self.matcher)(frame)
    }
}

struct ReplayDumper {
    path: PathBuf,
    shared: Arc<Mutex<Shared>>,
    position: u64,
    open: bool,
}

impl FrameDumper for ReplayDumper {
    fn write(&mut self, meta: &FrameMetadata, frame: &[u8]) -> Result<()> {
        if !self.open {
            return Err(Error::driver(-1, "dump file is closed"));
        }
        self.shared
            .lock()
            .dumped
            .push((self.path.clone(), *meta, frame.to_vec()));
        self.position += SAVEFILE_RECORD_HEADER_LEN + frame.len() as u64;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn close(&mut self) -> Result<()> {
        self.open = false;
        Ok(())
    }
}

/// Capture driver backed by an in-memory frame queue
pub struct ReplayHandle {
    source: String,
    link_type: LinkType,
    shared: Arc<Mutex<Shared>>,
    filters: HashMap<String, Matcher>,
    warnings: Vec<String>,
    activation_error: Option<(i32, String)>,
    filter: Option<Arc<dyn FilterProgram>>,
    snaplen: usize,
    recorded_snaplen: Option<i32>,
    activated: bool,
    received: u32,
    current: Vec<u8>,
}

impl ReplayHandle {
    /// A live source: an empty queue reports a buffer timeout
    pub fn new(link_type: LinkType) -> Self {
        Self {
            source: "replay".to_string(),
            link_type,
            shared: Arc::new(Mutex::new(Shared::default())),
            filters: HashMap::new(),
            warnings: Vec::new(),
            activation_error: None,
            filter: None,
            snaplen: CaptureConfig::default().snaplen as usize,
            recorded_snaplen: None,
            activated: false,
            received: 0,
            current: Vec::new(),
        }
    }

    /// An offline source holding `frames`; an empty queue reports end of file
    pub fn offline<I, B>(link_type: LinkType, frames: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        let handle = Self::new(link_type).named("replay.pcap");
        let feed = handle.feed();
        for frame in frames {
            feed.push_frame(frame);
        }
        feed.finish();
        handle
    }

    pub fn named<S: Into<String>>(mut self, source: S) -> Self {
        self.source = source.into();
        self
    }

    /// Register the predicate `expression` compiles to
    pub fn define_filter<F>(mut self, expression: &str, matcher: F) -> Self
    where
        F: Fn(&[u8]) -> bool + Send + Sync + 'static,
    {
        self.filters.insert(expression.to_string(), Arc::new(matcher));
        self
    }

    /// Snapshot length the source was recorded with; it overrides the
    /// configured one the way a capture file header does
    pub fn recorded_snaplen(mut self, snaplen: i32) -> Self {
        self.recorded_snaplen = Some(snaplen);
        self
    }

    /// Report `warning` alongside a successful activation
    pub fn warn_on_activate<S: Into<String>>(mut self, warning: S) -> Self {
        self.warnings.push(warning.into());
        self
    }

    /// Make activation fail with a driver error
    pub fn fail_activation<S: Into<String>>(mut self, code: i32, message: S) -> Self {
        self.activation_error = Some((code, message.into()));
        self
    }

    pub fn feed(&self) -> ReplayFeed {
        ReplayFeed {
            shared: Arc::clone(&self.shared),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(Error::driver(-1, "replay handle is not active"))
        }
    }
}

impl CaptureHandle for ReplayHandle {
    fn source(&self) -> &str {
        &self.source
    }

    fn activate(&mut self, config: &CaptureConfig) -> Result<Activation> {
        if let Some((code, message)) = self.activation_error.take() {
            return Err(Error::driver(code, message));
        }
        let snaplen = self.recorded_snaplen.unwrap_or(config.snaplen);
        self.snaplen = if snaplen > 0 {
            snaplen as usize
        } else {
            CaptureConfig::default().snaplen as usize
        };
        self.activated = true;

        let mut activation = Activation::default();
        for warning in self.warnings.drain(..) {
            activation = activation.with_warning(warning);
        }
        Ok(activation)
    }

    fn link_type(&self) -> Result<LinkType> {
        Ok(self.link_type)
    }

    fn snaplen(&self) -> Result<i32> {
        self.ensure_open()?;
        Ok(self.snaplen as i32)
    }

    fn compile(
        &mut self,
        expression: &str,
        optimize: bool,
        netmask: u32,
    ) -> Result<Arc<dyn FilterProgram>> {
        let matcher: Matcher = if expression.trim().is_empty() {
            Arc::new(|_: &[u8]| true)
        } else {
            self.filters
                .get(expression)
                .cloned()
                .ok_or_else(|| {
                    Error::FilterCompile(format!("syntax error in filter expression: {}", expression))
                })?
        };
        Ok(Arc::new(ReplayProgram {
            expression: expression.to_string(),
            optimize,
            netmask,
            matcher,
        }))
    }

    fn set_filter(&mut self, program: Arc<dyn FilterProgram>) -> Result<()> {
        self.ensure_open()?;
        debug!(source = %self.source, expression = program.expression(), "replay filter installed");
        self.filter = Some(program);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<NextFrame<'_>> {
        self.ensure_open()?;
        loop {
            let event = self.shared.lock().queue.pop_front();
            match event {
                Some(Event::Frame(meta, mut frame)) => {
                    if let Some(filter) = &self.filter {
                        if !filter.matches(&frame) {
                            continue;
                        }
                    }
                    frame.truncate(self.snaplen);
                    let meta = FrameMetadata {
                        cap_len: frame.len() as u32,
                        ..meta
                    };
                    self.received = self.received.wrapping_add(1);
                    self.current = frame;
                    return Ok(NextFrame::Frame(meta, &self.current));
                }
                Some(Event::Timeout) => return Ok(NextFrame::Timeout),
                Some(Event::Error {
                    code,
                    message,
                    fatal,
                }) => {
                    if fatal {
                        self.shared.lock().closed = true;
                    }
                    return Err(Error::driver(code, message));
                }
                None => {
                    if self.shared.lock().finished {
                        return Ok(NextFrame::Eof);
                    }
                    // Stand-in for the driver's buffer timeout
                    thread::sleep(Duration::from_millis(1));
                    return Ok(NextFrame::Timeout);
                }
            }
        }
    }

    fn send(&mut self, frame: &[u8]) -> Result<()> {
        self.ensure_open()?;
        self.shared.lock().sent.push(frame.to_vec());
        Ok(())
    }

    fn stats(&mut self) -> Result<DriverStats> {
        self.ensure_open()?;
        let shared = self.shared.lock();
        Ok(DriverStats {
            received: self.received,
            dropped: shared.dropped,
            if_dropped: shared.if_dropped,
        })
    }

    fn dump_open(&mut self, path: &Path) -> Result<Box<dyn FrameDumper>> {
        self.ensure_open()?;
        debug!(source = %self.source, path = %path.display(), "replay dump opened");
        Ok(Box::new(ReplayDumper {
            path: path.to_path_buf(),
            shared: Arc::clone(&self.shared),
            position: SAVEFILE_HEADER_LEN,
            open: true,
        }))
    }

    fn is_open(&self) -> bool {
        self.activated && !self.shared.lock().closed
    }

    fn close(&mut self) {
        self.shared.lock().closed = true;
        self.filter = None;
    }
}
