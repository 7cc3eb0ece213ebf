//! Capture file writing
//!
//! A [`CaptureDump`] is opened from an activated session with
//! [`CaptureSession::dump_open`](crate::session::CaptureSession::dump_open)
//! and writes records in the driver's capture-file format, so the result can
//! be read back with `CaptureSession::open_offline`. The file keeps the
//! session's link type and snaplen. Once closed, every call fails with
//! [`Error::DumperClosed`].

use std::fmt;
use std::path::{Path, PathBuf};
use tapline_core::{Error, FrameMetadata, Result};
use tracing::{debug, info, warn};

use crate::driver::FrameDumper;

/// An open capture file
pub struct CaptureDump {
    path: PathBuf,
    dumper: Option<Box<dyn FrameDumper>>,
    frames: u64,
}

impl CaptureDump {
    pub(crate) fn new(path: PathBuf, dumper: Box<dyn FrameDumper>) -> Self {
        debug!("Opened capture file {}", path.display());
        Self {
            path,
            dumper: Some(dumper),
            frames: 0,
        }
    }

    /// Append one frame with its capture metadata
    pub fn write(&mut self, meta: &FrameMetadata, frame: &[u8]) -> Result<()> {
        self.dumper()?.write(meta, frame)?;
        self.frames += 1;
        Ok(())
    }

    /// Push buffered records to disk
    pub fn flush(&mut self) -> Result<()> {
        self.dumper()?.flush()
    }

    /// Current file offset in bytes, header included
    pub fn position(&self) -> Result<u64> {
        self.dumper
            .as_ref()
            .map(|dumper| dumper.position())
            .ok_or(Error::DumperClosed)
    }

    /// Flush and close the file
    pub fn close(&mut self) -> Result<()> {
        let mut dumper = self.dumper.take().ok_or(Error::DumperClosed)?;
        dumper.close()?;
        info!("Closed capture file {} ({} frames)", self.path.display(), self.frames);
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.dumper.is_none()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records written so far
    pub fn frames_written(&self) -> u64 {
        self.frames
    }

    fn dumper(&mut self) -> Result<&mut Box<dyn FrameDumper>> {
        self.dumper.as_mut().ok_or(Error::DumperClosed)
    }
}

impl fmt::Debug for CaptureDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureDump")
            .field("path", &self.path)
            .field("frames", &self.frames)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Drop for CaptureDump {
    fn drop(&mut self) {
        if let Some(mut dumper) = self.dumper.take() {
            if let Err(e) = dumper.close() {
                warn!("Closing capture file {} failed: {}", self.path.display(), e);
            }
        }
    }
}
