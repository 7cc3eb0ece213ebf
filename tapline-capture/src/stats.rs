//! Capture statistics
//!
//! A [`CaptureStats`] snapshot joins two sources: the session's own counters
//! ([`StatsAccumulator`], bumped as frames are delivered and decoded) and the
//! driver's counters ([`DriverStats`]) read at snapshot time.

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::driver::DriverStats;

/// Point-in-time statistics of a capture session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureStats {
    /// Frames handed to loop callbacks or returned by `next_frame`
    pub frames_delivered: u64,
    /// Captured bytes of those frames
    pub bytes_delivered: u64,
    /// Delivered frames that failed to decode
    pub decode_failures: u64,
    /// Driver counters
    pub driver: DriverStats,
    /// Time since activation
    pub elapsed: Duration,
}

impl CaptureStats {
    /// Share of driver-received frames dropped for lack of buffer space, in percent
    pub fn drop_rate(&self) -> f64 {
        if self.driver.received == 0 {
            return 0.0;
        }
        f64::from(self.driver.dropped) / f64::from(self.driver.received) * 100.0
    }

    pub fn frames_per_second(&self) -> f64 {
        per_second(self.frames_delivered, self.elapsed)
    }

    pub fn bytes_per_second(&self) -> f64 {
        per_second(self.bytes_delivered, self.elapsed)
    }
}

fn per_second(count: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        count as f64 / secs
    } else {
        0.0
    }
}

impl fmt::Display for CaptureStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Delivered: {} frames ({} bytes), {} failed to decode",
            self.frames_delivered, self.bytes_delivered, self.decode_failures
        )?;
        writeln!(
            f,
            "Driver: {} received, {} dropped ({:.2}%), {} dropped by interface",
            self.driver.received,
            self.driver.dropped,
            self.drop_rate(),
            self.driver.if_dropped
        )?;
        write!(
            f,
            "Elapsed: {:.2}s, {:.2} fps, {:.2} KB/s",
            self.elapsed.as_secs_f64(),
            self.frames_per_second(),
            self.bytes_per_second() / 1024.0
        )
    }
}

#[derive(Debug)]
struct Counters {
    frames: AtomicU64,
    bytes: AtomicU64,
    decode_failures: AtomicU64,
    started: Mutex<Instant>,
}

/// Session-side counters, shared by clones across threads
#[derive(Debug, Clone)]
pub struct StatsAccumulator {
    counters: Arc<Counters>,
}

impl StatsAccumulator {
    pub fn new() -> Self {
        Self {
            counters: Arc::new(Counters {
                frames: AtomicU64::new(0),
                bytes: AtomicU64::new(0),
                decode_failures: AtomicU64::new(0),
                started: Mutex::new(Instant::now()),
            }),
        }
    }

    /// Count one delivered frame of `len` captured bytes
    pub fn record_frame(&self, len: usize) {
        self.counters.frames.fetch_add(1, Ordering::Relaxed);
        self.counters.bytes.fetch_add(len as u64, Ordering::Relaxed);
    }

    pub fn record_decode_failure(&self) {
        self.counters.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frames_delivered(&self) -> u64 {
        self.counters.frames.load(Ordering::Relaxed)
    }

    pub fn bytes_delivered(&self) -> u64 {
        self.counters.bytes.load(Ordering::Relaxed)
    }

    pub fn decode_failures(&self) -> u64 {
        self.counters.decode_failures.load(Ordering::Relaxed)
    }

    /// Time since creation or the last reset
    pub fn elapsed(&self) -> Duration {
        self.counters.started.lock().elapsed()
    }

    /// Zero every counter and restart the clock
    pub fn reset(&self) {
        self.counters.frames.store(0, Ordering::Relaxed);
        self.counters.bytes.store(0, Ordering::Relaxed);
        self.counters.decode_failures.store(0, Ordering::Relaxed);
        *self.counters.started.lock() = Instant::now();
    }

    /// Join the session counters with `driver`
    pub fn snapshot(&self, driver: DriverStats) -> CaptureStats {
        CaptureStats {
            frames_delivered: self.frames_delivered(),
            bytes_delivered: self.bytes_delivered(),
            decode_failures: self.decode_failures(),
            driver,
            elapsed: self.elapsed(),
        }
    }
}

impl Default for StatsAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
