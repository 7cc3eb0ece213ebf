//! Per-frame capture metadata

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Metadata the driver reports alongside each captured frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameMetadata {
    /// Bytes actually captured (at most the snaplen)
    pub cap_len: u32,
    /// Length of the frame on the wire
    pub orig_len: u32,
    /// Timestamp, seconds since the epoch
    pub tv_sec: i64,
    /// Timestamp, microseconds within the second
    pub tv_usec: i64,
}

impl FrameMetadata {
    pub fn new(cap_len: u32, orig_len: u32, tv_sec: i64, tv_usec: i64) -> Self {
        Self {
            cap_len,
            orig_len,
            tv_sec,
            tv_usec,
        }
    }

    /// Metadata for a fully captured frame stamped with the current time
    pub fn now(len: u32) -> Self {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self {
            cap_len: len,
            orig_len: len,
            tv_sec: since_epoch.as_secs() as i64,
            tv_usec: since_epoch.subsec_micros() as i64,
        }
    }

    /// Whether the snaplen cut the frame short
    pub fn is_truncated(&self) -> bool {
        self.cap_len < self.orig_len
    }

    /// Capture timestamp; pre-epoch values clamp to the epoch
    pub fn timestamp(&self) -> SystemTime {
        if self.tv_sec < 0 {
            return UNIX_EPOCH;
        }
        UNIX_EPOCH
            + Duration::from_secs(self.tv_sec as u64)
            + Duration::from_micros(self.tv_usec.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncation() {
        assert!(FrameMetadata::new(60, 1514, 0, 0).is_truncated());
        assert!(!FrameMetadata::new(60, 60, 0, 0).is_truncated());
    }

    #[test]
    fn test_timestamp() {
        let meta = FrameMetadata::new(54, 54, 1_500_000_000, 250_000);
        let expected = UNIX_EPOCH + Duration::from_millis(1_500_000_000_250);
        assert_eq!(meta.timestamp(), expected);
    }

    #[test]
    fn test_now_is_complete() {
        let meta = FrameMetadata::now(42);
        assert_eq!(meta.cap_len, 42);
        assert_eq!(meta.orig_len, 42);
        assert!(meta.tv_sec > 0);
    }
}
