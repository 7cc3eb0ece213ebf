//! Frame dispatch to listeners
//!
//! [`CaptureDispatcher`] drives a session's loop on the calling thread and
//! hands every captured frame to a listener, either as raw bytes or decoded
//! into a [`PacketStack`]. Frames arrive in capture order; nothing is
//! buffered ahead or reordered.
//!
//! A frame that fails to decode does not stop the loop. The listener receives
//! [`FramePayload::DecodeFailed`] with the error and the raw bytes, the
//! failure is counted in the session statistics, and the next frame follows.

use std::sync::Arc;
use tapline_core::{Error, FrameMetadata, Result};
use tapline_packet::{PacketStack, Registry};
use tracing::debug;

use crate::session::{CaptureSession, LoopOutcome};

/// How frames are handed to the listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// Raw bytes borrowed from the driver buffer
    Raw,
    /// Decoded with the session's link type
    #[default]
    Decoded,
}

/// What the listener receives for one frame
#[derive(Debug)]
pub enum FramePayload<'a> {
    Raw(&'a [u8]),
    Decoded(PacketStack),
    /// Decoding this frame failed; the loop continues with the next one
    DecodeFailed { error: Error, raw: &'a [u8] },
}

impl<'a> FramePayload<'a> {
    pub fn as_stack(&self) -> Option<&PacketStack> {
        match self {
            FramePayload::Decoded(stack) => Some(stack),
            _ => None,
        }
    }

    /// Raw bytes, when the payload carries them
    pub fn raw(&self) -> Option<&'a [u8]> {
        match self {
            FramePayload::Raw(raw) | FramePayload::DecodeFailed { raw, .. } => Some(raw),
            FramePayload::Decoded(_) => None,
        }
    }

    pub fn is_decode_failure(&self) -> bool {
        matches!(self, FramePayload::DecodeFailed { .. })
    }
}

/// Runs capture loops and delivers frames to a listener
#[derive(Debug, Clone)]
pub struct CaptureDispatcher {
    registry: Arc<Registry>,
    mode: DeliveryMode,
}

impl CaptureDispatcher {
    /// Dispatcher that decodes frames with `registry`
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            mode: DeliveryMode::Decoded,
        }
    }

    pub fn with_mode(mut self, mode: DeliveryMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Block on `session` until `max_iterations` frames are delivered, the
    /// source is exhausted or a break is requested. `-1` means unbounded.
    ///
    /// The listener is called as `listener(context, metadata, payload)` on
    /// this thread.
    pub fn run<C, F>(
        &self,
        session: &mut CaptureSession,
        max_iterations: i32,
        listener: F,
        context: &mut C,
    ) -> Result<LoopOutcome>
    where
        C: ?Sized,
        F: FnMut(&mut C, &FrameMetadata, FramePayload<'_>),
    {
        self.drive(session, max_iterations, false, listener, context)
    }

    /// Like [`run`](Self::run) but also returns when a buffer timeout elapses
    pub fn dispatch<C, F>(
        &self,
        session: &mut CaptureSession,
        max_iterations: i32,
        listener: F,
        context: &mut C,
    ) -> Result<LoopOutcome>
    where
        C: ?Sized,
        F: FnMut(&mut C, &FrameMetadata, FramePayload<'_>),
    {
        self.drive(session, max_iterations, true, listener, context)
    }

    fn drive<C, F>(
        &self,
        session: &mut CaptureSession,
        max_iterations: i32,
        return_on_timeout: bool,
        mut listener: F,
        context: &mut C,
    ) -> Result<LoopOutcome>
    where
        C: ?Sized,
        F: FnMut(&mut C, &FrameMetadata, FramePayload<'_>),
    {
        let link_type = session.datalink()?;
        let stats = session.stats_accumulator().clone();
        let registry = &self.registry;
        let mode = self.mode;

        let on_frame = |meta: &FrameMetadata, bytes: &[u8]| {
            let payload = match mode {
                DeliveryMode::Raw => FramePayload::Raw(bytes),
                DeliveryMode::Decoded => match PacketStack::decode(bytes, link_type, registry) {
                    Ok(stack) => FramePayload::Decoded(stack),
                    Err(error) => {
                        stats.record_decode_failure();
                        debug!("Frame of {} bytes failed to decode: {}", bytes.len(), error);
                        FramePayload::DecodeFailed { error, raw: bytes }
                    }
                },
            };
            listener(&mut *context, meta, payload);
        };

        if return_on_timeout {
            session.dispatch(max_iterations, on_frame)
        } else {
            session.run_loop(max_iterations, on_frame)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::ReplayHandle;
    use tapline_core::LinkType;
    use tapline_packet::LayerKind;

    fn arp_frame() -> Vec<u8> {
        let mut frame = vec![0xffu8; 6];
        frame.extend_from_slice(&[0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x08, 0x06]);
        frame.extend_from_slice(&[0x00, 0x01, 0x08, 0x00, 0x06, 0x04, 0x00, 0x01]);
        frame.extend_from_slice(&[0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 192, 168, 1, 1]);
        frame.extend_from_slice(&[0x00; 6]);
        frame.extend_from_slice(&[192, 168, 1, 2]);
        frame
    }

    fn truncated_ipv4_frame() -> Vec<u8> {
        let mut frame = vec![0xffu8; 6];
        frame.extend_from_slice(&[0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x08, 0x00]);
        frame.extend_from_slice(&[0x45, 0x00, 0x00]);
        frame
    }

    fn session(frames: Vec<Vec<u8>>) -> CaptureSession {
        let mut session = CaptureSession::from_handle(ReplayHandle::offline(LinkType::Ethernet, frames));
        session.activate().unwrap();
        session
    }

    #[test]
    fn test_decoded_delivery() {
        let mut session = session(vec![arp_frame()]);
        let dispatcher = CaptureDispatcher::new(Arc::new(Registry::with_defaults()));

        let mut kinds = Vec::new();
        let outcome = dispatcher
            .run(
                &mut session,
                -1,
                |kinds: &mut Vec<Vec<LayerKind>>, meta: &FrameMetadata, payload: FramePayload<'_>| {
                    assert_eq!(meta.cap_len, 42);
                    kinds.push(payload.as_stack().unwrap().kinds());
                },
                &mut kinds,
            )
            .unwrap();

        assert_eq!(outcome.delivered, 1);
        assert_eq!(kinds, vec![vec![LayerKind::Ethernet, LayerKind::Arp]]);
    }

    #[test]
    fn test_raw_delivery() {
        let mut session = session(vec![arp_frame(), truncated_ipv4_frame()]);
        let dispatcher =
            CaptureDispatcher::new(Arc::new(Registry::with_defaults())).with_mode(DeliveryMode::Raw);

        let mut lengths = Vec::new();
        dispatcher
            .run(
                &mut session,
                -1,
                |lengths: &mut Vec<usize>, _: &FrameMetadata, payload: FramePayload<'_>| {
                    lengths.push(payload.raw().unwrap().len());
                },
                &mut lengths,
            )
            .unwrap();

        assert_eq!(lengths, vec![42, 17]);
        assert_eq!(session.stats_accumulator().decode_failures(), 0);
    }

    #[test]
    fn test_decode_failure_does_not_stop_loop() {
        let mut session = session(vec![truncated_ipv4_frame(), arp_frame()]);
        let dispatcher = CaptureDispatcher::new(Arc::new(Registry::with_defaults()));

        let mut results = Vec::new();
        let outcome = dispatcher
            .run(
                &mut session,
                -1,
                |results: &mut Vec<bool>, _: &FrameMetadata, payload: FramePayload<'_>| {
                    if let FramePayload::DecodeFailed { error, raw } = &payload {
                        assert!(error.is_per_frame());
                        assert_eq!(raw.len(), 17);
                    }
                    results.push(payload.is_decode_failure());
                },
                &mut results,
            )
            .unwrap();

        assert_eq!(outcome.delivered, 2);
        assert_eq!(results, vec![true, false]);
        assert_eq!(session.stats_accumulator().decode_failures(), 1);
    }
}
