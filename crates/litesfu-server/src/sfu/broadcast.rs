//! Broadcast track
//!
//! The single shared sink between the active publisher and every viewer.
//! Samples are fanned out through a bounded broadcast queue; each viewer drains
//! its own receiver in its own task, so a slow viewer never stalls the writer
//! or the other viewers. A viewer that falls too far behind skips samples and
//! recovers on the next keyframe.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use webrtc::media::Sample;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;

use crate::transport;

/// Samples buffered per viewer before it starts lagging (about two seconds at 30 fps)
pub const VIEWER_QUEUE_DEPTH: usize = 64;

/// Outbound sink for one viewer
#[async_trait]
pub trait SampleWriter: Send + Sync {
    async fn deliver(&self, sample: &Sample) -> Result<(), webrtc::Error>;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BroadcastError {
    /// Another publisher claimed the track after this writer
    #[error("writer lease was taken over by another publisher")]
    Evicted,
}

/// Current holder of the writer lease
#[derive(Debug, Clone, Copy)]
struct Lease {
    generation: u64,
    session_id: Uuid,
}

/// Process-wide broadcast track
pub struct BroadcastTrack {
    capability: RTCRtpCodecCapability,
    ssrc: u32,
    sender: broadcast::Sender<Arc<Sample>>,
    lease: Mutex<Option<Lease>>,
    next_generation: AtomicU64,
}

impl BroadcastTrack {
    pub fn new(capability: RTCRtpCodecCapability, ssrc: u32) -> Self {
        let (sender, _) = broadcast::channel(VIEWER_QUEUE_DEPTH);
        Self {
            capability,
            ssrc,
            sender,
            lease: Mutex::new(None),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Codec every viewer track is created with
    pub fn capability(&self) -> &RTCRtpCodecCapability {
        &self.capability
    }

    /// Synchronization source chosen at startup
    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    /// Track ID announced to viewers
    pub fn track_id(&self) -> String {
        "video".to_string()
    }

    /// Stream ID announced to viewers
    pub fn stream_id(&self) -> String {
        format!("litesfu-{:08x}", self.ssrc)
    }

    /// Attach a new viewer. Dropping the receiver unsubscribes it.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Sample>> {
        self.sender.subscribe()
    }

    /// Number of attached viewers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Session currently allowed to write
    pub fn writer(&self) -> Option<Uuid> {
        self.lock_lease().map(|lease| lease.session_id)
    }

    /// Take the writer lease for `session_id`.
    ///
    /// Returns the new writer and the session that held the lease before, if any.
    /// The previous writer's handle stops working immediately.
    pub fn claim_writer(self: &Arc<Self>, session_id: Uuid) -> (BroadcastWriter, Option<Uuid>) {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let previous = {
            let mut lease = self.lease.lock().unwrap_or_else(|e| e.into_inner());
            lease
                .replace(Lease {
                    generation,
                    session_id,
                })
                .map(|old| old.session_id)
        };

        tracing::info!(
            "Session {} claimed the broadcast track (generation {})",
            session_id,
            generation
        );

        let writer = BroadcastWriter {
            track: self.clone(),
            generation,
            session_id,
        };
        (writer, previous.filter(|id| *id != session_id))
    }

    fn lock_lease(&self) -> Option<Lease> {
        *self.lease.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Write handle held by the active publisher's pipeline
pub struct BroadcastWriter {
    track: Arc<BroadcastTrack>,
    generation: u64,
    session_id: Uuid,
}

impl BroadcastWriter {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Push one sample to every subscribed viewer.
    ///
    /// Returns the number of viewers it was queued for; zero viewers is not an error.
    pub fn write(&self, sample: Sample) -> Result<usize, BroadcastError> {
        // Held across the send so a concurrent claim cannot interleave
        let lease = self.track.lease.lock().unwrap_or_else(|e| e.into_inner());
        if (*lease).map(|l| l.generation) != Some(self.generation) {
            return Err(BroadcastError::Evicted);
        }
        Ok(self.track.sender.send(Arc::new(sample)).unwrap_or(0))
    }

    /// Give the lease back if this writer still holds it
    pub fn release(&self) {
        let mut lease = self.track.lease.lock().unwrap_or_else(|e| e.into_inner());
        if (*lease).map(|l| l.generation) == Some(self.generation) {
            *lease = None;
            tracing::info!("Session {} released the broadcast track", self.session_id);
        }
    }
}

/// Why a viewer's delivery task stopped
#[derive(Debug)]
pub enum DeliveryEnd {
    /// The owning session was closed
    Cancelled,
    /// The viewer's transport is gone; equivalent to unsubscribing
    SinkClosed,
    /// The broadcast track itself went away
    TrackClosed,
    /// The viewer's sink failed for a reason other than closure
    Failed(webrtc::Error),
}

/// Drain a viewer's receiver into its outbound sink, in broadcast order
pub async fn deliver_to_viewer<W>(
    mut receiver: broadcast::Receiver<Arc<Sample>>,
    writer: &W,
    cancel: &CancellationToken,
) -> DeliveryEnd
where
    W: SampleWriter + ?Sized,
{
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return DeliveryEnd::Cancelled,
            next = receiver.recv() => next,
        };

        match next {
            Ok(sample) => {
                if let Err(e) = writer.deliver(&sample).await {
                    if transport::is_closed(&e) {
                        return DeliveryEnd::SinkClosed;
                    }
                    return DeliveryEnd::Failed(e);
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!("Viewer lagging behind, skipped {} samples", skipped);
            }
            Err(RecvError::Closed) => return DeliveryEnd::TrackClosed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tokio::sync::Mutex as AsyncMutex;

    #[derive(Default)]
    struct RecordingWriter {
        seen: AsyncMutex<Vec<u32>>,
        fail_with: Option<fn() -> webrtc::Error>,
    }

    #[async_trait]
    impl SampleWriter for RecordingWriter {
        async fn deliver(&self, sample: &Sample) -> Result<(), webrtc::Error> {
            if let Some(make_error) = self.fail_with {
                return Err(make_error());
            }
            self.seen.lock().await.push(sample.packet_timestamp);
            Ok(())
        }
    }

    fn track() -> Arc<BroadcastTrack> {
        Arc::new(BroadcastTrack::new(
            litesfu_media::codec::vp8_capability(),
            0x1234_5678,
        ))
    }

    fn sample(timestamp: u32) -> Sample {
        Sample {
            data: Bytes::from_static(&[0x10, 0x02]),
            packet_timestamp: timestamp,
            ..Default::default()
        }
    }

    #[test]
    fn stream_identity_comes_from_ssrc() {
        let track = track();
        assert_eq!(track.ssrc(), 0x1234_5678);
        assert_eq!(track.stream_id(), "litesfu-12345678");
        assert_eq!(track.capability().clock_rate, 90_000);
    }

    #[test]
    fn write_without_viewers_is_not_an_error() {
        let track = track();
        let (writer, previous) = track.claim_writer(Uuid::new_v4());
        assert!(previous.is_none());
        assert_eq!(writer.write(sample(0)), Ok(0));
    }

    #[test]
    fn second_claim_evicts_first_writer() {
        let track = track();
        let first_id = Uuid::new_v4();
        let second_id = Uuid::new_v4();

        let (first, _) = track.claim_writer(first_id);
        let (second, previous) = track.claim_writer(second_id);

        assert_eq!(previous, Some(first_id));
        assert_eq!(track.writer(), Some(second_id));
        assert_eq!(first.write(sample(0)), Err(BroadcastError::Evicted));
        assert!(second.write(sample(0)).is_ok());

        // A stale writer releasing must not drop the new lease
        first.release();
        assert_eq!(track.writer(), Some(second_id));
        second.release();
        assert_eq!(track.writer(), None);
    }

    #[tokio::test]
    async fn viewers_observe_the_same_order() {
        let track = track();
        let cancel = CancellationToken::new();
        let viewer_a = Arc::new(RecordingWriter::default());
        let viewer_b = Arc::new(RecordingWriter::default());

        let tasks: Vec<_> = [viewer_a.clone(), viewer_b.clone()]
            .into_iter()
            .map(|viewer| {
                let receiver = track.subscribe();
                let cancel = cancel.clone();
                tokio::spawn(async move { deliver_to_viewer(receiver, &*viewer, &cancel).await })
            })
            .collect();
        assert_eq!(track.subscriber_count(), 2);

        let (writer, _) = track.claim_writer(Uuid::new_v4());
        let timestamps: Vec<u32> = (0..40).map(|i| i * 3000).collect();
        for ts in &timestamps {
            assert_eq!(writer.write(sample(*ts)), Ok(2));
            tokio::task::yield_now().await;
        }

        // Dropping the track's only sender ends both viewers
        drop(writer);
        drop(track);
        for task in tasks {
            assert!(matches!(task.await.unwrap(), DeliveryEnd::TrackClosed));
        }

        assert_eq!(*viewer_a.seen.lock().await, timestamps);
        assert_eq!(*viewer_b.seen.lock().await, timestamps);
    }

    #[tokio::test]
    async fn closed_sink_unsubscribes_silently() {
        let track = track();
        let cancel = CancellationToken::new();
        let closed = RecordingWriter {
            fail_with: Some(|| webrtc::Error::ErrConnectionClosed),
            ..Default::default()
        };

        let receiver = track.subscribe();
        let (writer, _) = track.claim_writer(Uuid::new_v4());
        writer.write(sample(0)).unwrap();

        let end = deliver_to_viewer(receiver, &closed, &cancel).await;
        assert!(matches!(end, DeliveryEnd::SinkClosed));
        assert_eq!(track.subscriber_count(), 0);
        assert_eq!(writer.write(sample(3000)), Ok(0));
    }

    #[tokio::test]
    async fn structural_sink_error_is_reported() {
        let track = track();
        let cancel = CancellationToken::new();
        let broken = RecordingWriter {
            fail_with: Some(|| webrtc::Error::new("binding has no codec".to_owned())),
            ..Default::default()
        };

        let receiver = track.subscribe();
        let (writer, _) = track.claim_writer(Uuid::new_v4());
        writer.write(sample(0)).unwrap();

        let end = deliver_to_viewer(receiver, &broken, &cancel).await;
        assert!(matches!(end, DeliveryEnd::Failed(_)));
    }

    #[tokio::test]
    async fn cancellation_stops_delivery() {
        let track = track();
        let cancel = CancellationToken::new();
        let viewer = RecordingWriter::default();
        cancel.cancel();

        let end = deliver_to_viewer(track.subscribe(), &viewer, &cancel).await;
        assert!(matches!(end, DeliveryEnd::Cancelled));
    }
}
