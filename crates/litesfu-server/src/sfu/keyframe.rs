//! Keyframe refresh loop
//!
//! Sends a picture loss indication to the publisher on a fixed cadence so its
//! encoder keeps emitting full frames. Viewers that join late or drop samples
//! can start decoding again within one interval.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::transport;

/// How often a keyframe is requested from the publisher
pub const KEYFRAME_INTERVAL: Duration = Duration::from_secs(1);

/// Sends picture loss indications towards a media source
#[async_trait]
pub trait KeyframeRequester: Send + Sync {
    async fn request_keyframe(&self, media_ssrc: u32) -> Result<(), webrtc::Error>;
}

/// Request a keyframe from `media_ssrc` every `period` until cancelled or the
/// transport reports the pipe closed. Returns the number of requests sent.
pub async fn run_keyframe_loop<R>(
    requester: &R,
    media_ssrc: u32,
    period: Duration,
    cancel: &CancellationToken,
) -> u64
where
    R: KeyframeRequester + ?Sized,
{
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut sent = 0u64;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match requester.request_keyframe(media_ssrc).await {
            Ok(()) => sent += 1,
            Err(e) if transport::is_closed(&e) => {
                tracing::debug!("Keyframe loop for SSRC {} stopped: {}", media_ssrc, e);
                break;
            }
            Err(e) => tracing::warn!("Failed to request keyframe from SSRC {}: {}", media_ssrc, e),
        }
    }

    sent
}
