//! Telemetry send loop
//!
//! Pushes a synthetic overlay message to a viewer over its data channel once
//! per second. The loop only starts when the channel reports open, and ends
//! for good on the first send failure or when the peer closes the channel.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use litesfu_protocol::TelemetryMessage;

/// Interval between two telemetry messages
pub const TELEMETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Seed of the position generator; every channel replays the same sequence
pub const TELEMETRY_SEED: u64 = 42;

const WORDS: [&str; 4] = ["one", "two", "three", "four"];
const POSITION_RANGE: i32 = 200;
const BOX_SIZE: i32 = 100;

/// Side channel a viewer receives telemetry on
#[async_trait]
pub trait TelemetryChannel: Send + Sync {
    /// Human readable identity for logs
    fn describe(&self) -> String;

    async fn send_message(&self, text: String) -> Result<(), webrtc::Error>;

    async fn close_channel(&self) -> Result<(), webrtc::Error>;
}

/// Lifecycle notifications for a data channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelEvent {
    Open,
    Closed,
}

/// Why a telemetry loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryEnd {
    /// The channel closed (or its events went away) before it ever opened
    ClosedBeforeOpen,
    /// The remote peer closed the channel
    ClosedByPeer,
    /// A send failed; the channel was closed from our side
    SendFailed,
    /// The owning session was closed
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryReport {
    pub end: TelemetryEnd,
    pub sent: u64,
}

/// Produces telemetry messages
pub struct TelemetryGenerator {
    rng: StdRng,
}

impl TelemetryGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn next_message(&mut self, now: DateTime<Local>) -> TelemetryMessage {
        let word = WORDS[self.rng.gen_range(0..WORDS.len())];
        TelemetryMessage {
            text: format!("{} - {}", now.format("%Y-%m-%d %H:%M:%S"), word),
            x: self.rng.gen_range(0..POSITION_RANGE),
            y: self.rng.gen_range(0..POSITION_RANGE),
            height: BOX_SIZE,
            width: BOX_SIZE,
        }
    }
}

impl Default for TelemetryGenerator {
    fn default() -> Self {
        Self::new(TELEMETRY_SEED)
    }
}

/// Wait for `events` to report the channel open, then send one message per
/// `period` until the channel closes, a send fails, or `cancel` fires.
pub async fn run_telemetry<C>(
    channel: &C,
    mut events: mpsc::UnboundedReceiver<ChannelEvent>,
    period: Duration,
    cancel: &CancellationToken,
) -> TelemetryReport
where
    C: TelemetryChannel + ?Sized,
{
    let opened = loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break false,
            event = events.recv() => match event {
                Some(ChannelEvent::Open) => break true,
                Some(ChannelEvent::Closed) | None => break false,
            },
        }
    };
    if !opened {
        let end = if cancel.is_cancelled() {
            TelemetryEnd::Cancelled
        } else {
            TelemetryEnd::ClosedBeforeOpen
        };
        return TelemetryReport { end, sent: 0 };
    }

    tracing::info!("Open data channel {}", channel.describe());

    let mut generator = TelemetryGenerator::default();
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut sent = 0u64;

    let end = loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break TelemetryEnd::Cancelled,
            event = events.recv() => match event {
                Some(ChannelEvent::Closed) | None => break TelemetryEnd::ClosedByPeer,
                Some(ChannelEvent::Open) => continue,
            },
            _ = ticker.tick() => {}
        }

        let message = generator.next_message(Local::now());
        let text = match serde_json::to_string(&message) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Failed to encode telemetry message: {}", e);
                continue;
            }
        };

        if let Err(e) = channel.send_message(text).await {
            tracing::warn!("Telemetry send on {} failed: {}", channel.describe(), e);
            if let Err(e) = channel.close_channel().await {
                tracing::debug!("Closing data channel {} failed: {}", channel.describe(), e);
            }
            break TelemetryEnd::SendFailed;
        }
        sent += 1;
    };

    tracing::info!(
        "Closed data channel {} after {} messages ({:?})",
        channel.describe(),
        sent,
        end
    );
    TelemetryReport { end, sent }
}
