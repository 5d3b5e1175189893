//! Publisher pipeline
//!
//! Reads RTP from the publisher's inbound track, reassembles complete samples
//! and writes them to the broadcast track.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use webrtc::rtp::packet::Packet;
use webrtc::rtp::packetizer::Depacketizer;

use litesfu_media::SampleBuilder;

use super::broadcast::{BroadcastError, BroadcastWriter};
use crate::transport;

/// Back-off while the transport attaches the receiver to a fresh track
const RECEIVER_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Inbound RTP packet source
#[async_trait]
pub trait RtpSource: Send + Sync {
    async fn next_packet(&self) -> Result<Packet, webrtc::Error>;
}

/// Why a publisher pipeline stopped
#[derive(Debug)]
pub enum PipelineEnd {
    /// The owning session was closed
    Cancelled,
    /// The inbound track ended normally
    StreamEnded,
    /// A newer publisher took over the broadcast track
    Evicted,
    /// Reading from the inbound track failed
    Failed(webrtc::Error),
}

/// Counters reported when a pipeline ends
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStats {
    pub packets: u64,
    pub samples: u64,
    pub dropped: u64,
}

/// Pump packets from `source` through `builder` into `writer` until the stream
/// ends, the writer is evicted, or `cancel` fires.
pub async fn run_publisher_pipeline<S, D>(
    source: &S,
    mut builder: SampleBuilder<D>,
    writer: &BroadcastWriter,
    cancel: &CancellationToken,
) -> (PipelineEnd, PipelineStats)
where
    S: RtpSource + ?Sized,
    D: Depacketizer + Send,
{
    let mut stats = PipelineStats::default();

    let end = 'read: loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break PipelineEnd::Cancelled,
            next = source.next_packet() => next,
        };

        let packet = match next {
            Ok(packet) => packet,
            Err(e) if transport::is_closed(&e) => break PipelineEnd::StreamEnded,
            Err(e) if transport::is_receiver_not_ready(&e) => {
                tokio::time::sleep(RECEIVER_RETRY_DELAY).await;
                continue;
            }
            Err(e) => break PipelineEnd::Failed(e),
        };

        stats.packets += 1;
        builder.push(packet);

        while let Some(sample) = builder.pop() {
            if sample.prev_dropped_packets > 0 {
                tracing::debug!(
                    "Session {} dropped {} packets before sample",
                    writer.session_id(),
                    sample.prev_dropped_packets
                );
            }
            match writer.write(sample) {
                Ok(_) => stats.samples += 1,
                Err(BroadcastError::Evicted) => break 'read PipelineEnd::Evicted,
            }
        }
    };

    stats.dropped = builder.dropped_total();
    tracing::info!(
        "Publisher pipeline for session {} ended ({:?}): {} packets, {} samples, {} dropped",
        writer.session_id(),
        end,
        stats.packets,
        stats.samples,
        stats.dropped
    );
    (end, stats)
}
