//! RTP sample reassembly
//!
//! Turns an unordered, lossy RTP stream for one track into complete samples in
//! sequence order. The reordering itself is webrtc-media's sample builder; this
//! wrapper fixes the window size the relay uses, validates parameters up front
//! and keeps a running count of packets the builder had to give up on.
//!
//! Packets that fall behind the window (because their sample was already
//! emitted or evicted) are discarded. Recency wins over completeness.

use thiserror::Error;
use webrtc::media::Sample;
use webrtc::media::io::sample_builder::SampleBuilder as WindowedBuilder;
use webrtc::rtp::packet::Packet;
use webrtc::rtp::packetizer::Depacketizer;

/// Typical number of packets per frame at the expected frame rate
pub const AVERAGE_FRAME_WIDTH: u16 = 7;

/// Default window capacity in packets
pub const DEFAULT_MAX_LATE: u16 = AVERAGE_FRAME_WIDTH * 5;

/// Half of the 16-bit sequence space; a larger window could not tell old from new
const SEQUENCE_HALF: u16 = 0x8000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReassemblyError {
    #[error("window capacity must be between 2 and 32767 packets, got {0}")]
    InvalidWindow(u16),

    #[error("clock rate must be non-zero")]
    ZeroClockRate,
}

/// Reorders RTP packets and assembles them into samples
pub struct SampleBuilder<D: Depacketizer> {
    inner: WindowedBuilder<D>,
    dropped_total: u64,
}

impl<D: Depacketizer> SampleBuilder<D> {
    /// Create a builder holding at most `max_late` packets
    pub fn new(max_late: u16, clock_rate: u32, depacketizer: D) -> Result<Self, ReassemblyError> {
        if !(2..SEQUENCE_HALF).contains(&max_late) {
            return Err(ReassemblyError::InvalidWindow(max_late));
        }
        if clock_rate == 0 {
            return Err(ReassemblyError::ZeroClockRate);
        }

        Ok(Self {
            inner: WindowedBuilder::new(max_late, depacketizer, clock_rate),
            dropped_total: 0,
        })
    }

    /// Packets discarded so far, as reported alongside emitted samples
    pub fn dropped_total(&self) -> u64 {
        self.dropped_total
    }

    /// Insert one packet. Call [`pop`](Self::pop) until it returns `None` afterwards.
    pub fn push(&mut self, packet: Packet) {
        self.inner.push(packet);
    }

    /// Return the next complete sample, if one is ready
    pub fn pop(&mut self) -> Option<Sample> {
        let sample = self.inner.pop()?;
        if sample.prev_dropped_packets > 0 {
            tracing::trace!(
                "{} packets dropped before sample at timestamp {}",
                sample.prev_dropped_packets,
                sample.packet_timestamp
            );
            self.dropped_total += u64::from(sample.prev_dropped_packets);
        }
        Some(sample)
    }
}
