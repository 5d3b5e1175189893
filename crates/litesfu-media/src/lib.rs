//! Media utilities for litesfu
//!
//! This crate provides the pieces of the relay that deal with encoded media:
//! - The negotiated video codec descriptor (VP8, 90 kHz)
//! - RTP sample reassembly (packets in, complete samples out)

pub mod codec;
pub mod reassembly;

pub use reassembly::{ReassemblyError, SampleBuilder};
