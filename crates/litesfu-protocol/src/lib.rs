//! Shared protocol definitions for litesfu
//!
//! Types exchanged over the `/sdp` signaling endpoint and the viewer side channel.

pub mod messages;
pub mod types;

pub use messages::*;
pub use types::*;
