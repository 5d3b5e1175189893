//! Media relay core
//!
//! One publisher feeds a shared broadcast track through the reassembly
//! pipeline; every client session drains it on its own task. Each loop sits
//! behind a narrow trait so it can run against the webrtc types in production
//! and against mocks in tests.

mod broadcast;
mod keyframe;
mod pipeline;
mod session;
mod telemetry;

pub use broadcast::{
    BroadcastError, BroadcastTrack, BroadcastWriter, DeliveryEnd, SampleWriter, VIEWER_QUEUE_DEPTH,
    deliver_to_viewer,
};
pub use keyframe::{KEYFRAME_INTERVAL, KeyframeRequester, run_keyframe_loop};
pub use pipeline::{PipelineEnd, PipelineStats, RtpSource, run_publisher_pipeline};
pub use session::{NegotiationState, Session, SessionManager};
pub use telemetry::{
    ChannelEvent, TELEMETRY_INTERVAL, TelemetryChannel, TelemetryEnd, TelemetryGenerator,
    TelemetryReport, run_telemetry,
};
