//! Video codec descriptor
//!
//! The relay only ever negotiates VP8. Publishers and viewers must agree on it,
//! which keeps the proxying path free of any transcoding.

use webrtc::api::media_engine::{MIME_TYPE_VP8, MediaEngine};
use webrtc::rtp::codecs::vp8::Vp8Packet;
use webrtc::rtp_transceiver::RTCPFeedback;
use webrtc::rtp_transceiver::rtp_codec::{
    RTCRtpCodecCapability, RTCRtpCodecParameters, RTPCodecType,
};

/// Dynamic payload type used for VP8
pub const VP8_PAYLOAD_TYPE: u8 = 96;

/// RTP clock rate for video
pub const VIDEO_CLOCK_RATE: u32 = 90_000;

/// Codec capability shared by the inbound slot and the broadcast track.
///
/// Must match the MediaEngine registration exactly, otherwise `add_track`
/// fails with "no codecs".
pub fn vp8_capability() -> RTCRtpCodecCapability {
    RTCRtpCodecCapability {
        mime_type: MIME_TYPE_VP8.to_owned(),
        clock_rate: VIDEO_CLOCK_RATE,
        channels: 0,
        sdp_fmtp_line: String::new(),
        rtcp_feedback: vec![
            RTCPFeedback {
                typ: "nack".to_owned(),
                parameter: String::new(),
            },
            RTCPFeedback {
                typ: "nack".to_owned(),
                parameter: "pli".to_owned(),
            },
        ],
    }
}

/// Register VP8 as the only video codec
pub fn register_video_codec(media_engine: &mut MediaEngine) -> Result<(), webrtc::Error> {
    media_engine.register_codec(
        RTCRtpCodecParameters {
            capability: vp8_capability(),
            payload_type: VP8_PAYLOAD_TYPE,
            ..Default::default()
        },
        RTPCodecType::Video,
    )
}

/// Depacketizer matching the negotiated codec
pub fn depacketizer() -> Vp8Packet {
    Vp8Packet::default()
}
