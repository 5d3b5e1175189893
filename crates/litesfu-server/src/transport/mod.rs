//! Transport adapters
//!
//! Bridges the webrtc-rs types onto the narrow capabilities the relay needs.
//! Everything above this module talks to the traits, never to the peer
//! connection directly, which keeps the relay loops testable.

use async_trait::async_trait;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::media::Sample;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtcp::payload_feedbacks::picture_loss_indication::PictureLossIndication;
use webrtc::rtp::packet::Packet;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_remote::TrackRemote;

use crate::sfu::{KeyframeRequester, RtpSource, SampleWriter, TelemetryChannel};

/// Build the ICE server list handed to every peer connection
pub fn ice_servers(stun_servers: &[String]) -> Vec<RTCIceServer> {
    stun_servers
        .iter()
        .map(|url| RTCIceServer {
            urls: vec![url.clone()],
            ..Default::default()
        })
        .collect()
}

/// Whether an error means the underlying pipe, track or connection is gone.
///
/// Interceptors and SRTP wrap the transport's own close in their error types,
/// so only those are matched on the message.
pub fn is_closed(err: &webrtc::Error) -> bool {
    match err {
        webrtc::Error::ErrClosedPipe
        | webrtc::Error::ErrConnectionClosed
        | webrtc::Error::Util(webrtc::util::Error::ErrBufferClosed) => true,
        webrtc::Error::Util(_)
        | webrtc::Error::Srtp(_)
        | webrtc::Error::Interceptor(_)
        | webrtc::Error::new(_) => {
            let message = err.to_string().to_lowercase();
            message.contains("closed") || message.contains("eof")
        }
        _ => false,
    }
}

/// The RTPReceiver is attached shortly after `on_track` fires; reads fail until then
pub fn is_receiver_not_ready(err: &webrtc::Error) -> bool {
    err.to_string().contains("RTPReceiver must not be nil")
}

#[async_trait]
impl KeyframeRequester for RTCPeerConnection {
    async fn request_keyframe(&self, media_ssrc: u32) -> Result<(), webrtc::Error> {
        self.write_rtcp(&[Box::new(PictureLossIndication {
            sender_ssrc: 0,
            media_ssrc,
        })])
        .await
        .map(|_| ())
    }
}

#[async_trait]
impl TelemetryChannel for RTCDataChannel {
    fn describe(&self) -> String {
        format!("{} - {}", self.label(), self.id())
    }

    async fn send_message(&self, text: String) -> Result<(), webrtc::Error> {
        self.send_text(text).await.map(|_| ())
    }

    async fn close_channel(&self) -> Result<(), webrtc::Error> {
        self.close().await
    }
}

#[async_trait]
impl SampleWriter for TrackLocalStaticSample {
    async fn deliver(&self, sample: &Sample) -> Result<(), webrtc::Error> {
        self.write_sample(sample).await
    }
}

#[async_trait]
impl RtpSource for TrackRemote {
    async fn next_packet(&self) -> Result<Packet, webrtc::Error> {
        self.read_rtp().await.map(|(packet, _attributes)| packet)
    }
}
