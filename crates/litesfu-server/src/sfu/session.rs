//! Session manager
//!
//! Negotiates one peer connection per signaling request and owns every task
//! spawned on its behalf. Publisher sessions feed the broadcast track, client
//! sessions read from it and receive the telemetry feed.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use anyhow::anyhow;
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use litesfu_media::codec;
use litesfu_media::reassembly::{DEFAULT_MAX_LATE, SampleBuilder};
use litesfu_protocol::Role;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::{API, APIBuilder};
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_remote::TrackRemote;

use super::broadcast::{BroadcastTrack, BroadcastWriter, DeliveryEnd, deliver_to_viewer};
use super::keyframe::{KEYFRAME_INTERVAL, run_keyframe_loop};
use super::pipeline::{PipelineEnd, run_publisher_pipeline};
use super::telemetry::{
    ChannelEvent, TELEMETRY_INTERVAL, TelemetryChannel, TelemetryReport, run_telemetry,
};
use crate::error::{AppError, Result};
use crate::transport;

/// Upper bound on ICE gathering before the answer is returned as is
const ICE_GATHER_TIMEOUT: Duration = Duration::from_secs(5);

/// Where a session is in the signaling exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    Received,
    RoleResolved,
    RemoteSet,
    AnswerReady,
    Active,
    Closed,
    /// Malformed request or unknown role; never gets a peer connection
    Rejected,
}

impl NegotiationState {
    /// Whether `next` is a legal successor of `self`
    pub fn can_advance_to(self, next: NegotiationState) -> bool {
        use NegotiationState::*;
        matches!(
            (self, next),
            (Received, RoleResolved)
                | (Received, Rejected)
                | (RoleResolved, RemoteSet)
                | (RemoteSet, AnswerReady)
                | (AnswerReady, Active)
                | (Received | RoleResolved | RemoteSet | AnswerReady | Active, Closed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, NegotiationState::Closed | NegotiationState::Rejected)
    }
}

/// One negotiated peer connection
pub struct Session {
    id: Uuid,
    role: Role,
    label: Option<String>,
    peer_connection: Arc<RTCPeerConnection>,
    state: RwLock<NegotiationState>,
    /// Cancels every task spawned for this session
    cancel: CancellationToken,
}

impl Session {
    fn new(role: Role, label: Option<String>, peer_connection: Arc<RTCPeerConnection>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            label,
            peer_connection,
            state: RwLock::new(NegotiationState::Received),
            cancel: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn peer_connection(&self) -> &Arc<RTCPeerConnection> {
        &self.peer_connection
    }

    pub async fn state(&self) -> NegotiationState {
        *self.state.read().await
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Move to `next`; illegal transitions are logged and ignored
    async fn advance(&self, next: NegotiationState) -> bool {
        let mut state = self.state.write().await;
        if !state.can_advance_to(next) {
            tracing::warn!("{} cannot move from {:?} to {:?}", self, *state, next);
            return false;
        }
        tracing::debug!("{} {:?} -> {:?}", self, *state, next);
        *state = next;
        true
    }

    /// Like [`advance`](Self::advance), but a refused step aborts the negotiation
    async fn advance_or_abort(&self, next: NegotiationState) -> Result<()> {
        if self.advance(next).await {
            Ok(())
        } else {
            Err(AppError::Internal(anyhow!("{} was closed during negotiation", self)))
        }
    }

    /// Close the session. Cancels every owned task; safe to call more than once.
    pub async fn close(&self) {
        if !self.advance(NegotiationState::Closed).await {
            return;
        }
        self.cancel.cancel();

        if let Err(e) = self.peer_connection.close().await {
            tracing::warn!("Error closing peer connection for {}: {}", self, e);
        }
        tracing::info!("{} closed", self);
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(f, "{} session {} ({})", self.role, self.id, label),
            None => write!(f, "{} session {}", self.role, self.id),
        }
    }
}

/// Process-wide session manager
pub struct SessionManager {
    /// WebRTC API shared by every peer connection
    api: Arc<API>,
    ice_servers: Vec<RTCIceServer>,
    /// The one broadcast track, created at startup
    track: Arc<BroadcastTrack>,
    sessions: RwLock<HashMap<Uuid, Arc<Session>>>,
}

impl SessionManager {
    pub fn new(stun_servers: &[String]) -> anyhow::Result<Self> {
        let mut media_engine = MediaEngine::default();
        codec::register_video_codec(&mut media_engine)?;

        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let track = Arc::new(BroadcastTrack::new(codec::vp8_capability(), rand::random()));
        tracing::info!(
            "Broadcast track {} ready ({})",
            track.stream_id(),
            track.capability().mime_type
        );

        Ok(Self {
            api: Arc::new(api),
            ice_servers: transport::ice_servers(stun_servers),
            track,
            sessions: RwLock::new(HashMap::new()),
        })
    }

    pub fn broadcast_track(&self) -> &Arc<BroadcastTrack> {
        &self.track
    }

    pub async fn get_session(&self, id: Uuid) -> Option<Arc<Session>> {
        self.sessions.read().await.get(&id).cloned()
    }

    pub async fn sessions(&self) -> Vec<Arc<Session>> {
        self.sessions.read().await.values().cloned().collect()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Negotiate a session for `role` from a remote offer and return the answer.
    ///
    /// On any failure the half-built peer connection is closed and the session
    /// is forgotten.
    pub async fn negotiate(
        self: &Arc<Self>,
        role: Role,
        label: Option<String>,
        offer_sdp: String,
    ) -> Result<(Arc<Session>, RTCSessionDescription)> {
        let config = RTCConfiguration {
            ice_servers: self.ice_servers.clone(),
            ..Default::default()
        };
        let peer_connection = Arc::new(
            self.api
                .new_peer_connection(config)
                .await
                .map_err(|e| AppError::transport("Unable to create peer connection", e))?,
        );

        let (session, pending) = self.register(role, label, peer_connection).await;

        let outcome = match self.establish(&session, offer_sdp).await {
            Ok(answer) => session
                .advance_or_abort(NegotiationState::Active)
                .await
                .map(|_| answer),
            Err(e) => Err(e),
        };
        pending.disarm();

        match outcome {
            Ok(answer) => {
                tracing::info!("{} active", session);
                Ok((session, answer))
            }
            Err(e) => {
                self.close_session(session.id).await;
                Err(e)
            }
        }
    }

    /// Track a new session from the moment its peer connection exists, so a
    /// transport failure always finds it. The returned guard closes it again
    /// if negotiation is abandoned before finishing.
    async fn register(
        self: &Arc<Self>,
        role: Role,
        label: Option<String>,
        peer_connection: Arc<RTCPeerConnection>,
    ) -> (Arc<Session>, PendingSession) {
        let session = Arc::new(Session::new(role, label, peer_connection));
        tracing::info!("Negotiating {}", session);

        self.sessions
            .write()
            .await
            .insert(session.id, session.clone());

        let pending = PendingSession {
            manager: Arc::downgrade(self),
            id: session.id,
            armed: true,
        };
        (session, pending)
    }

    async fn establish(
        self: &Arc<Self>,
        session: &Arc<Session>,
        offer_sdp: String,
    ) -> Result<RTCSessionDescription> {
        self.watch_connection_state(session);

        match session.role {
            Role::Publisher => self.prepare_publisher(session).await?,
            Role::Client => self.prepare_client(session).await?,
        }
        session.advance_or_abort(NegotiationState::RoleResolved).await?;

        let pc = &session.peer_connection;
        let offer = RTCSessionDescription::offer(offer_sdp)
            .map_err(|e| AppError::transport("Unable to parse offer", e))?;
        pc.set_remote_description(offer)
            .await
            .map_err(|e| AppError::transport("Unable to set remote description", e))?;
        session.advance_or_abort(NegotiationState::RemoteSet).await?;

        let answer = pc
            .create_answer(None)
            .await
            .map_err(|e| AppError::transport("Unable to create answer", e))?;

        let mut gather_complete = pc.gathering_complete_promise().await;
        pc.set_local_description(answer)
            .await
            .map_err(|e| AppError::transport("Unable to set local description", e))?;

        if tokio::time::timeout(ICE_GATHER_TIMEOUT, gather_complete.recv())
            .await
            .is_err()
        {
            tracing::warn!(
                "ICE gathering for {} timed out, answering with partial candidates",
                session
            );
        }

        let local = pc
            .local_description()
            .await
            .ok_or_else(|| AppError::Internal(anyhow!("no local description after answer")))?;
        session.advance_or_abort(NegotiationState::AnswerReady).await?;

        Ok(local)
    }

    /// Close the session when the transport reports the connection gone
    fn watch_connection_state(self: &Arc<Self>, session: &Arc<Session>) {
        let manager = Arc::downgrade(self);
        let id = session.id;

        session
            .peer_connection
            .on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
                tracing::info!("Session {} connection state: {}", id, state);

                if matches!(
                    state,
                    RTCPeerConnectionState::Failed | RTCPeerConnectionState::Closed
                ) {
                    if let Some(manager) = manager.upgrade() {
                        // Closing from inside the callback would wait on this handler
                        tokio::spawn(async move { manager.close_session(id).await });
                    }
                }
                Box::pin(async {})
            }));
    }

    /// Reserve the inbound video slot and start relaying once the track arrives
    async fn prepare_publisher(self: &Arc<Self>, session: &Arc<Session>) -> Result<()> {
        session
            .peer_connection
            .add_transceiver_from_kind(RTPCodecType::Video, None)
            .await
            .map_err(|e| AppError::transport("Unable to add video transceiver", e))?;

        let manager = Arc::downgrade(self);
        let weak_session = Arc::downgrade(session);

        session
            .peer_connection
            .on_track(Box::new(move |track, _receiver, _transceiver| {
                let manager = manager.clone();
                let session = weak_session.clone();

                Box::pin(async move {
                    if let (Some(manager), Some(session)) = (manager.upgrade(), session.upgrade()) {
                        manager.start_publishing(session, track).await;
                    }
                })
            }));

        Ok(())
    }

    async fn start_publishing(self: &Arc<Self>, session: Arc<Session>, track: Arc<TrackRemote>) {
        if track.kind() != RTPCodecType::Video {
            tracing::warn!("{} sent a {} track, ignoring", session, track.kind());
            return;
        }
        if session.is_closed() {
            return;
        }

        let media_ssrc = track.ssrc();
        tracing::info!(
            "{} publishing track {} (SSRC {}, {})",
            session,
            track.id(),
            media_ssrc,
            track.codec().capability.mime_type
        );

        let builder = match SampleBuilder::new(
            DEFAULT_MAX_LATE,
            codec::VIDEO_CLOCK_RATE,
            codec::depacketizer(),
        ) {
            Ok(builder) => builder,
            Err(e) => {
                tracing::error!("Unable to create sample builder for {}: {}", session, e);
                self.close_session(session.id).await;
                return;
            }
        };

        let writer = self.take_over_broadcast(&session).await;

        // Keyframe refresh
        {
            let pc = session.peer_connection.clone();
            let cancel = session.cancel.clone();
            tokio::spawn(async move {
                let sent = run_keyframe_loop(&*pc, media_ssrc, KEYFRAME_INTERVAL, &cancel).await;
                tracing::debug!("Keyframe loop for SSRC {} sent {} requests", media_ssrc, sent);
            });
        }

        let manager = Arc::downgrade(self);
        let cancel = session.cancel.clone();
        let id = session.id;
        tokio::spawn(async move {
            let (end, _stats) = run_publisher_pipeline(&*track, builder, &writer, &cancel).await;
            writer.release();

            match end {
                PipelineEnd::Cancelled | PipelineEnd::Evicted => {}
                PipelineEnd::StreamEnded => {
                    if let Some(manager) = manager.upgrade() {
                        manager.close_session(id).await;
                    }
                }
                PipelineEnd::Failed(e) => {
                    tracing::error!("Reading from publisher session {} failed: {}", id, e);
                    if let Some(manager) = manager.upgrade() {
                        manager.close_session(id).await;
                    }
                }
            }
        });
    }

    /// Make `session` the broadcast track's writer, closing whichever publisher
    /// held it before
    async fn take_over_broadcast(&self, session: &Session) -> BroadcastWriter {
        let (writer, previous) = self.track.claim_writer(session.id);
        if let Some(previous) = previous {
            tracing::info!("{} replaces publisher session {}", session, previous);
            self.close_session(previous).await;
        }
        writer
    }

    /// Attach a viewer track fed by the broadcast track and arm the telemetry feed
    async fn prepare_client(self: &Arc<Self>, session: &Arc<Session>) -> Result<()> {
        let local_track = Arc::new(TrackLocalStaticSample::new(
            self.track.capability().clone(),
            self.track.track_id(),
            self.track.stream_id(),
        ));

        let rtp_sender = session
            .peer_connection
            .add_track(Arc::clone(&local_track) as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .map_err(|e| AppError::transport("Unable to add local track to peer connection", e))?;

        // Read incoming RTCP so interceptors (NACK, reports) keep working
        tokio::spawn(async move {
            let mut rtcp_buf = vec![0u8; 1500];
            while let Ok((_, _)) = rtp_sender.read(&mut rtcp_buf).await {}
        });

        let receiver = self.track.subscribe();
        let manager = Arc::downgrade(self);
        let cancel = session.cancel.clone();
        let id = session.id;
        tokio::spawn(async move {
            match deliver_to_viewer(receiver, &*local_track, &cancel).await {
                DeliveryEnd::Failed(e) => {
                    tracing::error!("Writing to client session {} failed: {}", id, e);
                    if let Some(manager) = manager.upgrade() {
                        manager.close_session(id).await;
                    }
                }
                end => tracing::debug!("Delivery to client session {} ended: {:?}", id, end),
            }
        });

        let cancel = session.cancel.clone();
        session
            .peer_connection
            .on_data_channel(Box::new(move |channel: Arc<RTCDataChannel>| {
                let cancel = cancel.clone();
                Box::pin(async move {
                    spawn_telemetry(channel, cancel);
                })
            }));

        Ok(())
    }

    /// Remove and close a session; unknown ids are ignored
    pub async fn close_session(&self, id: Uuid) {
        let session = self.sessions.write().await.remove(&id);
        if let Some(session) = session {
            session.close().await;
            tracing::info!("{} sessions remaining", self.session_count().await);
        }
    }

    pub async fn close_all(&self) {
        let sessions: Vec<_> = self.sessions.write().await.drain().map(|(_, s)| s).collect();
        for session in sessions {
            session.close().await;
        }
    }
}

/// Closes a session whose negotiation never finished
struct PendingSession {
    manager: Weak<SessionManager>,
    id: Uuid,
    armed: bool,
}

impl PendingSession {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingSession {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Some(manager) = self.manager.upgrade() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let id = self.id;
        tracing::warn!("Negotiation for session {} abandoned", id);
        runtime.spawn(async move { manager.close_session(id).await });
    }
}

/// Bridge the channel's open/close callbacks into an event queue and run the
/// telemetry loop on it
fn spawn_telemetry(channel: Arc<RTCDataChannel>, cancel: CancellationToken) {
    let (events, receiver) = mpsc::unbounded_channel();

    let on_open = events.clone();
    channel.on_open(Box::new(move || {
        let _ = on_open.send(ChannelEvent::Open);
        Box::pin(async {})
    }));
    channel.on_close(Box::new(move || {
        let _ = events.send(ChannelEvent::Closed);
        Box::pin(async {})
    }));

    spawn_telemetry_loop(channel, receiver, TELEMETRY_INTERVAL, cancel);
}

fn spawn_telemetry_loop<C>(
    channel: Arc<C>,
    events: mpsc::UnboundedReceiver<ChannelEvent>,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<TelemetryReport>
where
    C: TelemetryChannel + ?Sized + 'static,
{
    tokio::spawn(async move {
        let report = run_telemetry(&*channel, events, period, &cancel).await;
        tracing::debug!("Telemetry on {} ended: {:?}", channel.describe(), report);
        report
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use NegotiationState::*;
    use async_trait::async_trait;
    use tokio::time::{sleep, timeout};
    use webrtc::media::Sample;

    use crate::sfu::broadcast::BroadcastError;

    fn manager_without_ice() -> anyhow::Result<Arc<SessionManager>> {
        SessionManager::new(&[]).map(Arc::new)
    }

    /// Register a session with a fresh, unnegotiated peer connection
    async fn registered(
        manager: &Arc<SessionManager>,
        role: Role,
    ) -> (Arc<Session>, PendingSession) {
        let peer_connection = Arc::new(
            manager
                .api
                .new_peer_connection(RTCConfiguration::default())
                .await
                .unwrap(),
        );
        manager.register(role, None, peer_connection).await
    }

    async fn wait_until_empty(manager: &SessionManager) {
        timeout(Duration::from_secs(2), async {
            while manager.session_count().await > 0
                || manager.broadcast_track().subscriber_count() > 0
            {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    #[derive(Default)]
    struct RecordingChannel {
        sent: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TelemetryChannel for RecordingChannel {
        fn describe(&self) -> String {
            "recording - 0".to_string()
        }

        async fn send_message(&self, text: String) -> std::result::Result<(), webrtc::Error> {
            self.sent.lock().unwrap().push(text);
            Ok(())
        }

        async fn close_channel(&self) -> std::result::Result<(), webrtc::Error> {
            Ok(())
        }
    }

    #[test]
    fn signaling_transitions() {
        let happy = [Received, RoleResolved, RemoteSet, AnswerReady, Active, Closed];
        for pair in happy.windows(2) {
            assert!(pair[0].can_advance_to(pair[1]), "{:?} -> {:?}", pair[0], pair[1]);
        }

        assert!(Received.can_advance_to(Rejected));
        assert!(!RoleResolved.can_advance_to(Rejected));
        assert!(!Received.can_advance_to(Active));
        assert!(!Closed.can_advance_to(Active));
        assert!(!Closed.can_advance_to(Closed));
        assert!(Closed.is_terminal() && Rejected.is_terminal());
        assert!(!Active.is_terminal());
    }

    #[tokio::test]
    async fn manager_starts_empty_with_a_random_track_identity() {
        let a = manager_without_ice().unwrap();
        let b = manager_without_ice().unwrap();

        assert_eq!(a.session_count().await, 0);
        assert_eq!(a.broadcast_track().subscriber_count(), 0);
        assert!(a.broadcast_track().writer().is_none());
        assert_eq!(
            a.broadcast_track().capability().mime_type,
            webrtc::api::media_engine::MIME_TYPE_VP8
        );
        // Identity is per process; two managers practically never collide
        assert_ne!(a.broadcast_track().ssrc(), b.broadcast_track().ssrc());
    }

    #[tokio::test]
    async fn garbage_offer_fails_and_leaves_nothing_behind() {
        let manager = manager_without_ice().unwrap();

        let result = manager
            .negotiate(Role::Client, Some("bob".into()), "not an sdp".into())
            .await;

        assert!(matches!(result, Err(AppError::Transport { .. })));
        assert_eq!(manager.session_count().await, 0);

        // The viewer's delivery task unsubscribes once it observes the cancellation
        tokio::time::timeout(Duration::from_secs(1), async {
            while manager.broadcast_track().subscriber_count() > 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn abandoned_negotiation_is_cleaned_up() {
        let manager = manager_without_ice().unwrap();
        let (session, pending) = registered(&manager, Role::Client).await;
        manager.prepare_client(&session).await.unwrap();

        assert_eq!(session.state().await, Received);
        assert_eq!(manager.session_count().await, 1);
        assert_eq!(manager.broadcast_track().subscriber_count(), 1);

        // The request went away before an answer was produced
        drop(pending);

        wait_until_empty(&manager).await;
        assert!(session.is_closed());
        assert_eq!(session.state().await, Closed);
    }

    #[tokio::test]
    async fn abandoned_negotiate_call_leaves_nothing_behind() {
        let manager = manager_without_ice().unwrap();

        // Drop the negotiation at whatever point it has reached after a few polls
        let negotiation = manager.negotiate(Role::Client, None, "v=0\r\n".into());
        tokio::pin!(negotiation);
        for _ in 0..3 {
            tokio::select! {
                biased;
                _ = &mut negotiation => break,
                _ = tokio::task::yield_now() => {}
            }
        }
        drop(negotiation);

        wait_until_empty(&manager).await;
    }

    #[tokio::test]
    async fn closed_session_cannot_finish_negotiating() {
        let manager = manager_without_ice().unwrap();
        let (session, pending) = registered(&manager, Role::Publisher).await;
        pending.disarm();

        manager.close_session(session.id()).await;

        let result = session.advance_or_abort(RoleResolved).await;
        assert!(matches!(result, Err(AppError::Internal(_))));
        assert_eq!(session.state().await, Closed);
    }

    #[tokio::test]
    async fn new_publisher_evicts_the_previous_one() {
        let manager = manager_without_ice().unwrap();
        let (first, pending) = registered(&manager, Role::Publisher).await;
        pending.disarm();
        let (second, pending) = registered(&manager, Role::Publisher).await;
        pending.disarm();

        let first_writer = manager.take_over_broadcast(&first).await;
        assert_eq!(manager.broadcast_track().writer(), Some(first.id()));

        let _second_writer = manager.take_over_broadcast(&second).await;
        assert_eq!(manager.broadcast_track().writer(), Some(second.id()));

        assert!(first.is_closed());
        assert_eq!(first.state().await, Closed);
        assert!(manager.get_session(first.id()).await.is_none());
        assert!(!second.is_closed());
        assert!(manager.get_session(second.id()).await.is_some());
        assert!(matches!(
            first_writer.write(Sample::default()),
            Err(BroadcastError::Evicted)
        ));

        manager.close_all().await;
    }

    #[tokio::test]
    async fn telemetry_stops_when_its_session_closes() {
        let manager = manager_without_ice().unwrap();
        let (session, pending) = registered(&manager, Role::Client).await;
        pending.disarm();

        let channel = Arc::new(RecordingChannel::default());
        let (events, receiver) = mpsc::unbounded_channel();
        let handle = spawn_telemetry_loop(
            channel.clone(),
            receiver,
            Duration::from_millis(20),
            session.cancel.clone(),
        );
        events.send(ChannelEvent::Open).unwrap();

        timeout(Duration::from_secs(2), async {
            while channel.sent.lock().unwrap().is_empty() {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        manager.close_session(session.id()).await;
        let report = timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();
        assert_eq!(report.end, crate::sfu::telemetry::TelemetryEnd::Cancelled);
        assert!(report.sent >= 1);

        let message: litesfu_protocol::TelemetryMessage =
            serde_json::from_str(&channel.sent.lock().unwrap()[0]).unwrap();
        assert_eq!(message.height, 100);
    }

    #[tokio::test]
    async fn closing_unknown_session_is_a_no_op() {
        let manager = manager_without_ice().unwrap();
        manager.close_session(Uuid::new_v4()).await;
        manager.close_all().await;
        assert_eq!(manager.session_count().await, 0);
    }
}
