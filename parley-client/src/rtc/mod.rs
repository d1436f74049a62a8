mod webrtc_engine;

pub use webrtc_engine::*;

use crate::error::EngineError;
use crate::media::{LocalTrack, TrackKind};
use crate::negotiation::SessionEvent;
use async_trait::async_trait;
use parley_core::{IceCandidate, IceServerConfig, SessionDescription};
use std::fmt;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IceConnectionState {
    New,
    Checking,
    Connected,
    Completed,
    Failed,
    Disconnected,
    Closed,
}

impl fmt::Display for IceConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IceConnectionState::New => "new",
            IceConnectionState::Checking => "checking",
            IceConnectionState::Connected => "connected",
            IceConnectionState::Completed => "completed",
            IceConnectionState::Failed => "failed",
            IceConnectionState::Disconnected => "disconnected",
            IceConnectionState::Closed => "closed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalingState {
    Stable,
    HaveLocalOffer,
    HaveRemoteOffer,
    HaveLocalPranswer,
    HaveRemotePranswer,
    Closed,
}

impl fmt::Display for SignalingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SignalingState::Stable => "stable",
            SignalingState::HaveLocalOffer => "have-local-offer",
            SignalingState::HaveRemoteOffer => "have-remote-offer",
            SignalingState::HaveLocalPranswer => "have-local-pranswer",
            SignalingState::HaveRemotePranswer => "have-remote-pranswer",
            SignalingState::Closed => "closed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrack {
    pub id: String,
    pub kind: TrackKind,
    pub stream_id: String,
}

/// The remote party's stream. The engine owns the media; this is only the
/// handle a renderer attaches to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RemoteStream {
    pub stream_id: String,
    pub tracks: Vec<RemoteTrack>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    LocalCandidate(IceCandidate),
    IceConnectionStateChanged(IceConnectionState),
    SignalingStateChanged(SignalingState),
    RemoteTrack(RemoteTrack),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfferOptions {
    pub receive_audio: bool,
    pub receive_video: bool,
}

impl Default for OfferOptions {
    fn default() -> Self {
        Self {
            receive_audio: true,
            receive_video: true,
        }
    }
}

/// Where a peer connection's callbacks go.
///
/// Every event is tagged with the generation of the connection that raised it,
/// so events from a torn-down connection are recognised as stale.
#[derive(Clone)]
pub struct EventSink {
    generation: u64,
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl EventSink {
    pub(crate) fn new(generation: u64, tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns false once the negotiator is gone.
    pub fn emit(&self, event: ConnectionEvent) -> bool {
        self.tx
            .send(SessionEvent::Connection {
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}

/// One underlying peer connection.
#[async_trait]
pub trait PeerConnection: Send + Sync + 'static {
    async fn add_track(&self, track: &LocalTrack) -> Result<(), EngineError>;

    async fn create_offer(&self, options: OfferOptions) -> Result<SessionDescription, EngineError>;

    async fn create_answer(&self) -> Result<SessionDescription, EngineError>;

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), EngineError>;

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), EngineError>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), EngineError>;

    /// Swap the outgoing video track in place, without renegotiation.
    async fn replace_video_track(&self, track: &LocalTrack) -> Result<(), EngineError>;

    /// Stop delivering callbacks. Called before anything else on teardown.
    fn detach_handlers(&self);

    async fn stop_transceivers(&self) -> Result<(), EngineError>;

    async fn close(&self) -> Result<(), EngineError>;
}

#[async_trait]
pub trait RtcEngine: Send + Sync + 'static {
    type Connection: PeerConnection;

    /// Build a connection whose callbacks are pushed into `events`.
    async fn create_connection(
        &self,
        ice_servers: &[IceServerConfig],
        events: EventSink,
    ) -> Result<Self::Connection, EngineError>;
}
