use crate::error::EngineError;
use crate::media::{LocalTrack, TrackKind};
use crate::rtc::{
    ConnectionEvent, EventSink, IceConnectionState, OfferOptions, PeerConnection, RemoteTrack,
    RtcEngine, SignalingState,
};
use async_trait::async_trait;
use parley_core::{IceCandidate, IceServerConfig, SdpType, SessionDescription};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8, MediaEngine};
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::signaling_state::RTCSignalingState;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_remote::TrackRemote;

/// `RtcEngine` backed by webrtc-rs.
#[derive(Debug, Clone, Default)]
pub struct WebrtcEngine;

impl WebrtcEngine {
    pub fn new() -> Self {
        Self
    }
}

pub struct WebrtcConnection {
    peer_connection: Arc<RTCPeerConnection>,
    local_tracks: Mutex<HashMap<String, Arc<TrackLocalStaticSample>>>,
}

impl WebrtcConnection {
    pub fn peer_connection(&self) -> &Arc<RTCPeerConnection> {
        &self.peer_connection
    }

    /// The sample track feeding `track_id`, for whoever produces the media.
    pub fn sample_track(&self, track_id: &str) -> Option<Arc<TrackLocalStaticSample>> {
        self.local_tracks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(track_id)
            .cloned()
    }

    fn register_handlers(&self, events: EventSink) {
        // A. Trickle ICE: every local candidate goes straight to the negotiator
        let ice_events = events.clone();
        self.peer_connection
            .on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
                let events = ice_events.clone();
                Box::pin(async move {
                    let Some(candidate) = c else { return };
                    let Ok(init) = candidate.to_json() else {
                        return;
                    };
                    events.emit(ConnectionEvent::LocalCandidate(from_rtc_candidate(init)));
                })
            }));

        // B. ICE connection state
        let state_events = events.clone();
        self.peer_connection.on_ice_connection_state_change(Box::new(
            move |s: RTCIceConnectionState| {
                let events = state_events.clone();
                Box::pin(async move {
                    if let Some(state) = map_ice_state(s) {
                        events.emit(ConnectionEvent::IceConnectionStateChanged(state));
                    }
                })
            },
        ));

        // C. Signalling state
        let signaling_events = events.clone();
        self.peer_connection.on_signaling_state_change(Box::new(
            move |s: RTCSignalingState| {
                let events = signaling_events.clone();
                Box::pin(async move {
                    if let Some(state) = map_signaling_state(s) {
                        events.emit(ConnectionEvent::SignalingStateChanged(state));
                    }
                })
            },
        ));

        // D. Remote tracks
        let track_events = events;
        self.peer_connection.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let events = track_events.clone();
                Box::pin(async move {
                    let kind = match track.kind() {
                        RTPCodecType::Audio => TrackKind::Audio,
                        RTPCodecType::Video => TrackKind::Video,
                        _ => return,
                    };
                    events.emit(ConnectionEvent::RemoteTrack(RemoteTrack {
                        id: track.id(),
                        kind,
                        stream_id: track.stream_id(),
                    }));
                })
            },
        ));
    }

    async fn ensure_receiving(&self, kind: RTPCodecType) -> Result<(), EngineError> {
        let transceivers = self.peer_connection.get_transceivers().await;
        if transceivers.iter().any(|t| t.kind() == kind) {
            return Ok(());
        }

        self.peer_connection
            .add_transceiver_from_kind(
                kind,
                Some(RTCRtpTransceiverInit {
                    direction: RTCRtpTransceiverDirection::Recvonly,
                    send_encodings: vec![],
                }),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl RtcEngine for WebrtcEngine {
    type Connection = WebrtcConnection;

    async fn create_connection(
        &self,
        ice_servers: &[IceServerConfig],
        events: EventSink,
    ) -> Result<WebrtcConnection, EngineError> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };

        let generation = events.generation();
        let connection = WebrtcConnection {
            peer_connection: Arc::new(api.new_peer_connection(rtc_config).await?),
            local_tracks: Mutex::new(HashMap::new()),
        };
        connection.register_handlers(events);

        info!("Peer connection #{} created", generation);
        Ok(connection)
    }
}

#[async_trait]
impl PeerConnection for WebrtcConnection {
    async fn add_track(&self, track: &LocalTrack) -> Result<(), EngineError> {
        let sample = sample_track_for(track);
        self.peer_connection
            .add_track(Arc::clone(&sample) as Arc<dyn TrackLocal + Send + Sync>)
            .await?;

        self.local_tracks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(track.id.clone(), sample);
        Ok(())
    }

    async fn create_offer(&self, options: OfferOptions) -> Result<SessionDescription, EngineError> {
        if options.receive_audio {
            self.ensure_receiving(RTPCodecType::Audio).await?;
        }
        if options.receive_video {
            self.ensure_receiving(RTPCodecType::Video).await?;
        }

        let offer = self.peer_connection.create_offer(None).await?;
        from_rtc_description(offer)
    }

    async fn create_answer(&self) -> Result<SessionDescription, EngineError> {
        let answer = self.peer_connection.create_answer(None).await?;
        from_rtc_description(answer)
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), EngineError> {
        let desc = to_rtc_description(desc)?;
        self.peer_connection.set_local_description(desc).await?;
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), EngineError> {
        let desc = to_rtc_description(desc)?;
        self.peer_connection.set_remote_description(desc).await?;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), EngineError> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_m_line_index,
            username_fragment: candidate.username_fragment,
        };
        self.peer_connection.add_ice_candidate(init).await?;
        Ok(())
    }

    async fn replace_video_track(&self, track: &LocalTrack) -> Result<(), EngineError> {
        let sample = sample_track_for(track);

        let mut replaced = false;
        for sender in self.peer_connection.get_senders().await {
            let Some(current) = sender.track().await else {
                continue;
            };
            if current.kind() != RTPCodecType::Video {
                continue;
            }
            sender
                .replace_track(Some(Arc::clone(&sample) as Arc<dyn TrackLocal + Send + Sync>))
                .await?;
            replaced = true;
        }

        if !replaced {
            return Err(EngineError::Other("no video sender to replace".into()));
        }

        let mut local_tracks = self
            .local_tracks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        local_tracks.retain(|_, t| t.kind() != RTPCodecType::Video);
        local_tracks.insert(track.id.clone(), sample);
        Ok(())
    }

    fn detach_handlers(&self) {
        self.peer_connection
            .on_ice_candidate(Box::new(|_| Box::pin(async {})));
        self.peer_connection
            .on_ice_connection_state_change(Box::new(|_| Box::pin(async {})));
        self.peer_connection
            .on_signaling_state_change(Box::new(|_| Box::pin(async {})));
        self.peer_connection
            .on_track(Box::new(|_, _, _| Box::pin(async {})));
        debug!("Peer connection handlers detached");
    }

    async fn stop_transceivers(&self) -> Result<(), EngineError> {
        for transceiver in self.peer_connection.get_transceivers().await {
            transceiver.stop().await?;
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), EngineError> {
        self.peer_connection.close().await?;
        Ok(())
    }
}

fn sample_track_for(track: &LocalTrack) -> Arc<TrackLocalStaticSample> {
    let mime_type = match track.kind {
        TrackKind::Audio => MIME_TYPE_OPUS,
        TrackKind::Video => MIME_TYPE_VP8,
    };
    Arc::new(TrackLocalStaticSample::new(
        RTCRtpCodecCapability {
            mime_type: mime_type.to_owned(),
            ..Default::default()
        },
        track.id.clone(),
        track.stream_id.clone(),
    ))
}

fn from_rtc_candidate(init: RTCIceCandidateInit) -> IceCandidate {
    IceCandidate {
        candidate: init.candidate,
        sdp_mid: init.sdp_mid,
        sdp_m_line_index: init.sdp_mline_index,
        username_fragment: init.username_fragment,
    }
}

fn from_rtc_description(desc: RTCSessionDescription) -> Result<SessionDescription, EngineError> {
    let sdp_type = match desc.sdp_type {
        RTCSdpType::Offer => SdpType::Offer,
        RTCSdpType::Pranswer => SdpType::Pranswer,
        RTCSdpType::Answer => SdpType::Answer,
        RTCSdpType::Rollback => SdpType::Rollback,
        other => {
            return Err(EngineError::InvalidDescription(format!(
                "unsupported sdp type {other}"
            )));
        }
    };
    Ok(SessionDescription {
        sdp_type,
        sdp: desc.sdp,
    })
}

fn to_rtc_description(desc: SessionDescription) -> Result<RTCSessionDescription, EngineError> {
    let rtc = match desc.sdp_type {
        SdpType::Offer => RTCSessionDescription::offer(desc.sdp)?,
        SdpType::Answer => RTCSessionDescription::answer(desc.sdp)?,
        SdpType::Pranswer => RTCSessionDescription::pranswer(desc.sdp)?,
        SdpType::Rollback => {
            return Err(EngineError::InvalidDescription(
                "rollback is not supported".into(),
            ));
        }
    };
    Ok(rtc)
}

fn map_ice_state(state: RTCIceConnectionState) -> Option<IceConnectionState> {
    match state {
        RTCIceConnectionState::New => Some(IceConnectionState::New),
        RTCIceConnectionState::Checking => Some(IceConnectionState::Checking),
        RTCIceConnectionState::Connected => Some(IceConnectionState::Connected),
        RTCIceConnectionState::Completed => Some(IceConnectionState::Completed),
        RTCIceConnectionState::Failed => Some(IceConnectionState::Failed),
        RTCIceConnectionState::Disconnected => Some(IceConnectionState::Disconnected),
        RTCIceConnectionState::Closed => Some(IceConnectionState::Closed),
        _ => None,
    }
}

fn map_signaling_state(state: RTCSignalingState) -> Option<SignalingState> {
    match state {
        RTCSignalingState::Stable => Some(SignalingState::Stable),
        RTCSignalingState::HaveLocalOffer => Some(SignalingState::HaveLocalOffer),
        RTCSignalingState::HaveRemoteOffer => Some(SignalingState::HaveRemoteOffer),
        RTCSignalingState::HaveLocalPranswer => Some(SignalingState::HaveLocalPranswer),
        RTCSignalingState::HaveRemotePranswer => Some(SignalingState::HaveRemotePranswer),
        RTCSignalingState::Closed => Some(SignalingState::Closed),
        _ => None,
    }
}
