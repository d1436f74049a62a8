use crate::error::NegotiationError;
use crate::negotiation::{CallEvent, Negotiator, within};
use crate::rtc::{ConnectionEvent, IceConnectionState, PeerConnection, RtcEngine, SignalingState};
use crate::session::SessionState;
use parley_core::{IceCandidate, SessionDescription, SignallingMessage};
use tracing::{debug, info, warn};

impl<E: RtcEngine> Negotiator<E> {
    pub(super) async fn handle_signal(
        &mut self,
        msg: SignallingMessage,
    ) -> Result<(), NegotiationError> {
        info!("[Signalling]: received {}", msg.kind());

        match msg {
            SignallingMessage::Offer(offer) => self.handle_remote_offer(offer).await,
            SignallingMessage::Answer(answer) => self.handle_answer(answer).await,
            SignallingMessage::IceCandidate(candidate) => {
                self.handle_remote_candidate(candidate).await;
                Ok(())
            }
            SignallingMessage::Hangup => {
                self.teardown("remote hangup").await;
                Ok(())
            }
        }
    }

    async fn handle_answer(&mut self, answer: SessionDescription) -> Result<(), NegotiationError> {
        let state = self.session.state();
        if state != SessionState::Offering {
            warn!("[Call]: ignoring answer while {}", state);
            return Ok(());
        }

        let step_timeout = self.config.step_timeout;
        let applied = match self.session.connection() {
            Some(connection) => {
                within(
                    step_timeout,
                    "set remote description",
                    connection.set_remote_description(answer),
                )
                .await
            }
            None => Err(NegotiationError::NoConnection),
        };

        if let Err(e) = applied {
            self.release_connection().await;
            self.transition(SessionState::Idle)?;
            return Err(e);
        }

        self.session.mark_remote_description_set();
        self.flush_pending_candidates().await;
        self.transition(SessionState::Connected)
    }

    async fn handle_remote_candidate(&mut self, candidate: IceCandidate) {
        if !self.session.has_remote_description() {
            debug!(
                "[PeerConnection]: buffering candidate until remote description: {}",
                candidate.candidate
            );
            if let Some(evicted) = self.session.buffer_candidate(candidate) {
                warn!(
                    "[PeerConnection]: candidate buffer full, dropping oldest: {}",
                    evicted.candidate
                );
            }
            return;
        }
        self.apply_candidate(candidate).await;
    }

    /// A rejected candidate is logged and skipped; the call may still succeed
    /// over the others.
    async fn apply_candidate(&self, candidate: IceCandidate) {
        let Some(connection) = self.session.connection() else {
            return;
        };

        let label = candidate.candidate.clone();
        match within(
            self.config.step_timeout,
            "add ICE candidate",
            connection.add_ice_candidate(candidate),
        )
        .await
        {
            Ok(()) => debug!("[PeerConnection]: added candidate {}", label),
            Err(e) => warn!("[PeerConnection]: error adding ICE candidate {}: {}", label, e),
        }
    }

    pub(super) async fn flush_pending_candidates(&mut self) {
        let pending = self.session.take_pending_candidates();
        if pending.is_empty() {
            return;
        }

        debug!("[PeerConnection]: flushing {} buffered candidate(s)", pending.len());
        for candidate in pending {
            self.apply_candidate(candidate).await;
        }
    }

    pub(super) async fn handle_connection_event(
        &mut self,
        generation: u64,
        event: ConnectionEvent,
    ) -> Result<(), NegotiationError> {
        if !self.session.is_current(generation) {
            debug!(
                "[PeerConnection]: dropping event from stale connection #{}: {:?}",
                generation, event
            );
            return Ok(());
        }

        match event {
            ConnectionEvent::LocalCandidate(candidate) => {
                if let Err(e) = self.send(SignallingMessage::IceCandidate(candidate)).await {
                    warn!("[PeerConnection]: could not send local candidate: {}", e);
                }
                Ok(())
            }
            ConnectionEvent::IceConnectionStateChanged(state) => {
                info!("[PeerConnection]: iceConnectionState {}", state);
                if matches!(
                    state,
                    IceConnectionState::Failed | IceConnectionState::Disconnected
                ) {
                    self.teardown("ICE connection lost").await;
                }
                Ok(())
            }
            ConnectionEvent::SignalingStateChanged(state) => {
                info!("[PeerConnection]: signalingState {}", state);
                if state == SignalingState::Closed {
                    self.teardown("signalling closed").await;
                }
                Ok(())
            }
            ConnectionEvent::RemoteTrack(track) => {
                info!("[PeerConnection]: remote {} track {}", track.kind, track.id);
                let stream = self.session.add_remote_track(track).clone();
                self.emit(CallEvent::RemoteStream(stream));
                Ok(())
            }
        }
    }
}
