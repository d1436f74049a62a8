use crate::error::{MediaError, NegotiationError};
use crate::media::LocalTrack;
use crate::negotiation::{CallEvent, Negotiator, SessionEvent, within};
use crate::rtc::{PeerConnection, RtcEngine};
use crate::session::SessionState;
use parley_core::{SessionDescription, SignallingMessage};
use tracing::{debug, info, warn};

impl<E: RtcEngine> Negotiator<E> {
    pub(super) async fn handle_remote_offer(
        &mut self,
        offer: SessionDescription,
    ) -> Result<(), NegotiationError> {
        let state = self.session.state();
        if !matches!(state, SessionState::Idle | SessionState::Closed) {
            warn!("[Call]: ignoring offer while {}", state);
            return Ok(());
        }

        self.transition(SessionState::AnsweringPending)?;

        if let Err(e) = self.answer_offer(offer).await {
            warn!("[Call]: answering failed: {}", e);
            self.teardown("answer failed").await;
            return Err(e);
        }
        Ok(())
    }

    async fn answer_offer(&mut self, offer: SessionDescription) -> Result<(), NegotiationError> {
        if !self.session.has_connection() {
            self.create_pc().await?;
        }
        if self.local_media.is_none() {
            self.request_media();
        }

        let step_timeout = self.config.step_timeout;
        {
            let connection = self
                .session
                .connection()
                .ok_or(NegotiationError::NoConnection)?;
            within(
                step_timeout,
                "set remote description",
                connection.set_remote_description(offer),
            )
            .await?;
        }
        self.session.mark_remote_description_set();
        self.flush_pending_candidates().await;

        self.attach_local_tracks().await?;

        let connection = self
            .session
            .connection()
            .ok_or(NegotiationError::NoConnection)?;
        let answer = within(step_timeout, "create answer", connection.create_answer()).await?;
        within(
            step_timeout,
            "set local description",
            connection.set_local_description(answer.clone()),
        )
        .await?;

        self.send(SignallingMessage::Answer(answer)).await?;
        self.transition(SessionState::Connected)
    }

    /// Ask for local media without blocking the queue. The result comes back
    /// as `SessionEvent::MediaAcquired`.
    fn request_media(&mut self) {
        if self.media_requested {
            return;
        }
        self.media_requested = true;

        let media = self.media.clone();
        let constraints = self.config.media_constraints.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = media.acquire(&constraints).await;
            let _ = tx.send(SessionEvent::MediaAcquired(result));
        });
    }

    pub(super) async fn on_media_acquired(
        &mut self,
        result: Result<Vec<LocalTrack>, MediaError>,
    ) -> Result<(), NegotiationError> {
        self.media_requested = false;

        // An outbound call acquired media inline while this request was in
        // flight. Keep that set and release this one.
        if self.local_media.is_some() {
            match result {
                Ok(tracks) => {
                    info!("[Media]: releasing {} superseded track(s)", tracks.len());
                    for track in &tracks {
                        self.media.stop(track);
                    }
                }
                Err(e) => debug!("[Media]: ignoring superseded acquisition failure: {}", e),
            }
            return Ok(());
        }

        match result {
            Ok(tracks) => {
                info!("[Media]: acquired {} local track(s)", tracks.len());
                self.emit(CallEvent::LocalTracks(tracks.clone()));
                self.local_media = Some(tracks);

                // Connection first, media second: attach now.
                if let Err(e) = self.attach_local_tracks().await {
                    self.teardown("attach failed").await;
                    return Err(e);
                }
                Ok(())
            }
            Err(e) => {
                self.teardown("media unavailable").await;
                Err(e.into())
            }
        }
    }
}
