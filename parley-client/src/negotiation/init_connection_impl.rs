use crate::error::NegotiationError;
use crate::negotiation::{CallEvent, Negotiator, SessionEvent, within};
use crate::rtc::{PeerConnection, RtcEngine};
use crate::session::SessionState;
use parley_core::SignallingMessage;
use tracing::{info, warn};

impl<E: RtcEngine> Negotiator<E> {
    pub(super) async fn start_call(&mut self) -> Result<(), NegotiationError> {
        let state = self.session.state();
        if !matches!(state, SessionState::Idle | SessionState::Closed) {
            return Err(NegotiationError::InvalidState {
                action: "call",
                state,
            });
        }

        self.transition(SessionState::Offering)?;

        if let Err(e) = self.init_connection().await {
            warn!("[Call]: offer attempt failed: {}", e);
            self.abort_offer().await;
            return Err(e);
        }

        self.arm_answer_deadline();
        Ok(())
    }

    async fn init_connection(&mut self) -> Result<(), NegotiationError> {
        self.ensure_local_media().await?;
        self.create_pc().await?;
        self.attach_local_tracks().await?;

        let step_timeout = self.config.step_timeout;
        let options = self.config.offer_options;
        let connection = self
            .session
            .connection()
            .ok_or(NegotiationError::NoConnection)?;

        let offer = within(step_timeout, "create offer", connection.create_offer(options)).await?;
        within(
            step_timeout,
            "set local description",
            connection.set_local_description(offer.clone()),
        )
        .await?;

        self.send(SignallingMessage::Offer(offer)).await
    }

    /// Acquire local media inline if the outbound call does not have it yet.
    async fn ensure_local_media(&mut self) -> Result<(), NegotiationError> {
        if self.local_media.is_some() {
            return Ok(());
        }

        let tracks = self
            .media
            .acquire(&self.config.media_constraints)
            .await?;
        info!("[Media]: acquired {} local track(s)", tracks.len());
        self.emit(CallEvent::LocalTracks(tracks.clone()));
        self.local_media = Some(tracks);
        Ok(())
    }

    /// Release everything the failed attempt created and go back to `Idle`.
    async fn abort_offer(&mut self) {
        self.release_connection().await;
        if let Err(e) = self.transition(SessionState::Idle) {
            warn!("[Call]: could not return to idle: {}", e);
        }
    }

    fn arm_answer_deadline(&self) {
        let generation = self.session.generation();
        let after = self.config.answer_timeout;
        let tx = self.events_tx.clone();

        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = tx.send(SessionEvent::AnswerDeadline { generation });
        });
    }

    pub(super) async fn on_answer_deadline(
        &mut self,
        generation: u64,
    ) -> Result<(), NegotiationError> {
        if !self.session.is_current(generation) || self.session.state() != SessionState::Offering {
            return Ok(());
        }

        warn!("[Call]: no answer within {:?}", self.config.answer_timeout);
        self.teardown("answer timeout").await;
        Err(NegotiationError::Timeout {
            step: "wait for answer",
            after: self.config.answer_timeout,
        })
    }
}
