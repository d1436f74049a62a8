use crate::error::NegotiationError;
use crate::negotiation::Negotiator;
use crate::rtc::{PeerConnection, RtcEngine};
use crate::session::SessionState;
use parley_core::SignallingMessage;
use tracing::{debug, info, warn};

impl<E: RtcEngine> Negotiator<E> {
    /// Local hangup: tell the peer, then tear down. A remote hangup goes
    /// straight to `teardown` and is never answered with another hangup.
    pub(super) async fn hangup(&mut self) -> Result<(), NegotiationError> {
        let state = self.session.state();
        if !state.is_active() {
            debug!("[Call]: hangup while {}, nothing to do", state);
            return Ok(());
        }

        if self.session.has_connection() {
            if let Err(e) = self.send(SignallingMessage::Hangup).await {
                warn!("[Call]: could not notify peer of hangup: {}", e);
            }
        }

        self.teardown("local hangup").await;
        Ok(())
    }

    /// Close the current session. Safe to call any number of times.
    pub(super) async fn teardown(&mut self, reason: &str) {
        let state = self.session.state();
        if !state.is_active() && !self.session.has_connection() {
            debug!("[Call]: teardown ({}) while {}, nothing to do", reason, state);
            return;
        }

        info!("[Call]: tearing down ({})", reason);

        if state.is_active() {
            if let Err(e) = self.transition(SessionState::Closing) {
                warn!("[Call]: {}", e);
            }
        }

        self.release_connection().await;

        if self.session.state() == SessionState::Closing {
            if let Err(e) = self.transition(SessionState::Closed) {
                warn!("[Call]: {}", e);
            }
        }
    }

    /// Detach callbacks first, then stop and close. Errors are logged and
    /// release always completes.
    pub(super) async fn release_connection(&mut self) {
        if let Some(connection) = self.session.take_connection() {
            connection.detach_handlers();

            if let Err(e) = connection.stop_transceivers().await {
                warn!("[PeerConnection]: error stopping transceivers: {}", e);
            }
            if let Err(e) = connection.close().await {
                warn!("[PeerConnection]: error closing connection: {}", e);
            }
            debug!("[PeerConnection]: released #{}", self.session.generation());
        }

        self.session.reset();
    }
}
