use crate::error::NegotiationError;
use crate::negotiation::Negotiator;
use crate::rtc::{EventSink, PeerConnection, RtcEngine};
use tracing::{debug, info};

impl<E: RtcEngine> Negotiator<E> {
    /// Build a fresh peer connection for this session and hook its callbacks
    /// into the event queue under a new generation.
    pub(super) async fn create_pc(&mut self) -> Result<(), NegotiationError> {
        self.next_generation += 1;
        let generation = self.next_generation;
        let events = EventSink::new(generation, self.events_tx.clone());

        let connection = self
            .engine
            .create_connection(&self.config.ice_servers, events)
            .await
            .map_err(|source| NegotiationError::Engine {
                step: "create peer connection",
                source,
            })?;

        self.session.install(generation, connection);
        info!(
            "[PeerConnection]: created #{} with {} ICE server(s)",
            generation,
            self.config.ice_servers.len()
        );
        Ok(())
    }

    /// Attach whatever local tracks exist and are not attached yet. Safe to
    /// call before media or before the connection is ready.
    pub(super) async fn attach_local_tracks(&mut self) -> Result<(), NegotiationError> {
        let Some(tracks) = self.local_media.clone() else {
            debug!("[PeerConnection]: no local media yet, nothing to attach");
            return Ok(());
        };
        if !self.session.has_connection() {
            return Ok(());
        }

        for track in tracks {
            if self.session.is_attached(&track) {
                continue;
            }
            let Some(connection) = self.session.connection() else {
                return Err(NegotiationError::NoConnection);
            };
            connection
                .add_track(&track)
                .await
                .map_err(|source| NegotiationError::Engine {
                    step: "add local track",
                    source,
                })?;
            debug!("[PeerConnection]: attached {} track {}", track.kind, track.id);
            self.session.record_attached(track);
        }
        Ok(())
    }
}
