use crate::error::{MediaError, NegotiationError};
use crate::media::{MediaConstraints, TrackKind};
use crate::negotiation::{CallEvent, Negotiator, within};
use crate::rtc::{PeerConnection, RtcEngine};
use tracing::{debug, info, warn};

impl<E: RtcEngine> Negotiator<E> {
    /// Pause or resume local video. The track stays attached, so no
    /// renegotiation is needed.
    pub(super) fn set_video_enabled(&mut self, enabled: bool) {
        let Some(tracks) = &self.local_media else {
            debug!("[Media]: no local media to {}", if enabled { "resume" } else { "pause" });
            return;
        };

        for track in tracks.iter().filter(|t| t.kind == TrackKind::Video) {
            self.media.set_enabled(track, enabled);
        }
        info!("[Media]: video {}", if enabled { "resumed" } else { "paused" });
    }

    /// Move to the next video input and swap it into the live connection.
    pub(super) async fn switch_camera(&mut self) -> Result<(), NegotiationError> {
        // Only a video track inside an existing local stream is ever swapped.
        if self.local_media.is_none() {
            return Err(MediaError::NotAcquired.into());
        }

        let inputs = self.media.enumerate_video_inputs().await?;
        if inputs.is_empty() {
            return Err(MediaError::NoVideoInput.into());
        }

        self.video_input_index = (self.video_input_index + 1) % inputs.len();
        let input = &inputs[self.video_input_index];
        info!("[Media]: switching camera to {} ({})", input.label, input.device_id);

        let acquired = self
            .media
            .acquire(&MediaConstraints::video_from(input.device_id.clone()))
            .await?;
        let Some(video) = acquired.into_iter().find(|t| t.kind == TrackKind::Video) else {
            return Err(MediaError::NoVideoInput.into());
        };

        let Some(mut tracks) = self.local_media.take() else {
            return Err(MediaError::NotAcquired.into());
        };
        for old in tracks.iter().filter(|t| t.kind == TrackKind::Video) {
            self.media.stop(old);
        }
        tracks.retain(|t| t.kind != TrackKind::Video);
        tracks.push(video.clone());
        self.local_media = Some(tracks.clone());

        if let Some(connection) = self.session.connection() {
            let replaced = within(
                self.config.step_timeout,
                "replace video track",
                connection.replace_video_track(&video),
            )
            .await;
            match replaced {
                Ok(()) => self.session.swap_attached_video(video),
                Err(e) => warn!("[PeerConnection]: could not replace video track: {}", e),
            }
        }

        self.emit(CallEvent::LocalTracks(tracks));
        Ok(())
    }
}
