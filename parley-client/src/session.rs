use crate::error::NegotiationError;
use crate::media::LocalTrack;
use crate::rtc::{RemoteStream, RemoteTrack};
use parley_core::IceCandidate;
use std::collections::VecDeque;
use std::fmt;

/// Upper bound on candidates held while no remote description is set.
pub const MAX_PENDING_CANDIDATES: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    Offering,
    AnsweringPending,
    Connected,
    Closing,
    Closed,
}

impl SessionState {
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;

        matches!(
            (self, next),
            (Idle | Closed, Offering)
                | (Idle | Closed, AnsweringPending)
                | (Offering, Connected)
                | (Offering, Idle)
                | (AnsweringPending, Connected)
                | (Offering | AnsweringPending | Connected, Closing)
                | (Closing, Closed)
        )
    }

    /// A peer connection may exist in these states.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            SessionState::Offering | SessionState::AnsweringPending | SessionState::Connected
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Idle => "idle",
            SessionState::Offering => "offering",
            SessionState::AnsweringPending => "answering-pending",
            SessionState::Connected => "connected",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Everything one client knows about its current call.
///
/// The session owns the peer connection `C` outright. Releasing it resets
/// every field except the state, which the negotiator drives.
pub struct ConnectionSession<C> {
    state: SessionState,
    generation: u64,
    connection: Option<C>,
    local_tracks: Vec<LocalTrack>,
    remote_stream: Option<RemoteStream>,
    pending_candidates: VecDeque<IceCandidate>,
    remote_description_set: bool,
}

impl<C> ConnectionSession<C> {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            generation: 0,
            connection: None,
            local_tracks: Vec::new(),
            remote_stream: None,
            pending_candidates: VecDeque::new(),
            remote_description_set: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Generation of the current peer connection; 0 before the first one.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn connection(&self) -> Option<&C> {
        self.connection.as_ref()
    }

    pub fn has_connection(&self) -> bool {
        self.connection.is_some()
    }

    pub fn local_tracks(&self) -> &[LocalTrack] {
        &self.local_tracks
    }

    pub fn remote_stream(&self) -> Option<&RemoteStream> {
        self.remote_stream.as_ref()
    }

    pub fn pending_candidates(&self) -> impl Iterator<Item = &IceCandidate> {
        self.pending_candidates.iter()
    }

    pub fn has_remote_description(&self) -> bool {
        self.remote_description_set
    }

    pub(crate) fn transition(&mut self, next: SessionState) -> Result<SessionState, NegotiationError> {
        let from = self.state;
        if !from.can_transition_to(next) {
            return Err(NegotiationError::InvalidTransition { from, to: next });
        }
        self.state = next;
        Ok(from)
    }

    pub(crate) fn install(&mut self, generation: u64, connection: C) {
        self.generation = generation;
        self.connection = Some(connection);
    }

    pub(crate) fn take_connection(&mut self) -> Option<C> {
        self.connection.take()
    }

    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.connection.is_some() && self.generation == generation
    }

    pub(crate) fn mark_remote_description_set(&mut self) {
        self.remote_description_set = true;
    }

    /// Queue a candidate until a remote description exists. Once the queue
    /// holds `MAX_PENDING_CANDIDATES`, the oldest one is evicted and returned.
    pub(crate) fn buffer_candidate(&mut self, candidate: IceCandidate) -> Option<IceCandidate> {
        let evicted = if self.pending_candidates.len() >= MAX_PENDING_CANDIDATES {
            self.pending_candidates.pop_front()
        } else {
            None
        };
        self.pending_candidates.push_back(candidate);
        evicted
    }

    pub(crate) fn take_pending_candidates(&mut self) -> Vec<IceCandidate> {
        self.pending_candidates.drain(..).collect()
    }

    pub(crate) fn is_attached(&self, track: &LocalTrack) -> bool {
        self.local_tracks.iter().any(|t| t.id == track.id)
    }

    pub(crate) fn record_attached(&mut self, track: LocalTrack) {
        self.local_tracks.push(track);
    }

    pub(crate) fn swap_attached_video(&mut self, track: LocalTrack) {
        self.local_tracks.retain(|t| t.kind != track.kind);
        self.local_tracks.push(track);
    }

    pub(crate) fn add_remote_track(&mut self, track: RemoteTrack) -> &RemoteStream {
        let stream = self.remote_stream.get_or_insert_with(|| RemoteStream {
            stream_id: track.stream_id.clone(),
            tracks: Vec::new(),
        });
        if !stream.tracks.iter().any(|t| t.id == track.id) {
            stream.tracks.push(track);
        }
        stream
    }

    /// Drop every per-call resource. The connection must already be taken.
    pub(crate) fn reset(&mut self) {
        self.connection = None;
        self.local_tracks.clear();
        self.remote_stream = None;
        self.pending_candidates.clear();
        self.remote_description_set = false;
    }
}

impl<C> Default for ConnectionSession<C> {
    fn default() -> Self {
        Self::new()
    }
}
