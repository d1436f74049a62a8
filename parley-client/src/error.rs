use crate::session::SessionState;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("signalling channel is not open")]
    NotOpen,

    #[error("signalling channel was closed by its owner")]
    Closed,

    #[error("failed to encode signalling message: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Webrtc(#[from] webrtc::Error),

    #[error("invalid session description: {0}")]
    InvalidDescription(String),

    #[error("peer connection is closed")]
    Closed,

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaError {
    #[error("media access denied: {0}")]
    Denied(String),

    #[error("media device unavailable: {0}")]
    Unavailable(String),

    #[error("no video input available")]
    NoVideoInput,

    #[error("local media has not been acquired")]
    NotAcquired,
}

#[derive(Debug, Error)]
pub enum NegotiationError {
    #[error("cannot move session from {from} to {to}")]
    InvalidTransition { from: SessionState, to: SessionState },

    #[error("cannot {action} while session is {state}")]
    InvalidState {
        action: &'static str,
        state: SessionState,
    },

    #[error("{step} failed: {source}")]
    Engine {
        step: &'static str,
        #[source]
        source: EngineError,
    },

    #[error("{step} timed out after {after:?}")]
    Timeout { step: &'static str, after: Duration },

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error("failed to transmit: {0}")]
    Transport(#[from] ChannelError),

    #[error("no peer connection")]
    NoConnection,
}
