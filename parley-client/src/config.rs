use crate::media::MediaConstraints;
use crate::rtc::OfferOptions;
use parley_core::IceServerConfig;
use parley_core::utils::{DEFAULT_RELAY_URL, default_ice_servers};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct NegotiatorConfig {
    /// STUN servers handed to every new peer connection.
    pub ice_servers: Vec<IceServerConfig>,
    pub media_constraints: MediaConstraints,
    pub offer_options: OfferOptions,
    /// Upper bound for each create/apply description step.
    pub step_timeout: Duration,
    /// How long an outbound offer may wait for its answer.
    pub answer_timeout: Duration,
}

impl Default for NegotiatorConfig {
    fn default() -> Self {
        Self {
            ice_servers: default_ice_servers(),
            media_constraints: MediaConstraints::default(),
            offer_options: OfferOptions::default(),
            step_timeout: Duration::from_secs(10),
            answer_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub url: String,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Give up after this many consecutive failed attempts. `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl ChannelConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_RELAY_URL.to_owned(),
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(10),
            max_attempts: None,
        }
    }
}
