use crate::relay::RelayConfig;
use axum::extract::ws::Message;
use dashmap::DashMap;
use parley_core::ChannelId;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("relay is full ({capacity} channels connected)")]
    Full { capacity: usize },
}

struct RelayInner {
    channels: DashMap<ChannelId, mpsc::UnboundedSender<Message>>,
    // Serializes the capacity check with the insert.
    admission: Mutex<()>,
    config: RelayConfig,
}

/// The set of live channels and the fan-out between them.
///
/// Frames are never inspected: whatever one channel sends is handed, unchanged,
/// to the outbound queue of every other channel.
#[derive(Clone)]
pub struct RelayService {
    inner: Arc<RelayInner>,
}

impl RelayService {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            inner: Arc::new(RelayInner {
                channels: DashMap::new(),
                admission: Mutex::new(()),
                config,
            }),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.inner.config
    }

    /// Admit a new channel whose outbound frames go to `tx`.
    pub fn on_connect(&self, tx: mpsc::UnboundedSender<Message>) -> Result<ChannelId, RelayError> {
        let _guard = self
            .inner
            .admission
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(capacity) = self.inner.config.max_peers {
            if self.inner.channels.len() >= capacity {
                return Err(RelayError::Full { capacity });
            }
        }

        let channel_id = ChannelId::new();
        self.inner.channels.insert(channel_id, tx);
        Ok(channel_id)
    }

    /// Hand `msg` to every open channel except `sender`. Returns how many
    /// channels accepted it.
    pub fn on_message(&self, sender: &ChannelId, msg: Message) -> usize {
        let receivers: Vec<(ChannelId, mpsc::UnboundedSender<Message>)> = self
            .inner
            .channels
            .iter()
            .filter(|entry| entry.key() != sender)
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        let mut delivered = 0;
        for (channel_id, tx) in receivers {
            if tx.send(msg.clone()).is_err() {
                warn!(
                    "Dropping frame for closed channel {}, removing it",
                    channel_id
                );
                self.inner.channels.remove(&channel_id);
                continue;
            }
            delivered += 1;
        }

        debug!("Relayed frame from {} to {} channel(s)", sender, delivered);
        delivered
    }

    pub fn on_disconnect(&self, channel_id: &ChannelId) -> bool {
        self.inner.channels.remove(channel_id).is_some()
    }

    /// Report a transport failure on one channel. The channel leaves the set;
    /// nothing is sent to the remaining peers.
    pub fn on_error(&self, channel_id: &ChannelId, err: &axum::Error) {
        error!("Transport error on channel {}: {}", channel_id, err);
        self.on_disconnect(channel_id);
    }

    pub fn connected(&self) -> usize {
        self.inner.channels.len()
    }

    pub fn contains(&self, channel_id: &ChannelId) -> bool {
        self.inner.channels.contains_key(channel_id)
    }
}
