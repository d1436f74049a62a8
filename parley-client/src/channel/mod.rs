use crate::config::ChannelConfig;
use crate::error::ChannelError;
use async_trait::async_trait;
use bytes::Bytes;
use parley_core::{ChannelStatus, SignallingMessage};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tracing::info;

mod ws_setup_impl;

/// Where the negotiator sends its outbound messages.
#[async_trait]
pub trait SignallingOutput: Send + Sync + 'static {
    async fn send(&self, msg: SignallingMessage) -> Result<(), ChannelError>;
}

/// A frame received from the relay.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    Signal(SignallingMessage),
    /// Passed through untouched.
    Binary(Bytes),
}

/// Client end of the relay connection.
///
/// The socket lives in a background task that reconnects on unexpected drops.
/// Dropping the channel or calling `close` stops that task for good.
pub struct SignallingChannel {
    outgoing: mpsc::UnboundedSender<Message>,
    status: watch::Receiver<ChannelStatus>,
    shutdown: watch::Sender<bool>,
}

impl SignallingChannel {
    /// Start connecting to `config.url`. Received frames arrive on the
    /// returned receiver across reconnects.
    pub fn connect(config: ChannelConfig) -> (Self, mpsc::UnboundedReceiver<Incoming>) {
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ChannelStatus::Connecting);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(ws_setup_impl::run(
            config,
            outgoing_rx,
            incoming_tx,
            status_tx,
            shutdown_rx,
        ));

        let channel = Self {
            outgoing: outgoing_tx,
            status: status_rx,
            shutdown: shutdown_tx,
        };
        (channel, incoming_rx)
    }

    pub fn status(&self) -> ChannelStatus {
        *self.status.borrow()
    }

    pub fn watch_status(&self) -> watch::Receiver<ChannelStatus> {
        self.status.clone()
    }

    /// Returns false if the channel is not open after `timeout`.
    pub async fn wait_until_open(&self, timeout: Duration) -> bool {
        let mut rx = self.status.clone();
        tokio::time::timeout(timeout, rx.wait_for(|s| *s == ChannelStatus::Open))
            .await
            .is_ok_and(|r| r.is_ok())
    }

    pub fn is_closed_by_caller(&self) -> bool {
        *self.shutdown.borrow()
    }

    fn check_sendable(&self) -> Result<(), ChannelError> {
        if self.is_closed_by_caller() {
            return Err(ChannelError::Closed);
        }
        if self.status() != ChannelStatus::Open {
            return Err(ChannelError::NotOpen);
        }
        Ok(())
    }

    fn enqueue(&self, frame: Message) -> Result<(), ChannelError> {
        self.outgoing.send(frame).map_err(|_| ChannelError::Closed)
    }

    /// Fire and forget. No acknowledgement and no retry.
    pub fn send_signal(&self, msg: &SignallingMessage) -> Result<(), ChannelError> {
        self.check_sendable()?;
        let text = msg.encode()?;
        self.enqueue(Message::text(text))
    }

    pub fn send_binary(&self, data: impl Into<Bytes>) -> Result<(), ChannelError> {
        self.check_sendable()?;
        self.enqueue(Message::Binary(data.into()))
    }

    /// Close with a normal close frame. No reconnect follows.
    pub fn close(&self) {
        if self.shutdown.send_replace(true) {
            return;
        }
        info!("[WebSocket]: closing by request");
    }
}

#[async_trait]
impl SignallingOutput for SignallingChannel {
    async fn send(&self, msg: SignallingMessage) -> Result<(), ChannelError> {
        self.send_signal(&msg)
    }
}
