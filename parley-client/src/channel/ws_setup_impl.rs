use crate::channel::Incoming;
use crate::config::ChannelConfig;
use futures::{SinkExt, StreamExt};
use parley_core::{ChannelStatus, DecodeError, SignallingMessage};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, warn};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Doubling delay between reconnect attempts, capped at `max`.
#[derive(Debug, Clone)]
pub(crate) struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub(crate) fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    pub(crate) fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub(crate) fn reset(&mut self) {
        self.current = self.initial;
    }
}

enum PumpExit {
    /// The owner asked us to stop.
    Closed,
    /// The socket went away underneath us.
    Dropped,
}

/// Connection supervisor. Runs until the owner closes or drops the channel,
/// or until `max_attempts` consecutive attempts have failed.
pub(super) async fn run(
    config: ChannelConfig,
    mut outgoing: mpsc::UnboundedReceiver<Message>,
    incoming: mpsc::UnboundedSender<Incoming>,
    status: watch::Sender<ChannelStatus>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut backoff = Backoff::new(config.initial_backoff, config.max_backoff);
    let mut failures: u32 = 0;

    loop {
        if *shutdown.borrow() {
            break;
        }

        status.send_replace(ChannelStatus::Connecting);
        debug!("[WebSocket]: connecting to {}", config.url);

        let attempt = tokio::select! {
            attempt = connect_async(config.url.as_str()) => attempt,
            _ = shutdown.changed() => break,
        };

        match attempt {
            Ok((socket, _)) => {
                backoff.reset();
                failures = 0;

                // Nothing queued against the old socket survives a reconnect.
                while outgoing.try_recv().is_ok() {}

                status.send_replace(ChannelStatus::Open);
                info!("[WebSocket]: open {}", config.url);

                match pump(socket, &mut outgoing, &incoming, &mut shutdown).await {
                    PumpExit::Closed => break,
                    PumpExit::Dropped => warn!("[WebSocket]: connection to {} dropped", config.url),
                }
            }
            Err(e) => {
                failures += 1;
                warn!("[WebSocket]: connect to {} failed: {}", config.url, e);
            }
        }

        status.send_replace(ChannelStatus::Closed);

        if config.max_attempts.is_some_and(|max| failures >= max) {
            error!("[WebSocket]: giving up after {} failed attempt(s)", failures);
            break;
        }

        let delay = backoff.next_delay();
        debug!("[WebSocket]: reconnecting in {:?}", delay);
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.changed() => break,
        }
    }

    status.send_replace(ChannelStatus::Closed);
    info!("[WebSocket]: closed");
}

async fn pump(
    socket: Socket,
    outgoing: &mut mpsc::UnboundedReceiver<Message>,
    incoming: &mpsc::UnboundedSender<Incoming>,
    shutdown: &mut watch::Receiver<bool>,
) -> PumpExit {
    let (mut sink, mut source) = socket.split();

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                let frame = CloseFrame {
                    code: CloseCode::Normal,
                    reason: "".into(),
                };
                if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                    debug!("[WebSocket]: close frame not sent: {}", e);
                }
                let _ = sink.close().await;
                return PumpExit::Closed;
            }
            Some(frame) = outgoing.recv() => {
                if let Err(e) = sink.send(frame).await {
                    warn!("[WebSocket]: send failed: {}", e);
                    return PumpExit::Dropped;
                }
            }
            frame = source.next() => match frame {
                Some(Ok(Message::Text(text))) => dispatch_text(text.as_str(), incoming),
                Some(Ok(Message::Binary(data))) => {
                    debug!("[WebSocket]: IN binary ({} bytes)", data.len());
                    let _ = incoming.send(Incoming::Binary(data));
                }
                Some(Ok(Message::Close(frame))) => {
                    info!("[WebSocket]: server closed the connection: {:?}", frame);
                    return PumpExit::Dropped;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("[WebSocket]: receive failed: {}", e);
                    return PumpExit::Dropped;
                }
                None => return PumpExit::Dropped,
            }
        }
    }
}

fn dispatch_text(text: &str, incoming: &mpsc::UnboundedSender<Incoming>) {
    match SignallingMessage::decode(text) {
        Ok(msg) => {
            debug!("[WebSocket]: IN {}", msg.kind());
            let _ = incoming.send(Incoming::Signal(msg));
        }
        Err(DecodeError::UnknownKind(kind)) => {
            warn!("[WebSocket]: unknown message kind {:?}, discarded", kind);
        }
        Err(e) => warn!("[WebSocket]: discarding frame: {}", e),
    }
}
