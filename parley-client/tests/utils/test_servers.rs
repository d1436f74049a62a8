use anyhow::Result;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use parley_client::{ChannelConfig, Incoming};
use parley_server::{RelayConfig, RelayService, serve_on};

use crate::integration::WAIT;

/// Quick retries so reconnect tests stay short.
pub fn fast_config(addr: SocketAddr) -> ChannelConfig {
    ChannelConfig {
        initial_backoff: Duration::from_millis(20),
        max_backoff: Duration::from_millis(200),
        ..ChannelConfig::new(format!("ws://{}/", addr))
    }
}

pub async fn start_relay() -> Result<(SocketAddr, RelayService, oneshot::Sender<()>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let relay = RelayService::new(RelayConfig {
        bind: addr.ip(),
        port: addr.port(),
        max_peers: None,
    });

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    tokio::spawn({
        let relay = relay.clone();
        async move {
            let shutdown = async move {
                let _ = shutdown_rx.await;
            };
            if let Err(e) = serve_on(listener, relay, shutdown).await {
                tracing::error!("Test relay failed: {:?}", e);
            }
        }
    });

    Ok((addr, relay, shutdown_tx))
}

pub async fn next_incoming(rx: &mut mpsc::UnboundedReceiver<Incoming>) -> Option<Incoming> {
    tokio::time::timeout(WAIT, rx.recv()).await.ok().flatten()
}

/// A bare WebSocket server. The first `drop_first` connections are closed
/// right after the handshake; later ones forward every text frame to the
/// returned receiver and send `greeting` on accept.
pub async fn start_flaky_server(
    drop_first: usize,
    greeting: Vec<String>,
) -> Result<(SocketAddr, Arc<AtomicUsize>, mpsc::UnboundedReceiver<Message>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let accepted = Arc::new(AtomicUsize::new(0));
    let (frames_tx, frames_rx) = mpsc::unbounded_channel();

    tokio::spawn({
        let accepted = accepted.clone();
        async move {
            while let Ok((stream, _)) = listener.accept().await {
                let Ok(mut ws) = accept_async(stream).await else {
                    continue;
                };
                let n = accepted.fetch_add(1, Ordering::SeqCst);
                if n < drop_first {
                    drop(ws);
                    continue;
                }

                let frames_tx = frames_tx.clone();
                let greeting = greeting.clone();
                tokio::spawn(async move {
                    for text in greeting {
                        if ws.send(Message::text(text)).await.is_err() {
                            return;
                        }
                    }
                    while let Some(Ok(frame)) = ws.next().await {
                        let done = matches!(frame, Message::Close(_));
                        let _ = frames_tx.send(frame);
                        if done {
                            break;
                        }
                    }
                });
            }
        }
    });

    Ok((addr, accepted, frames_rx))
}

