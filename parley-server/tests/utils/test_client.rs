use anyhow::{Context, Result, bail};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use parley_core::SignallingMessage;

/// Timeout for a frame that is expected to arrive (ms).
pub const RECV_TIMEOUT_MS: u64 = 2000;

/// How long to listen before concluding that nothing was delivered (ms).
pub const SILENCE_MS: u64 = 300;

/// A bare WebSocket peer talking to the relay.
pub struct TestClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let url = format!("ws://{}/", addr);
        let (ws, _) = connect_async(url.as_str())
            .await
            .context("WebSocket handshake failed")?;
        Ok(Self { ws })
    }

    pub async fn send_text(&mut self, text: &str) -> Result<()> {
        self.ws.send(Message::Text(text.to_owned().into())).await?;
        Ok(())
    }

    pub async fn send_signal(&mut self, msg: &SignallingMessage) -> Result<()> {
        let text = msg.encode()?;
        self.send_text(&text).await
    }

    pub async fn send_binary(&mut self, data: &[u8]) -> Result<()> {
        self.ws.send(Message::Binary(data.to_vec().into())).await?;
        Ok(())
    }

    /// Next data or close frame; pings and pongs are skipped.
    pub async fn recv(&mut self, timeout_ms: u64) -> Result<Message> {
        let deadline = Duration::from_millis(timeout_ms);
        loop {
            let next = tokio::time::timeout(deadline, self.ws.next())
                .await
                .context("Timeout waiting for a frame")?;
            match next {
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                Some(Ok(msg)) => return Ok(msg),
                Some(Err(e)) => return Err(e.into()),
                None => bail!("Connection ended"),
            }
        }
    }

    pub async fn recv_text(&mut self) -> Result<String> {
        match self.recv(RECV_TIMEOUT_MS).await? {
            Message::Text(text) => Ok(text.as_str().to_owned()),
            other => bail!("Expected a text frame, got {:?}", other),
        }
    }

    pub async fn recv_signal(&mut self) -> Result<SignallingMessage> {
        let text = self.recv_text().await?;
        Ok(SignallingMessage::decode(&text)?)
    }

    pub async fn recv_close(&mut self) -> Result<Option<CloseFrame>> {
        match self.recv(RECV_TIMEOUT_MS).await? {
            Message::Close(frame) => Ok(frame),
            other => bail!("Expected a close frame, got {:?}", other),
        }
    }

    /// True when no data frame shows up within `SILENCE_MS`.
    pub async fn is_silent(&mut self) -> bool {
        self.recv(SILENCE_MS).await.is_err()
    }

    pub async fn close(mut self) -> Result<()> {
        self.ws.close(None).await?;
        Ok(())
    }
}
