use crate::relay::RelayService;
use axum::extract::State;
use axum::extract::WebSocketUpgrade;
use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{info, warn};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(relay): State<RelayService>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, relay))
}

async fn handle_socket(socket: WebSocket, relay: RelayService) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let channel_id = match relay.on_connect(tx) {
        Ok(id) => id,
        Err(e) => {
            warn!("Refusing WebSocket connection: {}", e);
            let frame = CloseFrame {
                code: close_code::AGAIN,
                reason: "relay is full".into(),
            };
            let _ = sender.send(Message::Close(Some(frame))).await;
            return;
        }
    };

    info!(
        "Client {} connected, total clients connected: {}",
        channel_id,
        relay.connected()
    );

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let relay = relay.clone();

        async move {
            while let Some(frame) = receiver.next().await {
                match frame {
                    Ok(msg @ (Message::Text(_) | Message::Binary(_))) => {
                        relay.on_message(&channel_id, msg);
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        relay.on_error(&channel_id, &e);
                        break;
                    }
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    relay.on_disconnect(&channel_id);
    info!(
        "Client {} disconnected, total clients connected: {}",
        channel_id,
        relay.connected()
    );
}
