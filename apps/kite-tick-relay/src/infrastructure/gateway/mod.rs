//! Downstream WebSocket Gateway
//!
//! `GET /ws` upgrades to a WebSocket and registers the connection as a
//! subscriber. Each connection gets a writer task that drains its queue;
//! inbound frames are read only to notice the client going away.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, Utf8Bytes, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::infrastructure::broadcast::SubscriberRegistry;
use crate::infrastructure::server::AppState;

/// Upgrade handler for the subscriber channel.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let registry = Arc::clone(&state.registry);
    let cancel = state.cancel.clone();
    ws.on_upgrade(move |socket| serve_subscriber(socket, registry, cancel))
}

/// Pump events to one subscriber until it disconnects or the relay stops.
pub async fn serve_subscriber(
    socket: WebSocket,
    registry: Arc<SubscriberRegistry>,
    cancel: CancellationToken,
) {
    let (id, mut outbound) = registry.register();
    let (mut sink, mut stream) = socket.split();

    let mut writer = tokio::spawn(async move {
        while let Some(payload) = outbound.recv().await {
            let text = Utf8Bytes::from(String::from(&*payload));
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = sink.send(Message::Close(None)).await;
    });

    let mut reader = tokio::spawn(async move {
        while let Some(Ok(message)) = stream.next().await {
            if matches!(message, Message::Close(_)) {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
        () = cancel.cancelled() => {
            reader.abort();
            writer.abort();
        }
    }

    registry.unregister(id);
}
