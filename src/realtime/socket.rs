//! Websocket session bridging one client to the hub.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use crate::realtime::hub::BroadcastHub;
use crate::realtime::protocol::ClientEvent;

/// Drive a client connection until either side closes or `shutdown` fires.
///
/// Hub events are written as text frames; `click` frames trigger an
/// increment. Anything else is ignored.
pub async fn serve_socket(socket: WebSocket, hub: BroadcastHub, mut shutdown: broadcast::Receiver<()>) {
    let mut subscription = hub.subscribe();
    let id = subscription.id();
    let (mut sink, mut frames) = socket.split();

    tracing::debug!(subscriber = %id, "Real-time session opened");

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::debug!(subscriber = %id, "Closing real-time session for shutdown");
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
            event = subscription.recv() => {
                let Some(event) = event else { break };
                if sink.send(Message::Text(event.to_json().into())).await.is_err() {
                    break;
                }
            }
            frame = frames.next() => match frame {
                Some(Ok(Message::Text(text))) => match ClientEvent::parse(text.as_str()) {
                    Some(ClientEvent::Click) => subscription.increment(),
                    None => tracing::debug!(subscriber = %id, frame = %text.as_str(), "Ignoring unknown event"),
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(subscriber = %id, error = %e, "Real-time session error");
                    break;
                }
            }
        }
    }

    tracing::debug!(subscriber = %id, "Real-time session closed");
}
