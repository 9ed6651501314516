//! Real-time endpoints.
//!
//! # Responsibilities
//! - Upgrade `GET <socket path>` to a websocket bound to the broadcast hub
//! - Serve the transport client bundle at `GET <client path>`
//!
//! # Data Flow
//! ```text
//! Client ←──── {"event":"sync"} frames ────  Relay ←──── BroadcastHub
//! Client ────── {"event":"click"} frames ──→ Relay ────→ BroadcastHub::increment
//! ```

use axum::{
    extract::{State, WebSocketUpgrade},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};

use crate::http::server::AppState;
use crate::realtime::serve_socket;

pub async fn socket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let hub = state.hub.clone();
    let shutdown = state.sessions.subscribe();
    ws.on_upgrade(move |socket| serve_socket(socket, hub, shutdown))
}

pub async fn client_bundle_handler(State(state): State<AppState>) -> Response {
    (
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/javascript; charset=utf-8"),
            ),
            (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
        ],
        state.client_bundle.clone(),
    )
        .into_response()
}
