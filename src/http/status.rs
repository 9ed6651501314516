//! `GET /__relay/status`.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

use crate::http::server::AppState;

/// Point-in-time view of the relay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusReport {
    pub counter: u64,
    pub subscribers: usize,
    pub cache_entries: usize,
    pub render_sessions: usize,
    pub egress_entries: usize,
}

pub async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let Some(hub) = state.hub.snapshot().await else {
        return (StatusCode::SERVICE_UNAVAILABLE, "broadcast hub stopped").into_response();
    };

    Json(StatusReport {
        counter: hub.counter,
        subscribers: hub.subscribers,
        cache_entries: state.gateway.cache().map(|c| c.len()).unwrap_or(0),
        render_sessions: state.render.active_sessions(),
        egress_entries: state.render.egress().len(),
    })
    .into_response()
}
