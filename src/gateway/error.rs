//! Gateway failures surfaced to clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::time::Duration;
use thiserror::Error;

/// Errors from the direct proxy path. These are the only failures a client sees.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Connection to the origin failed.
    #[error("origin unreachable at {url}: {source}")]
    OriginUnreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Origin did not produce response headers in time.
    #[error("origin did not respond within {timeout:?} ({url})")]
    OriginTimeout { url: String, timeout: Duration },

    /// Body could not be read while buffering for rewrite.
    #[error("failed reading origin body from {url}: {source}")]
    UpstreamBody {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Client request body could not be read.
    #[error("failed reading request body: {0}")]
    RequestBody(#[source] axum::Error),

    /// HTTP client could not be constructed.
    #[error("HTTP client setup failed: {0}")]
    Client(#[source] reqwest::Error),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::OriginTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::RequestBody(_) => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::Client(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let message = match self.status() {
            StatusCode::GATEWAY_TIMEOUT => "Origin timed out",
            StatusCode::BAD_GATEWAY => "Origin request failed",
            StatusCode::PAYLOAD_TOO_LARGE => "Request body too large",
            _ => "Relay misconfigured",
        };
        (self.status(), message).into_response()
    }
}
