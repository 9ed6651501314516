//! Browser capability seam.
//!
//! The orchestrator only talks to these traits; Chromium is one implementation.

use async_trait::async_trait;
use url::Url;

use crate::render::types::{Readiness, RenderError, SessionProfile};

/// Launches isolated, disposable browser sessions.
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    async fn launch(&self, profile: &SessionProfile) -> Result<Box<dyn BrowserSession>, RenderError>;
}

/// One isolated browser context.
///
/// Dropping a session without calling [`BrowserSession::close`] must still
/// release the underlying browser process.
#[async_trait]
pub trait BrowserSession: Send {
    /// Navigate and wait for the readiness signal.
    async fn navigate(&mut self, url: &Url, readiness: Readiness) -> Result<(), RenderError>;

    /// Current rendered markup.
    async fn content(&mut self) -> Result<String, RenderError>;

    /// Tear the session down.
    async fn close(self: Box<Self>);
}
