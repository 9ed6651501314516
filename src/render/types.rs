//! Render route, session profile, outcome and error types.

use std::fmt;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::config::{ReadinessPolicy, RenderRouteConfig, ViewportConfig};
use crate::egress::EgressEntry;

/// Errors from a single render attempt. Never surfaced to clients.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("markup extraction failed: {0}")]
    Extraction(String),

    #[error("browser session already closed")]
    Closed,
}

/// Readiness signal awaited before extracting markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Navigation has loaded the document.
    MarkupParsed,
    /// No network activity for the given interval after load.
    NetworkQuiet(Duration),
}

impl From<&ReadinessPolicy> for Readiness {
    fn from(policy: &ReadinessPolicy) -> Self {
        match policy {
            ReadinessPolicy::MarkupParsed => Readiness::MarkupParsed,
            ReadinessPolicy::NetworkQuiet { quiet_ms } => {
                Readiness::NetworkQuiet(Duration::from_millis(*quiet_ms))
            }
        }
    }
}

/// A route answered from a rendered snapshot when possible.
#[derive(Debug, Clone)]
pub struct RenderRoute {
    pub path: String,
    pub target_url: Url,
    pub readiness: Readiness,
    pub deadline: Duration,
    pub viewport: Option<ViewportConfig>,
    pub referer: Option<String>,
    pub insert_base_href: bool,
    pub strip_overlays: bool,
}

impl RenderRoute {
    pub fn from_config(config: &RenderRouteConfig) -> Result<Self, url::ParseError> {
        Ok(Self {
            path: config.path.clone(),
            target_url: Url::parse(&config.target_url)?,
            readiness: Readiness::from(&config.readiness),
            deadline: Duration::from_secs(config.deadline_secs),
            viewport: config.viewport,
            referer: config.referer.clone(),
            insert_base_href: config.insert_base_href,
            strip_overlays: config.strip_overlays,
        })
    }

    /// Path and query fetched through the gateway when rendering is unavailable.
    pub fn fallback_path(&self) -> String {
        match self.target_url.query() {
            Some(query) => format!("{}?{}", self.target_url.path(), query),
            None => self.target_url.path().to_string(),
        }
    }
}

/// Outbound identity of one browser session.
#[derive(Debug, Clone)]
pub struct SessionProfile {
    pub user_agent: String,
    pub accept_language: String,
    /// Extra request headers (referer, accept-language).
    pub headers: Vec<(String, String)>,
    pub viewport: Option<ViewportConfig>,
    pub egress: Option<EgressEntry>,
}

/// Lifecycle of a single render attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPhase {
    Idle,
    Launching,
    Navigating,
    Ready,
    TimedOut,
    LaunchFailed,
    NavigationFailed,
    TornDown,
}

impl RenderPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderPhase::Idle => "idle",
            RenderPhase::Launching => "launching",
            RenderPhase::Navigating => "navigating",
            RenderPhase::Ready => "ready",
            RenderPhase::TimedOut => "timed_out",
            RenderPhase::LaunchFailed => "launch_failed",
            RenderPhase::NavigationFailed => "navigation_failed",
            RenderPhase::TornDown => "torn_down",
        }
    }
}

/// Fully rendered page after post-processing.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub html: String,
    pub target_url: Url,
    pub egress: Option<EgressEntry>,
    pub elapsed: Duration,
}

/// Why no snapshot was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnavailableReason {
    TimedOut,
    LaunchFailed(RenderError),
    NavigationFailed(RenderError),
}

impl UnavailableReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnavailableReason::TimedOut => "timed_out",
            UnavailableReason::LaunchFailed(_) => "launch_failed",
            UnavailableReason::NavigationFailed(_) => "navigation_failed",
        }
    }
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnavailableReason::TimedOut => f.write_str("render deadline exceeded"),
            UnavailableReason::LaunchFailed(e) | UnavailableReason::NavigationFailed(e) => {
                write!(f, "{}", e)
            }
        }
    }
}

/// Result of a render attempt; `Unavailable` routes the request to the gateway.
#[derive(Debug, Clone)]
pub enum RenderOutcome {
    Rendered(Snapshot),
    Unavailable(UnavailableReason),
}
