//! Deadline-bounded render attempts.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::{CaptchaConfig, RenderConfig};
use crate::egress::EgressPool;
use crate::observability::metrics;
use crate::render::captcha::ChallengeHook;
use crate::render::engine::{BrowserEngine, BrowserSession};
use crate::render::postprocess::PostProcessor;
use crate::render::types::{
    RenderError, RenderOutcome, RenderPhase, RenderRoute, SessionProfile, Snapshot,
    UnavailableReason,
};

/// Runs render attempts against a browser engine.
///
/// Every attempt is bounded by its route's deadline, which covers waiting
/// for a session slot, launching, navigating and extracting markup. Whatever
/// the outcome, a launched session is closed before `render` returns.
pub struct RenderOrchestrator {
    engine: Arc<dyn BrowserEngine>,
    egress: Arc<EgressPool>,
    user_agent: String,
    accept_language: String,
    postprocessor: PostProcessor,
    challenge: ChallengeHook,
    slots: Arc<Semaphore>,
    active: Arc<AtomicUsize>,
    teardown_grace: Duration,
}

impl RenderOrchestrator {
    pub fn new(
        engine: Arc<dyn BrowserEngine>,
        egress: Arc<EgressPool>,
        config: &RenderConfig,
        captcha: &CaptchaConfig,
        base_href: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            egress,
            user_agent: config.user_agent.clone(),
            accept_language: config.accept_language.clone(),
            postprocessor: PostProcessor::new(base_href, config.overlay_patterns.clone()),
            challenge: ChallengeHook::new(captcha.api_key.clone()),
            slots: Arc::new(Semaphore::new(config.max_concurrent_sessions.max(1))),
            active: Arc::new(AtomicUsize::new(0)),
            teardown_grace: Duration::from_millis(config.teardown_grace_ms),
        }
    }

    /// Number of browser sessions currently open.
    pub fn active_sessions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn egress(&self) -> &EgressPool {
        &self.egress
    }

    /// Render `route`, returning a post-processed snapshot or the reason there is none.
    pub async fn render(&self, route: &RenderRoute) -> RenderOutcome {
        let start = Instant::now();
        let deadline = tokio::time::Instant::now() + route.deadline;
        let profile = self.profile(route);
        let egress = profile.egress.clone();
        let mut slot: Option<ActiveSession> = None;

        log_phase(route, RenderPhase::Idle);
        let attempt = tokio::time::timeout_at(deadline, self.attempt(route, &profile, &mut slot)).await;

        let outcome = match attempt {
            Ok(Ok(html)) => {
                log_phase(route, RenderPhase::Ready);
                RenderOutcome::Rendered(Snapshot {
                    html: self.postprocessor.apply(route, &html),
                    target_url: route.target_url.clone(),
                    egress,
                    elapsed: start.elapsed(),
                })
            }
            Ok(Err(reason)) => {
                let phase = match reason {
                    UnavailableReason::LaunchFailed(_) => RenderPhase::LaunchFailed,
                    _ => RenderPhase::NavigationFailed,
                };
                log_phase(route, phase);
                tracing::warn!(route = %route.path, reason = %reason, "Render attempt failed");
                RenderOutcome::Unavailable(reason)
            }
            Err(_) => {
                log_phase(route, RenderPhase::TimedOut);
                tracing::warn!(
                    route = %route.path,
                    deadline_secs = route.deadline.as_secs(),
                    "Render deadline exceeded"
                );
                RenderOutcome::Unavailable(UnavailableReason::TimedOut)
            }
        };

        if let Some(session) = slot.take() {
            session.teardown(self.teardown_grace).await;
            log_phase(route, RenderPhase::TornDown);
        }

        let label = match &outcome {
            RenderOutcome::Rendered(_) => "rendered",
            RenderOutcome::Unavailable(reason) => reason.as_str(),
        };
        metrics::record_render_attempt(label, start);
        outcome
    }

    async fn attempt(
        &self,
        route: &RenderRoute,
        profile: &SessionProfile,
        slot: &mut Option<ActiveSession>,
    ) -> Result<String, UnavailableReason> {
        let permit = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| UnavailableReason::LaunchFailed(RenderError::Closed))?;

        log_phase(route, RenderPhase::Launching);
        let session = self
            .engine
            .launch(profile)
            .await
            .map_err(UnavailableReason::LaunchFailed)?;
        let active = slot.insert(ActiveSession::new(session, permit, self.active.clone()));
        let session = active.session_mut().ok_or(UnavailableReason::LaunchFailed(RenderError::Closed))?;

        log_phase(route, RenderPhase::Navigating);
        session
            .navigate(&route.target_url, route.readiness)
            .await
            .map_err(UnavailableReason::NavigationFailed)?;
        self.challenge.after_navigation(&route.target_url);

        session
            .content()
            .await
            .map_err(UnavailableReason::NavigationFailed)
    }

    fn profile(&self, route: &RenderRoute) -> SessionProfile {
        let mut headers = vec![("Accept-Language".to_string(), self.accept_language.clone())];
        if let Some(referer) = &route.referer {
            headers.push(("Referer".to_string(), referer.clone()));
        }
        SessionProfile {
            user_agent: self.user_agent.clone(),
            accept_language: self.accept_language.clone(),
            headers,
            viewport: route.viewport,
            egress: self.egress.next(),
        }
    }
}

fn log_phase(route: &RenderRoute, phase: RenderPhase) {
    tracing::debug!(route = %route.path, phase = phase.as_str(), "Render phase");
}

/// A launched session holding its concurrency slot.
struct ActiveSession {
    session: Option<Box<dyn BrowserSession>>,
    active: Arc<AtomicUsize>,
    _permit: OwnedSemaphorePermit,
}

impl ActiveSession {
    fn new(session: Box<dyn BrowserSession>, permit: OwnedSemaphorePermit, active: Arc<AtomicUsize>) -> Self {
        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::record_render_sessions(now);
        Self {
            session: Some(session),
            active,
            _permit: permit,
        }
    }

    fn session_mut(&mut self) -> Option<&mut Box<dyn BrowserSession>> {
        self.session.as_mut()
    }

    /// Close the session, giving up (and dropping it) after `grace`.
    async fn teardown(mut self, grace: Duration) {
        if let Some(session) = self.session.take() {
            if tokio::time::timeout(grace, session.close()).await.is_err() {
                tracing::warn!(grace_ms = grace.as_millis() as u64, "Browser close timed out; session dropped");
            }
        }
    }
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        let now = self.active.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::record_render_sessions(now);
    }
}
