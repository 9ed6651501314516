//! Render fallback subsystem.
//!
//! # Data Flow
//! ```text
//! GET <render route>
//!     → RenderOrchestrator::render(route)
//!         → acquire session slot (semaphore)
//!         → EgressPool::next() → SessionProfile
//!         → BrowserEngine::launch → BrowserSession
//!         → navigate + await readiness → content()
//!         → PostProcessor (CSP meta, base href, overlay scripts)
//!         → teardown (always)
//!     → RenderOutcome::{Rendered(Snapshot) | Unavailable(reason)}
//!     → http handler: inject bootstrap, or fetch fallback path via the gateway
//! ```
//!
//! # Design Decisions
//! - One browser process per attempt; nothing is shared between attempts
//! - A single deadline covers slot wait, launch, navigation and extraction
//! - Engine and session are traits so tests run without Chromium
//! - Errors never reach clients; they become `UnavailableReason`s

pub mod captcha;
pub mod chromium;
pub mod engine;
pub mod orchestrator;
pub mod postprocess;
pub mod types;

pub use captcha::ChallengeHook;
pub use chromium::ChromiumEngine;
pub use engine::{BrowserEngine, BrowserSession};
pub use orchestrator::RenderOrchestrator;
pub use postprocess::PostProcessor;
pub use types::{
    Readiness, RenderError, RenderOutcome, RenderPhase, RenderRoute, SessionProfile, Snapshot,
    UnavailableReason,
};
