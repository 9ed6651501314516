//! Transform gateway.
//!
//! # Data Flow
//! ```text
//! request → target.rs (origin URL, path rewrite)
//!     → cache lookup (GET only)
//!     → origin fetch (reqwest, no redirects followed)
//!     → classify.rs: Stream | BufferAndRewrite | Skip
//!         Stream           → chunks forwarded as they arrive (tee into cache)
//!         BufferAndRewrite → full body → rewrite.rs → headers.rs strip → cache
//!         Skip             → headers only
//! ```
//!
//! # Design Decisions
//! - Rewriting only ever sees complete documents; no partial bodies are sent
//! - No retries here; origin failures become 502/504
//! - Restriction headers are removed from rewritten pages only

pub mod classify;
pub mod error;
pub mod forward;
pub mod headers;
pub mod rewrite;
pub mod target;

pub use classify::{classify, Disposition};
pub use error::GatewayError;
pub use forward::{Gateway, X_RELAY_CACHE};
pub use rewrite::HtmlRewriter;
pub use target::{PathRewrite, ProxyTarget};
