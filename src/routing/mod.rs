//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → router.rs (RouteTable::classify)
//!     → matcher.rs (evaluate match conditions)
//!     → RouteKind::Render(route) | RouteKind::Proxy
//!
//! Route Compilation (at startup):
//!     RenderRouteConfig[]
//!     → RenderRoute (target URL parsed)
//!     → GET + exact-path matchers
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path
//! - Deterministic: same input always matches same route

pub mod matcher;
pub mod router;

pub use router::{RouteKind, RouteTable};
