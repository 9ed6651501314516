//! Real-time state fan-out.
//!
//! # Data Flow
//! ```text
//! client page (injected bootstrap)
//!     ⇄ websocket (socket.rs, JSON frames from protocol.rs)
//!     ⇄ hub.rs actor (owns BroadcastState + subscriber table)
//!
//! connect   → Join      → sync(current) to that subscriber
//! "click"   → Increment → counter += 1 → sync(new) to every subscriber
//! disconnect→ Leave
//! ```
//!
//! # Design Decisions
//! - One actor task serializes all mutations; no locks around the counter
//! - Bounded per-subscriber outboxes; a subscriber that falls behind is
//!   disconnected rather than skipping a value

pub mod hub;
pub mod protocol;
pub mod socket;

pub use hub::{BroadcastHub, BroadcastState, HubSnapshot, SubscriberId, Subscription};
pub use protocol::{ClientEvent, ServerEvent};
pub use socket::serve_socket;

/// Embedded transport client served at the configured client path.
pub const CLIENT_BUNDLE: &str = include_str!("../../assets/relay-client.js");
