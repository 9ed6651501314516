//! Response cache subsystem.
//!
//! # Data Flow
//! ```text
//! GET request → CacheKey (method, path+query, upstream accept-encoding)
//!     → store.rs lookup (lazy expiry)
//!     → hit: serve stored status/headers/body
//!     → miss: gateway fetches origin
//!         → policy.rs classifies (Long | Short | None)
//!         → rewritten HTML stored directly, streamed bodies via tee.rs
//! ```
//!
//! # Design Decisions
//! - No background sweep; stale entries are removed on lookup
//! - Entries are immutable; a store for an existing key replaces it
//! - Only complete 200 responses are stored
//! - Credentialed requests and cookie-setting or private responses are never shared

pub mod policy;
pub mod store;
pub mod tee;

pub use policy::{is_html, request_is_cacheable, response_is_storable, CachePolicy, TtlClass};
pub use store::{CacheEntry, CacheKey, CachedResponse, ResponseCache};
pub use tee::{CacheFill, TeeStream};
