//! Egress rotation subsystem.
//!
//! # Data Flow
//! ```text
//! PROXY_LIST / egress.entries
//!     → entry.rs (parse descriptors at startup)
//!     → pool.rs (round-robin cursor)
//!     → render orchestrator binds the selected entry to a browser session
//! ```
//!
//! # Design Decisions
//! - Selection is stateless with respect to health; dead entries keep their turn
//! - Empty pool means render sessions use the direct network path

pub mod entry;
pub mod pool;

pub use entry::{EgressCredentials, EgressEntry, EgressParseError};
pub use pool::EgressPool;
