//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request id, tracing, timeout)
//!     → socket path      → websocket.rs → realtime hub
//!     → client path      → websocket.rs (transport bundle)
//!     → /__relay/status  → status.rs
//!     → mirror prefix    → ServeDir
//!     → anything else    → RouteTable::classify
//!                             → render route → RenderOrchestrator (fallback: gateway)
//!                             → proxy        → Gateway::forward
//! ```

pub mod server;
pub mod status;
pub mod websocket;

pub use server::{AppState, HttpServer, ServerError};
pub use status::StatusReport;
