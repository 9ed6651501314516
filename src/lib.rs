//! live-relay library: transforming proxy, response cache, render fallback
//! and real-time broadcast hub.

pub mod cache;
pub mod config;
pub mod egress;
pub mod gateway;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod realtime;
pub mod render;
pub mod routing;

pub use config::schema::RelayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
