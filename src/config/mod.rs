//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! optional config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → environment overrides (ORIGIN_URL, PORT, PROXY_LIST, CAPTCHA_API_KEY)
//!     → validation.rs (semantic checks)
//!     → RelayConfig (validated, immutable)
//!     → handed to HttpServer, which builds every subsystem from it
//! ```
//!
//! # Design Decisions
//! - Config is loaded once at startup and never changes afterwards
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    CacheConfig, CaptchaConfig, EgressConfig, ListenerConfig, MirrorConfig, OriginConfig, PreloadHint,
    ReadinessPolicy, RealtimeConfig, RelayConfig, RenderConfig, RenderRouteConfig, RewriteConfig,
    TimeoutConfig, ViewportConfig,
};
