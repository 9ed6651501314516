//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate URLs, path prefixes and egress descriptors
//! - Validate value ranges (deadlines > 0, request timeout covers render plus fallback)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>

use thiserror::Error;
use url::Url;

use crate::config::schema::RelayConfig;
use crate::egress::EgressEntry;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("origin.base_url {0:?} is not an absolute http(s) URL")]
    OriginUrl(String),

    #[error("{field} {value:?} must start with '/'")]
    PathNotAbsolute { field: &'static str, value: String },

    #[error("render route {path:?} has invalid target_url {url:?}")]
    RenderTarget { path: String, url: String },

    #[error("render route {0:?} has a zero deadline")]
    ZeroDeadline(String),

    #[error(
        "render route {path:?} needs {budget_ms}ms (deadline + teardown grace + origin timeout), \
         request timeout is {request_secs}s"
    )]
    DeadlineExceedsRequest {
        path: String,
        budget_ms: u64,
        request_secs: u64,
    },

    #[error("egress entry {0:?} is not a valid proxy descriptor")]
    Egress(String),

    #[error("render.max_concurrent_sessions must be at least 1")]
    NoRenderSessions,

    #[error("cache TTLs must be non-zero when the cache is enabled")]
    ZeroTtl,

    #[error("realtime.outbox_capacity must be at least 1")]
    ZeroOutbox,
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match Url::parse(&config.origin.base_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {}
        _ => errors.push(ValidationError::OriginUrl(config.origin.base_url.clone())),
    }

    let mut paths = vec![
        ("origin.transformable_prefix", &config.origin.transformable_prefix),
        ("realtime.socket_path", &config.realtime.socket_path),
        ("realtime.client_path", &config.realtime.client_path),
    ];
    if let Some(mirror) = &config.mirror {
        paths.push(("mirror.path_prefix", &mirror.path_prefix));
    }
    for route in &config.render.routes {
        paths.push(("render.routes.path", &route.path));
    }
    for (field, value) in paths {
        if !value.starts_with('/') {
            errors.push(ValidationError::PathNotAbsolute {
                field,
                value: value.clone(),
            });
        }
    }

    // A route that times out still has to tear down and fall back to the
    // origin before the request timeout answers.
    let fallback_ms = config
        .render
        .teardown_grace_ms
        .saturating_add(config.timeouts.origin_secs.saturating_mul(1000));
    let request_ms = config.timeouts.request_secs.saturating_mul(1000);
    for route in &config.render.routes {
        if Url::parse(&route.target_url).is_err() {
            errors.push(ValidationError::RenderTarget {
                path: route.path.clone(),
                url: route.target_url.clone(),
            });
        }
        if route.deadline_secs == 0 {
            errors.push(ValidationError::ZeroDeadline(route.path.clone()));
        } else {
            let budget_ms = route.deadline_secs.saturating_mul(1000).saturating_add(fallback_ms);
            if budget_ms >= request_ms {
                errors.push(ValidationError::DeadlineExceedsRequest {
                    path: route.path.clone(),
                    budget_ms,
                    request_secs: config.timeouts.request_secs,
                });
            }
        }
    }

    if !config.render.routes.is_empty() && config.render.max_concurrent_sessions == 0 {
        errors.push(ValidationError::NoRenderSessions);
    }

    for entry in &config.egress.entries {
        if EgressEntry::parse(entry).is_err() {
            errors.push(ValidationError::Egress(entry.clone()));
        }
    }

    if config.cache.enabled && (config.cache.long_ttl_secs == 0 || config.cache.short_ttl_secs == 0) {
        errors.push(ValidationError::ZeroTtl);
    }

    if config.realtime.outbox_capacity == 0 {
        errors.push(ValidationError::ZeroOutbox);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
