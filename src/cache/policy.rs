//! TTL classification.
//!
//! Static assets (by file extension) get the long class, HTML documents the
//! short class, everything else is not cached. Requests carrying credentials
//! and responses that set cookies or forbid shared storage bypass the cache.

use axum::http::{header, HeaderMap};
use std::collections::HashSet;
use std::time::Duration;

use crate::config::CacheConfig;

/// Expiry bucket applied to a cached response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TtlClass {
    /// Static assets, hours.
    Long,
    /// HTML documents, minutes.
    Short,
    /// Not cacheable.
    None,
}

impl TtlClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            TtlClass::Long => "long",
            TtlClass::Short => "short",
            TtlClass::None => "none",
        }
    }
}

/// Maps paths and content types to TTL classes.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    long: Duration,
    short: Duration,
    static_extensions: HashSet<String>,
    max_entry_bytes: usize,
}

impl CachePolicy {
    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            long: Duration::from_secs(config.long_ttl_secs),
            short: Duration::from_secs(config.short_ttl_secs),
            static_extensions: config
                .static_extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            max_entry_bytes: config.max_entry_bytes,
        }
    }

    /// Decide the TTL class for a response.
    pub fn classify(&self, path: &str, content_type: Option<&str>) -> TtlClass {
        let last_segment = path.rsplit('/').next().unwrap_or_default();
        if let Some((_, ext)) = last_segment.rsplit_once('.') {
            if self.static_extensions.contains(&ext.to_ascii_lowercase()) {
                return TtlClass::Long;
            }
        }

        if content_type.map(is_html).unwrap_or(false) {
            return TtlClass::Short;
        }

        TtlClass::None
    }

    /// Lifetime for a class; `None` for the uncacheable class.
    pub fn ttl(&self, class: TtlClass) -> Option<Duration> {
        match class {
            TtlClass::Long => Some(self.long),
            TtlClass::Short => Some(self.short),
            TtlClass::None => None,
        }
    }

    pub fn max_entry_bytes(&self) -> usize {
        self.max_entry_bytes
    }
}

/// False when the request carries per-user credentials.
pub fn request_is_cacheable(headers: &HeaderMap) -> bool {
    !headers.contains_key(header::COOKIE) && !headers.contains_key(header::AUTHORIZATION)
}

/// False when the response sets cookies or its `Cache-Control` rules out shared storage.
pub fn response_is_storable(headers: &HeaderMap) -> bool {
    if headers.contains_key(header::SET_COOKIE) {
        return false;
    }
    !headers
        .get_all(header::CACHE_CONTROL)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|directive| directive.trim().to_ascii_lowercase())
        .any(|directive| {
            directive == "no-store" || directive == "private" || directive.starts_with("private=")
        })
}

/// True for `text/html` and `application/xhtml+xml` media types.
pub fn is_html(content_type: &str) -> bool {
    let media = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    media == "text/html" || media == "application/xhtml+xml"
}
