//! In-memory response store with lazy expiry.

use axum::http::{header, HeaderMap, Method, StatusCode};
use bytes::Bytes;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cache::policy::{CachePolicy, TtlClass};
use crate::observability::metrics;

/// Identity of a cacheable request: method, path with query, and the
/// accept-encoding the origin was asked for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(method: &Method, path_and_query: &str, accept_encoding: Option<&str>) -> Self {
        Self(format!(
            "{} {} ae={}",
            method,
            path_and_query,
            accept_encoding.unwrap_or("")
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Response material handed to [`ResponseCache::store`].
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// A stored response. Immutable once stored.
#[derive(Debug)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub stored_at: Instant,
    pub ttl_class: TtlClass,
    ttl: Duration,
}

impl CacheEntry {
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    fn is_fresh_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) <= self.ttl
    }
}

/// Concurrent response cache shared by all request handlers.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    entries: Arc<DashMap<CacheKey, Arc<CacheEntry>>>,
    policy: Arc<CachePolicy>,
}

impl ResponseCache {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            policy: Arc::new(policy),
        }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    pub fn lookup(&self, key: &CacheKey) -> Option<Arc<CacheEntry>> {
        self.lookup_at(key, Instant::now())
    }

    /// Lookup as of `now`. Entries past their TTL are removed and reported as a miss.
    pub fn lookup_at(&self, key: &CacheKey, now: Instant) -> Option<Arc<CacheEntry>> {
        let entry = match self.entries.get(key) {
            Some(entry) => entry.value().clone(),
            None => {
                metrics::record_cache_lookup("miss");
                return None;
            }
        };

        if entry.is_fresh_at(now) {
            metrics::record_cache_lookup("hit");
            return Some(entry);
        }

        // Only drop the entry we judged stale; a concurrent store may have replaced it.
        self.entries
            .remove_if(key, |_, current| Arc::ptr_eq(current, &entry));
        metrics::record_cache_lookup("expired");
        tracing::debug!(key = key.as_str(), "Cache entry expired");
        None
    }

    /// Store a response. Returns false when the class is uncacheable or the body is too large.
    pub fn store(&self, key: CacheKey, response: CachedResponse, class: TtlClass) -> bool {
        self.store_at(key, response, class, Instant::now())
    }

    pub fn store_at(
        &self,
        key: CacheKey,
        response: CachedResponse,
        class: TtlClass,
        now: Instant,
    ) -> bool {
        let ttl = match self.policy.ttl(class) {
            Some(ttl) => ttl,
            None => return false,
        };
        if response.body.len() > self.policy.max_entry_bytes() {
            tracing::debug!(key = key.as_str(), size = response.body.len(), "Response too large to cache");
            return false;
        }

        let entry = Arc::new(CacheEntry {
            key: key.clone(),
            status: response.status,
            headers: response.headers,
            body: response.body,
            stored_at: now,
            ttl_class: class,
            ttl,
        });
        self.entries.insert(key, entry);
        metrics::record_cache_size(self.entries.len());
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;

    fn cache() -> ResponseCache {
        ResponseCache::new(CachePolicy::from_config(&CacheConfig::default()))
    }

    fn response(body: &'static str) -> CachedResponse {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, "application/javascript".parse().unwrap());
        CachedResponse {
            status: StatusCode::OK,
            headers,
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    #[test]
    fn test_store_then_lookup() {
        let cache = cache();
        let key = CacheKey::new(&Method::GET, "/main.js", None);

        assert!(cache.lookup(&key).is_none());
        assert!(cache.store(key.clone(), response("console.log(1)"), TtlClass::Long));

        let entry = cache.lookup(&key).unwrap();
        assert_eq!(entry.body, Bytes::from_static(b"console.log(1)"));
        assert_eq!(entry.content_type(), Some("application/javascript"));
        assert_eq!(entry.ttl_class, TtlClass::Long);
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let cache = cache();
        let key = CacheKey::new(&Method::GET, "/cookieclicker/", None);
        let t0 = Instant::now();
        cache.store_at(key.clone(), response("<html>"), TtlClass::Short, t0);

        assert!(cache.lookup_at(&key, t0 + Duration::from_secs(299)).is_some());
        assert!(cache.lookup_at(&key, t0 + Duration::from_secs(301)).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_store_shadows_existing_entry() {
        let cache = cache();
        let key = CacheKey::new(&Method::GET, "/main.js", None);
        cache.store(key.clone(), response("v1"), TtlClass::Long);
        cache.store(key.clone(), response("v2"), TtlClass::Long);

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.lookup(&key).unwrap().body, Bytes::from_static(b"v2"));
    }

    #[test]
    fn test_uncacheable_and_oversized_rejected() {
        let mut config = CacheConfig::default();
        config.max_entry_bytes = 4;
        let cache = ResponseCache::new(CachePolicy::from_config(&config));

        let key = CacheKey::new(&Method::GET, "/api", None);
        assert!(!cache.store(key.clone(), response("ok"), TtlClass::None));
        assert!(!cache.store(key.clone(), response("too large"), TtlClass::Long));
        assert!(cache.lookup(&key).is_none());
    }

    #[test]
    fn test_key_distinguishes_encoding() {
        let plain = CacheKey::new(&Method::GET, "/a.js", None);
        let gzip = CacheKey::new(&Method::GET, "/a.js", Some("gzip"));
        assert_ne!(plain, gzip);
    }
}
