//! Origin forwarding with stream-or-rewrite delivery.

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Method, Request, Response, StatusCode};
use bytes::Bytes;
use std::time::{Duration, Instant};

use crate::cache::{
    request_is_cacheable, response_is_storable, CacheFill, CacheKey, CachedResponse,
    ResponseCache, TeeStream, TtlClass,
};
use crate::config::TimeoutConfig;
use crate::gateway::classify::{classify, Disposition};
use crate::gateway::error::GatewayError;
use crate::gateway::headers;
use crate::gateway::rewrite::HtmlRewriter;
use crate::gateway::target::ProxyTarget;
use crate::observability::metrics;

/// Response header reporting whether the cache answered.
pub const X_RELAY_CACHE: &str = "x-relay-cache";

/// Largest request body forwarded to the origin.
const MAX_REQUEST_BODY: usize = 2 * 1024 * 1024;

/// Forwards requests to the origin and applies the rewrite policy.
#[derive(Debug, Clone)]
pub struct Gateway {
    client: reqwest::Client,
    target: ProxyTarget,
    rewriter: HtmlRewriter,
    cache: Option<ResponseCache>,
    origin_timeout: Duration,
}

impl Gateway {
    pub fn new(
        target: ProxyTarget,
        rewriter: HtmlRewriter,
        cache: Option<ResponseCache>,
        timeouts: &TimeoutConfig,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .build()
            .map_err(GatewayError::Client)?;

        Ok(Self {
            client,
            target,
            rewriter,
            cache,
            origin_timeout: Duration::from_secs(timeouts.origin_secs),
        })
    }

    pub fn target(&self) -> &ProxyTarget {
        &self.target
    }

    pub fn rewriter(&self) -> &HtmlRewriter {
        &self.rewriter
    }

    pub fn cache(&self) -> Option<&ResponseCache> {
        self.cache.as_ref()
    }

    /// Forward an inbound request as-is.
    pub async fn forward(&self, request: Request<Body>) -> Result<Response<Body>, GatewayError> {
        let (parts, body) = request.into_parts();
        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        self.forward_path(&parts.method, path_and_query, &parts.headers, body)
            .await
    }

    /// Forward a request for `path_and_query`, which may differ from the inbound URI.
    pub async fn forward_path(
        &self,
        method: &Method,
        path_and_query: &str,
        client_headers: &HeaderMap,
        body: Body,
    ) -> Result<Response<Body>, GatewayError> {
        let start = Instant::now();
        let (path, query) = match path_and_query.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (path_and_query, None),
        };

        let upstream_headers =
            headers::upstream_request_headers(client_headers, self.target.is_transformable(path));
        let cache_key = match (&self.cache, method) {
            (Some(_), &Method::GET) if request_is_cacheable(client_headers) => Some(CacheKey::new(
                method,
                path_and_query,
                upstream_headers
                    .get(header::ACCEPT_ENCODING)
                    .and_then(|v| v.to_str().ok()),
            )),
            _ => None,
        };
        let consults_cache = cache_key.is_some();

        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            if let Some(entry) = cache.lookup(key) {
                tracing::debug!(path = %path, class = entry.ttl_class.as_str(), "Serving from cache");
                let mut response = Response::new(Body::from(entry.body.clone()));
                *response.status_mut() = entry.status;
                *response.headers_mut() = entry.headers.clone();
                response
                    .headers_mut()
                    .insert(X_RELAY_CACHE, HeaderValue::from_static("hit"));
                metrics::record_request(method.as_str(), entry.status.as_u16(), "cache", start);
                return Ok(response);
            }
        }

        let url = self.target.upstream_url(path, query);
        let mut upstream = self
            .client
            .request(method.clone(), url.clone())
            .headers(upstream_headers);
        if *method != Method::GET && *method != Method::HEAD {
            let bytes = axum::body::to_bytes(body, MAX_REQUEST_BODY)
                .await
                .map_err(GatewayError::RequestBody)?;
            upstream = upstream.body(bytes);
        }

        let origin_response = match tokio::time::timeout(self.origin_timeout, upstream.send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) if e.is_timeout() => {
                return Err(GatewayError::OriginTimeout {
                    url: url.to_string(),
                    timeout: self.origin_timeout,
                })
            }
            Ok(Err(e)) => {
                return Err(GatewayError::OriginUnreachable {
                    url: url.to_string(),
                    source: e,
                })
            }
            Err(_) => {
                return Err(GatewayError::OriginTimeout {
                    url: url.to_string(),
                    timeout: self.origin_timeout,
                })
            }
        };

        let status = origin_response.status();
        let mut response_headers = origin_response.headers().clone();
        headers::strip_hop_by_hop(&mut response_headers);
        headers::rewrite_location(&mut response_headers, self.target.origin());

        let content_type = response_headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let disposition = classify(
            method,
            status,
            content_type.as_deref(),
            path,
            self.target.transformable_prefix(),
        );
        let ttl_class = match (&self.cache, &cache_key) {
            (Some(cache), Some(_))
                if status == StatusCode::OK && response_is_storable(&response_headers) =>
            {
                cache.policy().classify(path, content_type.as_deref())
            }
            _ => TtlClass::None,
        };

        tracing::debug!(
            path = %path,
            status = %status,
            disposition = disposition.as_str(),
            ttl_class = ttl_class.as_str(),
            "Origin responded"
        );

        let body = match disposition {
            Disposition::Skip => Body::empty(),
            Disposition::Stream => {
                let fill = match (&self.cache, cache_key) {
                    (Some(cache), Some(key)) if ttl_class != TtlClass::None => Some(CacheFill {
                        cache: cache.clone(),
                        key,
                        template: CachedResponse {
                            status,
                            headers: response_headers.clone(),
                            body: Bytes::new(),
                        },
                        class: ttl_class,
                    }),
                    _ => None,
                };
                Body::from_stream(TeeStream::new(Box::pin(origin_response.bytes_stream()), fill))
            }
            Disposition::BufferAndRewrite => {
                let raw = origin_response
                    .bytes()
                    .await
                    .map_err(|e| GatewayError::UpstreamBody {
                        url: url.to_string(),
                        source: e,
                    })?;
                let rewritten = match std::str::from_utf8(&raw) {
                    Ok(html) => Bytes::from(self.rewriter.rewrite(html)),
                    Err(_) => {
                        tracing::warn!(path = %path, "HTML body is not UTF-8, delivering unmodified");
                        raw
                    }
                };
                headers::strip_for_rewrite(&mut response_headers);

                if let (Some(cache), Some(key)) = (&self.cache, cache_key) {
                    cache.store(
                        key,
                        CachedResponse {
                            status,
                            headers: response_headers.clone(),
                            body: rewritten.clone(),
                        },
                        ttl_class,
                    );
                }
                Body::from(rewritten)
            }
        };

        if consults_cache {
            response_headers.insert(X_RELAY_CACHE, HeaderValue::from_static("miss"));
        }

        let mut response = Response::new(body);
        *response.status_mut() = status;
        *response.headers_mut() = response_headers;
        metrics::record_request(method.as_str(), status.as_u16(), disposition.as_str(), start);
        Ok(response)
    }
}
