//! Per-response forwarding decision.

use axum::http::{Method, StatusCode};

use crate::cache::is_html;

/// How a response body is delivered. Decided once, before any byte is forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Forward chunks as they arrive.
    Stream,
    /// Buffer the whole body, mutate it, then send.
    BufferAndRewrite,
    /// No body to deliver (HEAD, 1xx, 204, 304).
    Skip,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Stream => "stream",
            Disposition::BufferAndRewrite => "rewrite",
            Disposition::Skip => "skip",
        }
    }
}

/// Rewrite only HTML under the transformable prefix; everything else streams.
pub fn classify(
    method: &Method,
    status: StatusCode,
    content_type: Option<&str>,
    path: &str,
    transformable_prefix: &str,
) -> Disposition {
    if *method == Method::HEAD
        || status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
    {
        return Disposition::Skip;
    }

    if path.starts_with(transformable_prefix) && content_type.map(is_html).unwrap_or(false) {
        Disposition::BufferAndRewrite
    } else {
        Disposition::Stream
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = "/cookieclicker/";

    #[test]
    fn test_html_under_prefix_is_rewritten() {
        let d = classify(&Method::GET, StatusCode::OK, Some("text/html; charset=utf-8"), "/cookieclicker/", PREFIX);
        assert_eq!(d, Disposition::BufferAndRewrite);
    }

    #[test]
    fn test_assets_and_foreign_paths_stream() {
        let js = classify(&Method::GET, StatusCode::OK, Some("application/javascript"), "/cookieclicker/asset.js", PREFIX);
        assert_eq!(js, Disposition::Stream);

        let html_elsewhere = classify(&Method::GET, StatusCode::OK, Some("text/html"), "/other/", PREFIX);
        assert_eq!(html_elsewhere, Disposition::Stream);

        let untyped = classify(&Method::GET, StatusCode::OK, None, "/cookieclicker/", PREFIX);
        assert_eq!(untyped, Disposition::Stream);
    }

    #[test]
    fn test_bodyless_responses_skip() {
        assert_eq!(
            classify(&Method::HEAD, StatusCode::OK, Some("text/html"), "/cookieclicker/", PREFIX),
            Disposition::Skip
        );
        assert_eq!(
            classify(&Method::GET, StatusCode::NOT_MODIFIED, Some("text/html"), "/cookieclicker/", PREFIX),
            Disposition::Skip
        );
    }
}
