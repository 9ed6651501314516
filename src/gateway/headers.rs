//! Header manipulation between client, relay and origin.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers in both directions
//! - Ask the origin for identity encoding when the body may be rewritten
//! - Remove framing/script restrictions from rewritten pages only
//! - Turn origin-absolute redirects into relay-relative ones

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use url::Url;

const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Headers that stop a rewritten page from running injected scripts or being framed.
const RESTRICTIONS: [&str; 3] = [
    "content-security-policy",
    "content-security-policy-report-only",
    "x-frame-options",
];

/// Remove hop-by-hop headers, including those listed in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Headers forwarded to the origin for a client request.
pub fn upstream_request_headers(client: &HeaderMap, force_identity: bool) -> HeaderMap {
    let mut headers = client.clone();
    strip_hop_by_hop(&mut headers);
    headers.remove(header::HOST);

    if force_identity {
        headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("identity"));
    }
    headers
}

/// Drop restriction headers and the ones invalidated by a body change.
pub fn strip_for_rewrite(headers: &mut HeaderMap) {
    for name in RESTRICTIONS {
        headers.remove(name);
    }
    headers.remove(header::CONTENT_LENGTH);
    headers.remove(header::ETAG);
}

/// Make a `Location` pointing at the origin relative, so redirects stay on the relay.
pub fn rewrite_location(headers: &mut HeaderMap, origin: &Url) {
    let Some(location) = headers
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Url::parse(v).ok())
    else {
        return;
    };

    if location.origin() != origin.origin() {
        return;
    }

    let mut relative = location.path().to_string();
    if let Some(query) = location.query() {
        relative.push('?');
        relative.push_str(query);
    }
    if let Some(fragment) = location.fragment() {
        relative.push('#');
        relative.push_str(fragment);
    }
    if let Ok(value) = HeaderValue::from_str(&relative) {
        headers.insert(header::LOCATION, value);
    }
}
