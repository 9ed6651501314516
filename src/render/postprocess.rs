//! Snapshot post-processing.
//!
//! Rendered markup is served from the relay's own origin, so policies that
//! pin it to the upstream host are removed and relative URLs are anchored
//! back to the upstream with a base href.

use regex::Regex;
use std::sync::LazyLock;

use crate::gateway::rewrite::insert_base_href;
use crate::render::types::RenderRoute;

static CSP_META: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<meta\b[^>]*http-equiv\s*=\s*["']?content-security-policy["']?[^>]*>"#)
        .expect("valid regex")
});
static SCRIPT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").expect("valid regex"));

#[derive(Debug, Clone)]
pub struct PostProcessor {
    base_href: String,
    overlay_patterns: Vec<String>,
}

impl PostProcessor {
    pub fn new(base_href: impl Into<String>, overlay_patterns: Vec<String>) -> Self {
        Self {
            base_href: base_href.into(),
            overlay_patterns,
        }
    }

    pub fn apply(&self, route: &RenderRoute, html: &str) -> String {
        let mut out = strip_csp_meta(html);
        if route.insert_base_href {
            out = insert_base_href(&out, &self.base_href);
        }
        if route.strip_overlays && !self.overlay_patterns.is_empty() {
            out = self.strip_overlay_scripts(&out);
        }
        out
    }

    fn strip_overlay_scripts(&self, html: &str) -> String {
        SCRIPT_BLOCK
            .replace_all(html, |caps: &regex::Captures<'_>| {
                let block = &caps[0];
                if self.overlay_patterns.iter().any(|p| block.contains(p.as_str())) {
                    String::new()
                } else {
                    block.to_string()
                }
            })
            .into_owned()
    }
}

pub fn strip_csp_meta(html: &str) -> String {
    CSP_META.replace_all(html, "").into_owned()
}
