//! Anchor-based HTML mutation.
//!
//! Mutations are applied to the complete document in a fixed order:
//! 1. base href right after the opening `<head>` tag (existing base tags removed)
//! 2. preload hints
//! 3. real-time bootstrap
//!
//! Steps 2 and 3 are spliced immediately before `</head>`. A missing anchor
//! turns only its own step into a no-op.

use regex::Regex;
use std::sync::LazyLock;

use crate::config::{PreloadHint, RealtimeConfig, RewriteConfig};

static HEAD_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<head(?:\s[^>]*)?>").expect("valid regex"));
static HEAD_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</head\s*>").expect("valid regex"));
static BASE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<base\b[^>]*>").expect("valid regex"));

/// Attribute marking injected bootstrap tags.
pub const BOOTSTRAP_MARKER: &str = "data-relay-bootstrap";

/// Insert `<base href>` after the opening head tag, removing any base tag in the head.
///
/// Without a closing head tag the head region is unknown, so existing base
/// tags are left in place.
pub fn insert_base_href(html: &str, href: &str) -> String {
    let Some(open) = HEAD_OPEN.find(html) else {
        return html.to_string();
    };

    let rest = match HEAD_CLOSE.find_at(html, open.end()) {
        Some(close) => {
            let head = BASE_TAG.replace_all(&html[open.end()..close.start()], "");
            format!("{}{}", head, &html[close.start()..])
        }
        None => html[open.end()..].to_string(),
    };

    let mut out = String::with_capacity(html.len() + href.len() + 32);
    out.push_str(&html[..open.end()]);
    out.push_str(&format!(r#"<base href="{}">"#, escape_attr(href)));
    out.push_str(&rest);
    out
}

/// Insert `fragment` immediately before the first closing head tag.
pub fn splice_before_head_close(html: &str, fragment: &str) -> String {
    match HEAD_CLOSE.find(html) {
        Some(close) => {
            let mut out = String::with_capacity(html.len() + fragment.len());
            out.push_str(&html[..close.start()]);
            out.push_str(fragment);
            out.push_str(&html[close.start()..]);
            out
        }
        None => html.to_string(),
    }
}

/// Configured set of mutations for transformable pages.
#[derive(Debug, Clone)]
pub struct HtmlRewriter {
    base_href: String,
    head_fragment: String,
}

impl HtmlRewriter {
    pub fn new(base_href: impl Into<String>, preload: &[PreloadHint], bootstrap: &str) -> Self {
        let mut head_fragment = String::new();
        for hint in preload {
            head_fragment.push_str(&format!(
                r#"<link rel="preload" href="{}" as="{}">"#,
                escape_attr(&hint.href),
                escape_attr(&hint.kind)
            ));
        }
        head_fragment.push_str(bootstrap);

        Self {
            base_href: base_href.into(),
            head_fragment,
        }
    }

    pub fn from_config(base_href: &str, rewrite: &RewriteConfig, realtime: &RealtimeConfig) -> Self {
        let bootstrap = bootstrap_script(
            &realtime.client_path,
            &realtime.socket_path,
            &rewrite.trigger_element_id,
            &rewrite.sync_hook,
        );
        Self::new(base_href, &rewrite.preload, &bootstrap)
    }

    pub fn base_href(&self) -> &str {
        &self.base_href
    }

    /// Apply every mutation step.
    pub fn rewrite(&self, html: &str) -> String {
        let html = insert_base_href(html, &self.base_href);
        self.inject_bootstrap(&html)
    }

    /// Apply the preload and bootstrap steps only. Already-bootstrapped pages are left alone.
    pub fn inject_bootstrap(&self, html: &str) -> String {
        if html.contains(BOOTSTRAP_MARKER) {
            return html.to_string();
        }
        splice_before_head_close(html, &self.head_fragment)
    }
}

/// Inline script wiring the page to the real-time channel.
///
/// Rewritten pages carry a base href pointing at the origin, so the client
/// bundle is loaded from an absolute URL built on the page's own origin.
pub fn bootstrap_script(
    client_path: &str,
    socket_path: &str,
    trigger_element_id: &str,
    sync_hook: &str,
) -> String {
    let js = |s: &str| serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string());
    format!(
        r#"<script {marker}>
(function () {{
  var client = document.createElement("script");
  client.src = location.origin + {client};
  client.setAttribute("{marker}", "");
  client.onload = function () {{
    var channel = window.relay.connect({socket});
    channel.on("sync", function (value) {{
      {hook}
    }});
    document.addEventListener("click", function (e) {{
      if (e.target && e.target.id === {trigger}) {{
        channel.emit("click");
      }}
    }});
  }};
  document.head.appendChild(client);
}})();
</script>
"#,
        client = js(client_path),
        marker = BOOTSTRAP_MARKER,
        socket = js(socket_path),
        hook = sync_hook,
        trigger = js(trigger_element_id),
    )
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
