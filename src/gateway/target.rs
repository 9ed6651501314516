//! Origin addressing.

use url::Url;

use crate::config::OriginConfig;

/// Replace a leading path prefix before forwarding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathRewrite {
    pub from: String,
    pub to: String,
}

/// The origin being fronted. Immutable after startup.
#[derive(Debug, Clone)]
pub struct ProxyTarget {
    origin: Url,
    transformable_prefix: String,
    path_rewrite: Option<PathRewrite>,
    base_href: String,
}

impl ProxyTarget {
    pub fn new(
        origin: Url,
        transformable_prefix: impl Into<String>,
        path_rewrite: Option<PathRewrite>,
    ) -> Self {
        let mut target = Self {
            origin,
            transformable_prefix: transformable_prefix.into(),
            path_rewrite,
            base_href: String::new(),
        };
        target.base_href = target.upstream_url(&target.transformable_prefix, None).to_string();
        target
    }

    pub fn from_config(config: &OriginConfig) -> Result<Self, url::ParseError> {
        let origin = Url::parse(&config.base_url)?;
        let rewrite = config.path_rewrite.as_ref().map(|r| PathRewrite {
            from: r.from.clone(),
            to: r.to.clone(),
        });
        let mut target = Self::new(origin, config.transformable_prefix.clone(), rewrite);
        if let Some(href) = &config.base_href {
            target.base_href = href.clone();
        }
        Ok(target)
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Absolute URL for anchoring origin-relative assets in rewritten pages.
    pub fn base_href(&self) -> &str {
        &self.base_href
    }

    pub fn transformable_prefix(&self) -> &str {
        &self.transformable_prefix
    }

    /// True when HTML served for `path` is eligible for mutation.
    pub fn is_transformable(&self, path: &str) -> bool {
        path.starts_with(&self.transformable_prefix)
    }

    /// Origin URL for an inbound path and query.
    pub fn upstream_url(&self, path: &str, query: Option<&str>) -> Url {
        let path = match &self.path_rewrite {
            Some(rule) if path.starts_with(&rule.from) => {
                format!("{}{}", rule.to, &path[rule.from.len()..])
            }
            _ => path.to_string(),
        };

        let mut url = self.origin.clone();
        let base = self.origin.path().trim_end_matches('/');
        url.set_path(&format!("{}{}", base, path));
        url.set_query(query);
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_url_and_base_href() {
        let target = ProxyTarget::new(
            Url::parse("https://orteil.dashnet.org").unwrap(),
            "/cookieclicker/",
            None,
        );
        assert_eq!(
            target.upstream_url("/cookieclicker/main.js", Some("v=2")).as_str(),
            "https://orteil.dashnet.org/cookieclicker/main.js?v=2"
        );
        assert_eq!(target.base_href(), "https://orteil.dashnet.org/cookieclicker/");
        assert!(target.is_transformable("/cookieclicker/index.html"));
        assert!(!target.is_transformable("/img/favicon.ico"));
    }

    #[test]
    fn test_path_rewrite_and_origin_base_path() {
        let target = ProxyTarget::new(
            Url::parse("http://127.0.0.1:9000/mirror/").unwrap(),
            "/game/",
            Some(PathRewrite {
                from: "/game/".into(),
                to: "/cookieclicker/".into(),
            }),
        );
        assert_eq!(
            target.upstream_url("/game/style.css", None).as_str(),
            "http://127.0.0.1:9000/mirror/cookieclicker/style.css"
        );
        assert_eq!(target.base_href(), "http://127.0.0.1:9000/mirror/cookieclicker/");
    }
}
