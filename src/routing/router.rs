//! Route classification.
//!
//! # Responsibilities
//! - Hold the render routes compiled from configuration
//! - Decide, per request, between the render path and the proxy path
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - First match wins, in configuration order
//! - Everything that is not a render route is proxied

use axum::body::Body;
use axum::http::{Method, Request};
use std::sync::Arc;

use crate::config::RenderConfig;
use crate::render::RenderRoute;
use crate::routing::matcher::{AndMatcher, ExactPathMatcher, Matcher, MethodMatcher};

/// Where a request is dispatched.
#[derive(Debug, Clone)]
pub enum RouteKind {
    Render(Arc<RenderRoute>),
    Proxy,
}

#[derive(Debug, Default)]
pub struct RouteTable {
    render: Vec<(AndMatcher, Arc<RenderRoute>)>,
}

impl RouteTable {
    pub fn new(routes: Vec<RenderRoute>) -> Self {
        let render = routes
            .into_iter()
            .map(|route| {
                let matcher = AndMatcher::new(vec![
                    Box::new(MethodMatcher::new([Method::GET])),
                    Box::new(ExactPathMatcher::new(route.path.clone())),
                ]);
                (matcher, Arc::new(route))
            })
            .collect();
        Self { render }
    }

    pub fn from_config(config: &RenderConfig) -> Result<Self, url::ParseError> {
        let routes = config
            .routes
            .iter()
            .map(RenderRoute::from_config)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(routes))
    }

    pub fn classify(&self, req: &Request<Body>) -> RouteKind {
        self.render
            .iter()
            .find(|(matcher, _)| matcher.matches(req))
            .map(|(_, route)| RouteKind::Render(route.clone()))
            .unwrap_or(RouteKind::Proxy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderRouteConfig;

    fn request(method: Method, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::default())
            .unwrap()
    }

    #[test]
    fn test_render_route_matches_get_only() {
        let table = RouteTable::from_config(&RenderConfig::default()).unwrap();

        match table.classify(&request(Method::GET, "/live/")) {
            RouteKind::Render(route) => assert_eq!(route.path, "/live/"),
            RouteKind::Proxy => panic!("expected render route"),
        }
        assert!(matches!(table.classify(&request(Method::POST, "/live/")), RouteKind::Proxy));
        assert!(matches!(
            table.classify(&request(Method::GET, "/cookieclicker/")),
            RouteKind::Proxy
        ));
    }

    #[test]
    fn test_first_match_wins() {
        let mut config = RenderConfig::default();
        let mut second = RenderRouteConfig::default();
        second.target_url = "https://other.test/".into();
        config.routes.push(second);

        let table = RouteTable::from_config(&config).unwrap();
        match table.classify(&request(Method::GET, "/live/")) {
            RouteKind::Render(route) => {
                assert_eq!(route.target_url.as_str(), "https://orteil.dashnet.org/cookieclicker/")
            }
            RouteKind::Proxy => panic!("expected render route"),
        }
    }

    #[test]
    fn test_empty_table_proxies_everything() {
        let table = RouteTable::default();
        assert!(matches!(table.classify(&request(Method::GET, "/live/")), RouteKind::Proxy));
    }
}
