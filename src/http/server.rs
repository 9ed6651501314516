//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Build every subsystem from the validated configuration
//! - Create the Axum router (real-time endpoints, status, mirror, relay fallback)
//! - Wire up middleware (request id, tracing, timeout)
//! - Dispatch each request to the render path or the proxy path
//! - Serve until the shutdown signal fires

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Method, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use bytes::Bytes;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::cache::{CachePolicy, ResponseCache};
use crate::config::RelayConfig;
use crate::egress::{EgressParseError, EgressPool};
use crate::gateway::{Gateway, GatewayError, HtmlRewriter, ProxyTarget};
use crate::http::status::status_handler;
use crate::http::websocket::{client_bundle_handler, socket_handler};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::realtime::{BroadcastHub, BroadcastState, CLIENT_BUNDLE};
use crate::render::{BrowserEngine, ChromiumEngine, RenderOrchestrator, RenderOutcome, RenderRoute};
use crate::routing::{RouteKind, RouteTable};

/// Errors raised while assembling the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid URL in configuration: {0}")]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Egress(#[from] EgressParseError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("failed to read client bundle {path}: {source}")]
    ClientBundle {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    pub hub: BroadcastHub,
    pub render: Arc<RenderOrchestrator>,
    pub routes: Arc<RouteTable>,
    pub client_bundle: Bytes,
    /// Fired once the server starts draining; open websocket sessions close on it.
    pub sessions: Shutdown,
}

/// HTTP server for the relay.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a server whose render routes use headless Chromium.
    pub fn new(config: RelayConfig) -> Result<Self, ServerError> {
        let engine = Arc::new(ChromiumEngine::from_config(&config.render));
        Self::with_engine(config, engine)
    }

    /// Create a server with an explicit browser engine.
    pub fn with_engine(
        config: RelayConfig,
        engine: Arc<dyn BrowserEngine>,
    ) -> Result<Self, ServerError> {
        let target = ProxyTarget::from_config(&config.origin)?;
        let rewriter = HtmlRewriter::from_config(target.base_href(), &config.rewrite, &config.realtime);
        let cache = config
            .cache
            .enabled
            .then(|| ResponseCache::new(CachePolicy::from_config(&config.cache)));
        let gateway = Gateway::new(target, rewriter, cache, &config.timeouts)?;

        let egress = Arc::new(EgressPool::from_descriptors(&config.egress.entries)?);
        let render = RenderOrchestrator::new(
            engine,
            egress.clone(),
            &config.render,
            &config.captcha,
            gateway.target().base_href(),
        );
        let routes = RouteTable::from_config(&config.render)?;

        let client_bundle = match &config.realtime.client_bundle_file {
            Some(path) => Bytes::from(std::fs::read(path).map_err(|source| {
                ServerError::ClientBundle {
                    path: path.clone(),
                    source,
                }
            })?),
            None => Bytes::from_static(CLIENT_BUNDLE.as_bytes()),
        };

        let (hub, _) =
            BroadcastHub::spawn_with_capacity(BroadcastState::new(0), config.realtime.outbox_capacity);

        tracing::info!(
            origin = %gateway.target().origin(),
            transformable_prefix = %gateway.target().transformable_prefix(),
            render_routes = config.render.routes.len(),
            egress_entries = egress.len(),
            cache_enabled = gateway.cache().is_some(),
            "Relay assembled"
        );

        let state = AppState {
            gateway: Arc::new(gateway),
            hub,
            render: Arc::new(render),
            routes: Arc::new(routes),
            client_bundle,
            sessions: Shutdown::new(),
        };

        let router = Self::build_router(&config, state.clone());
        Ok(Self { router, state })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &RelayConfig, state: AppState) -> Router {
        let mut router = Router::new()
            .route(&config.realtime.socket_path, get(socket_handler))
            .route(&config.realtime.client_path, get(client_bundle_handler))
            .route("/__relay/status", get(status_handler));

        if let Some(mirror) = &config.mirror {
            let prefix = mirror.path_prefix.trim_end_matches('/');
            if prefix.is_empty() {
                tracing::warn!("Mirror path prefix must not be '/'; mirror disabled");
            } else {
                tracing::info!(prefix = %prefix, dir = %mirror.dir, "Serving local asset mirror");
                router = router.nest_service(prefix, ServeDir::new(&mirror.dir));
            }
        }

        router
            .fallback(relay_handler)
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let sessions = self.state.sessions.clone();
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!(
                    open_sessions = sessions.receiver_count(),
                    "Shutdown signal received"
                );
                sessions.trigger();
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn render(&self) -> Arc<RenderOrchestrator> {
        self.state.render.clone()
    }

    pub fn hub(&self) -> BroadcastHub {
        self.state.hub.clone()
    }
}

/// Everything not claimed by a dedicated route: render routes, then the origin.
async fn relay_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    tracing::debug!(
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
        "Relaying request"
    );

    match state.routes.classify(&request) {
        RouteKind::Render(route) => render_or_fallback(&state, &route, &request_id, request).await,
        RouteKind::Proxy => match state.gateway.forward(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(request_id = %request_id, error = %e, "Proxy request failed");
                e.into_response()
            }
        },
    }
}

async fn render_or_fallback(
    state: &AppState,
    route: &RenderRoute,
    request_id: &str,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    match state.render.render(route).await {
        RenderOutcome::Rendered(snapshot) => {
            tracing::info!(
                request_id = %request_id,
                route = %route.path,
                egress = ?snapshot.egress.as_ref().map(|e| e.to_string()),
                elapsed_ms = snapshot.elapsed.as_millis() as u64,
                "Serving rendered snapshot"
            );
            let html = state.gateway.rewriter().inject_bootstrap(&snapshot.html);
            metrics::record_request("GET", 200, "render", start);
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8")),
                    (header::CACHE_CONTROL, HeaderValue::from_static("no-store")),
                ],
                html,
            )
                .into_response()
        }
        RenderOutcome::Unavailable(reason) => {
            let fallback = route.fallback_path();
            tracing::info!(
                request_id = %request_id,
                route = %route.path,
                reason = %reason,
                fallback = %fallback,
                "Render unavailable; falling back to proxy"
            );
            let (parts, _) = request.into_parts();
            match state
                .gateway
                .forward_path(&Method::GET, &fallback, &parts.headers, Body::empty())
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(request_id = %request_id, error = %e, "Fallback proxy failed");
                    e.into_response()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use tower::ServiceExt;

    fn server() -> HttpServer {
        // Nothing listens on a port that was just released.
        let addr = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let mut config = RelayConfig::default();
        config.origin.base_url = format!("http://{}", addr);
        config.observability.metrics_enabled = false;
        HttpServer::with_engine(config, Arc::new(ChromiumEngine::default())).unwrap()
    }

    #[tokio::test]
    async fn test_client_bundle_route() {
        let server = server();
        let res = server
            .router
            .clone()
            .oneshot(Request::get("/realtime/client.js").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers()[header::CONTENT_TYPE],
            "application/javascript; charset=utf-8"
        );
        assert!(res.headers().contains_key("x-request-id"));
        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body, Bytes::from_static(CLIENT_BUNDLE.as_bytes()));
    }

    #[tokio::test]
    async fn test_non_get_on_render_route_is_proxied() {
        let server = server();
        let res = server
            .router
            .clone()
            .oneshot(
                Request::post("/live/")
                    .body(Body::from("x"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(server.render().active_sessions(), 0);
    }

    #[tokio::test]
    async fn test_missing_client_bundle_file_is_an_error() {
        let mut config = RelayConfig::default();
        config.realtime.client_bundle_file = Some("/nonexistent/relay-client.js".into());
        let err = HttpServer::with_engine(config, Arc::new(ChromiumEngine::default()))
            .err()
            .expect("missing bundle must fail");
        assert!(matches!(err, ServerError::ClientBundle { .. }));
    }
}
