use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, middleware, routing::get};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::cache::WarmCache;
use crate::retriever::CacheAsideRetriever;
use crate::{config::AppConfig, handlers, middleware as app_middleware};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub retriever: Arc<CacheAsideRetriever>,
    /// Kept for the readiness check; `None` when the warm tier is not Redis.
    pub warm: Option<WarmCache>,
}

pub struct MarqueeServer {
    addr: SocketAddr,
    app: Router,
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/movie", get(handlers::get_movies))
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        .route("/metrics", get(handlers::prometheus_metrics))
        // Runs after routing so the route template is known
        .route_layer(middleware::from_fn(app_middleware::track_http))
        .with_state(state)
        // Outermost last: request id -> trace -> compression -> cors
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    let req_id = req
                        .extensions()
                        .get::<axum::http::HeaderValue>()
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = Empty,
                        request_id = %req_id
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(res.status().as_u16()),
                        );
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(middleware::from_fn(app_middleware::request_id))
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    /// Wire the tiers, origin client and retriever, then the router.
    pub async fn build(self) -> anyhow::Result<MarqueeServer> {
        let state = crate::build_state(&self.config).await?;
        Ok(MarqueeServer {
            addr: self.addr,
            app: build_app(state),
        })
    }
}

impl MarqueeServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    // Wait for Ctrl+C
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
