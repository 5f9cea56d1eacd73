//! Signal Server - WebSocket rendezvous for WebRTC peers
//!
//! Serves the [`rendezvous`] signaling core over axum:
//!
//! - `GET /ws` - signaling WebSocket (register / connect / offer / answer / candidate / disconnect)
//! - `GET /health` - status plus waiting and paired counts
//! - `GET /health/live` - liveness probe
//! - `GET /metrics` - connection and relay counters

pub mod config;
pub mod handlers;
pub mod metrics;

use std::sync::Arc;

use axum::{Router, routing::get};
use rendezvous::Switchboard;
use tower_http::trace::{MakeSpan, TraceLayer};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::metrics::ServerMetrics;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub switchboard: Arc<Switchboard>,
    pub metrics: Arc<ServerMetrics>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            switchboard: Arc::new(Switchboard::new()),
            metrics: Arc::new(ServerMetrics::new()),
            config: Arc::new(config),
        }
    }
}

/// Tags each request span with a fresh request id.
#[derive(Clone)]
struct RequestIdMakeSpan;

impl<B> MakeSpan<B> for RequestIdMakeSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> tracing::Span {
        let request_id = Uuid::new_v4().to_string();
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    }
}

/// Build the full HTTP/WebSocket router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(handlers::websocket_handler))
        .route("/health", get(handlers::health_handler))
        .route("/health/live", get(handlers::health_live_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .layer(TraceLayer::new_for_http().make_span_with(RequestIdMakeSpan))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_router_serves_health() {
        let app = router(AppState::new(ServerConfig::default()));
        let resp = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_router_unknown_path_is_404() {
        let app = router(AppState::new(ServerConfig::default()));
        let resp = app
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_ws_route_requires_upgrade() {
        let app = router(AppState::new(ServerConfig::default()));
        let resp = app
            .oneshot(Request::builder().uri("/ws").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(resp.status().is_client_error());
    }
}
