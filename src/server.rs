//! # HTTP Server
//!
//! Health and metrics endpoints of the controller:
//! - `/metrics` - Prometheus text exposition of [`REGISTRY`](crate::observability::metrics::REGISTRY)
//! - `/healthz` - liveness, 200 while the process serves HTTP
//! - `/readyz` - readiness, 200 once the listener is bound and the System,
//!   Library and GlobalDatasource controllers are running
//!
//! The port comes from `METRICS_PORT` (see [`ServerConfig`](crate::config::ServerConfig)).

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus::{Encoder, TextEncoder};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Readiness flags shared between the server and the watch loop
#[derive(Debug, Default)]
pub struct ServerState {
    /// Set once the HTTP listener is bound
    pub listening: AtomicBool,
    /// Set while the controllers consume their watch streams
    pub controllers_running: AtomicBool,
}

impl ServerState {
    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Relaxed)
    }

    pub fn set_controllers_running(&self, running: bool) {
        self.controllers_running.store(running, Ordering::Relaxed);
    }

    /// What still keeps the controller from being ready, if anything
    pub fn pending(&self) -> Option<&'static str> {
        if !self.listening.load(Ordering::Relaxed) {
            Some("http listener not bound")
        } else if !self.controllers_running.load(Ordering::Relaxed) {
            Some("controllers not running")
        } else {
            None
        }
    }
}

pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .route("/readyz", get(readyz_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until the process exits
pub async fn start_server(port: u16, state: Arc<ServerState>) -> Result<(), anyhow::Error> {
    let app = router(Arc::clone(&state));

    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr).await?;

    info!("🌐 HTTP server listening on {}", addr);
    state.listening.store(true, Ordering::Relaxed);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = crate::observability::metrics::REGISTRY.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        buffer,
    )
}

async fn healthz_handler() -> impl IntoResponse {
    StatusCode::OK
}

async fn readyz_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    match state.pending() {
        None => (StatusCode::OK, "ok"),
        Some(reason) => (StatusCode::SERVICE_UNAVAILABLE, reason),
    }
}
