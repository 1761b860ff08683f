//! HTTP server for the Prometheus metrics and health endpoints.
//!
//! Runs on a separate tokio task next to the WebSocket gateway.

use crate::state::HubHandle;
use axum::extract::State;
use axum::{Json, Router, routing::get};
use serde::Serialize;
use std::net::SocketAddr;

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    connected_users: usize,
}

/// Handler for GET /metrics - returns Prometheus metrics in text format.
async fn metrics_handler() -> String {
    crate::metrics::gather_metrics()
}

/// Handler for GET /healthz - liveness plus the hub's current size.
async fn health_handler(State(hub): State<HubHandle>) -> Json<Health> {
    Json(Health {
        status: "ok",
        connected_users: hub.len().await,
    })
}

/// Build the HTTP app.
pub fn app(hub: HubHandle) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(health_handler))
        .with_state(hub)
}

/// Run the HTTP server.
///
/// Binds to `0.0.0.0:port`. This is a long-running task that should be
/// spawned in the background.
pub async fn run_http_server(port: u16, hub: HubHandle) {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("HTTP metrics server listening on {}", addr);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind HTTP server on {}: {}", addr, e);
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app(hub)).await {
        tracing::error!("HTTP server error: {}", e);
    }
}
