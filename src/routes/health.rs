use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;

/// Root endpoint - basic status
pub async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "Cricfy Server",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "runtime": "rust"
    }))
}

/// Cache stats
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CacheStats {
    backend: &'static str,
    reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    entries: Option<usize>,
}

/// Health check response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: String,
    uptime: u64,
    playlist_scheme: String,
    cache: CacheStats,
}

/// GET /health - Service health with cache backend status
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let cache = state.catalog.cache();
    let reachable = cache.ping().await;

    // The pipeline degrades to always-miss without a cache, so it never goes unhealthy
    let status = if reachable { "ok" } else { "degraded" };

    Json(HealthResponse {
        status: status.to_string(),
        uptime: state.start_time.elapsed().as_secs(),
        playlist_scheme: state.config.playlist_scheme.to_string(),
        cache: CacheStats {
            backend: cache.backend_name(),
            reachable,
            entries: cache.entry_count().await,
        },
    })
}

/// GET /metrics - Prometheus metrics
pub async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                b"Internal Server Error".to_vec(),
            )
        }
    }
}

/// Readiness probe (for Kubernetes)
pub async fn ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.catalog.cache().ping().await {
        (StatusCode::OK, "ready")
    } else {
        // Cache down: requests still served, just never cached
        (StatusCode::OK, "ready (cache degraded)")
    }
}

/// Liveness probe (for Kubernetes)
pub async fn live() -> impl IntoResponse {
    (StatusCode::OK, "alive")
}
