//! Admin endpoints for cache maintenance

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::AppState;

/// Query params for cache purges
#[derive(Debug, Deserialize)]
pub struct PurgeQuery {
    /// Admin key for authorization (simple protection)
    pub key: Option<String>,
    /// SQL LIKE pattern over bare cache keys; defaults to everything
    pub pattern: Option<String>,
}

/// Response for cache purges
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeResponse {
    pub success: bool,
    pub pattern: String,
    pub deleted: usize,
}

/// Validate admin key; admin routes are disabled when no key is configured
fn validate_admin_key(state: &AppState, provided_key: Option<&str>) -> bool {
    match (state.config.admin_key.as_deref(), provided_key) {
        (Some(expected), Some(key)) => key == expected,
        _ => false,
    }
}

/// DELETE /api/admin/cache - Delete cache entries matching a pattern
pub async fn purge_cache(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PurgeQuery>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    if !validate_admin_key(&state, query.key.as_deref()) {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "Invalid or missing admin key" })),
        ));
    }

    let pattern = query
        .pattern
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| "%".to_string());

    let deleted = state.catalog.cache().delete(&pattern).await.map_err(|e| {
        tracing::error!("Cache purge failed for {}: {}", pattern, e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": format!("Failed to purge cache: {}", e) })),
        )
    })?;

    tracing::info!("Admin: purged {} cache entries matching {}", deleted, pattern);

    Ok(Json(PurgeResponse {
        success: true,
        pattern,
        deleted,
    }))
}
