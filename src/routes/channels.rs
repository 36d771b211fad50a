use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::AppState;

/// Query params for the channel listing
#[derive(Debug, Deserialize)]
pub struct ChannelsQuery {
    /// Provider playlist URL (a provider's `catLink`)
    pub url: Option<String>,
}

/// GET /api/channels?url= - Parsed channels of one listed provider
pub async fn list_channels(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ChannelsQuery>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    let url = query.url.unwrap_or_default();
    if url.is_empty() || !url.starts_with("http") {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "Invalid URL" })),
        ));
    }

    // Only playlists of listed providers are fetched
    let listed = state
        .catalog
        .get_providers()
        .await
        .iter()
        .any(|provider| provider.has_playlist() && provider.cat_link == url);
    if !listed {
        tracing::warn!("Rejected channel request for unlisted URL {}", url);
        return Err((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "Unknown provider URL" })),
        ));
    }

    match state.catalog.get_channels(&url).await {
        Ok(channels) => Ok(Json(channels)),
        Err(e) => Err((
            StatusCode::BAD_GATEWAY,
            Json(serde_json::json!({ "error": format!("{:#}", e) })),
        )),
    }
}
