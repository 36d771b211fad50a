use axum::{extract::State, response::IntoResponse, Json};
use std::sync::Arc;

use crate::models::Provider;
use crate::AppState;

/// GET /api/providers - Providers that expose a playlist link
pub async fn list_providers(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let providers: Vec<Provider> = state
        .catalog
        .get_providers()
        .await
        .into_iter()
        .filter(Provider::has_playlist)
        .collect();

    Json(providers)
}
