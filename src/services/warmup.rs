//! Startup cache maintenance
//!
//! Runs once as a background task: clears the whole namespace so stale
//! catalog data from a previous deployment is dropped, then prefetches the
//! provider list.

use std::sync::Arc;

use crate::services::providers::CatalogService;

/// Result of a warm-up run
#[derive(Debug, Default)]
pub struct WarmupResult {
    pub entries_cleared: usize,
    pub providers_fetched: usize,
    pub errors: Vec<String>,
}

impl WarmupResult {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Clear the cache and prefetch providers
pub async fn run_warmup(catalog: &CatalogService) -> WarmupResult {
    let mut result = WarmupResult::default();

    match catalog.cache().delete("%").await {
        Ok(count) => result.entries_cleared = count,
        Err(e) => {
            result.errors.push(format!("Cache clear failed: {}", e));
            tracing::error!("Warm-up: cache clear failed: {}", e);
        }
    }

    result.providers_fetched = catalog.get_providers().await.len();
    result
}

/// Start the warm-up task; meant to be passed to `tokio::spawn`
pub async fn start_warmup_task(catalog: Arc<CatalogService>) {
    tracing::info!("Starting cache warm-up");

    let result = run_warmup(&catalog).await;
    if !result.is_success() {
        for error in &result.errors {
            tracing::warn!("Warm-up error: {}", error);
        }
    }

    tracing::info!(
        "Warm-up complete: {} cache entries cleared, fetched {} providers",
        result.entries_cleared,
        result.providers_fetched
    );
}
