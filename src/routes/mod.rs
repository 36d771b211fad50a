pub mod admin;
pub mod channels;
pub mod health;
pub mod providers;

use axum::{
    routing::{delete, get},
    Router,
};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::AppState;

/// Build the HTTP router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health endpoints
        .route("/", get(health::root))
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics))
        .route("/ready", get(health::ready))
        .route("/live", get(health::live))
        // Catalog endpoints
        .route("/api/providers", get(providers::list_providers))
        .route("/api/channels", get(channels::list_channels))
        // Admin endpoints (protected by ADMIN_KEY)
        .route("/api/admin/cache", delete(admin::purge_cache))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::Provider;
    use crate::services::cache::Cache;
    use crate::services::crypto::{Decryptor, PlaylistScheme};
    use crate::services::http::HttpFetcher;
    use crate::services::keys::KeyRing;
    use crate::services::providers::{channel_cache_key, CatalogService};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;
    use tower::ServiceExt;

    const UNREACHABLE: &str = "http://127.0.0.1:1/unreachable";
    const UNREACHABLE_PLAYLIST: &str = "http://127.0.0.1:1/list.m3u";

    fn test_state(admin_key: Option<&str>) -> Arc<AppState> {
        test_state_with(admin_key, Vec::new())
    }

    fn test_state_with(admin_key: Option<&str>, extra: Vec<Provider>) -> Arc<AppState> {
        let mut config = Config::from_env();
        config.admin_key = admin_key.map(str::to_string);

        let mut fallback = vec![
            Provider {
                title: "Listed".to_string(),
                image: String::new(),
                cat_link: "http://listed.example/list.m3u".to_string(),
            },
            Provider {
                title: "Hidden".to_string(),
                image: String::new(),
                cat_link: String::new(),
            },
            Provider {
                title: "Offline".to_string(),
                image: String::new(),
                cat_link: UNREACHABLE_PLAYLIST.to_string(),
            },
        ];
        fallback.extend(extra);

        let catalog = CatalogService::new(
            HttpFetcher::new("test-agent", 2),
            Cache::memory("routes", 24, 16),
            Decryptor::new(KeyRing::default(), PlaylistScheme::Embedded),
            UNREACHABLE,
            fallback,
            3600,
        );

        Arc::new(AppState {
            config,
            catalog: Arc::new(catalog),
            start_time: Instant::now(),
        })
    }

    async fn call(state: Arc<AppState>, method: &str, uri: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = router(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_providers_filters_missing_links() {
        let (status, body) = call(test_state(None), "GET", "/api/providers").await;
        assert_eq!(status, StatusCode::OK);

        let providers = body.as_array().unwrap();
        assert_eq!(providers.len(), 2);
        assert_eq!(providers[0]["title"], "Listed");
        assert_eq!(providers[0]["catLink"], "http://listed.example/list.m3u");
    }

    #[tokio::test]
    async fn test_channels_rejects_invalid_url() {
        let (status, _) = call(test_state(None), "GET", "/api/channels").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(test_state(None), "GET", "/api/channels?url=ftp://x").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_channels_fetch_failure_is_bad_gateway() {
        let uri = format!("/api/channels?url={}", UNREACHABLE_PLAYLIST);
        let (status, body) = call(test_state(None), "GET", &uri).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"].is_string());
    }

    /// Serve `body` at `/<path>` locally; returns the base URL and a hit counter
    async fn serve(path: &'static str, body: &'static str) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            path,
            get(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    body
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}", addr), hits)
    }

    #[tokio::test]
    async fn test_channels_rejects_unlisted_url_without_fetching() {
        let (base, hits) = serve("/internal", "DB_PASSWORD=hunter2\nAWS_SECRET=abc").await;
        let uri = format!("/api/channels?url={}/internal", base);

        let (status, body) = call(test_state(None), "GET", &uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(!body.to_string().contains("hunter2"));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_channels_serves_listed_provider() {
        let (base, hits) = serve("/list.m3u", "#EXTINF:-1,Listed One\nhttp://cdn.example/one.m3u8\n").await;
        let cat_link = format!("{}/list.m3u", base);
        let state = test_state_with(
            None,
            vec![Provider {
                title: "Local".to_string(),
                image: String::new(),
                cat_link: cat_link.clone(),
            }],
        );

        let uri = format!("/api/channels?url={}", cat_link);
        let (status, body) = call(state, "GET", &uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["title"], "Listed One");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_admin_purge_requires_key() {
        let state = test_state(Some("secret"));
        state.catalog.cache().set("channels_a", "{}").await;

        let (status, _) = call(state.clone(), "DELETE", "/api/admin/cache").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = call(state.clone(), "DELETE", "/api/admin/cache?key=wrong").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = call(
            state.clone(),
            "DELETE",
            "/api/admin/cache?key=secret&pattern=channels_%25",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["deleted"], 1);
        assert_eq!(body["pattern"], "channels_%");
    }

    #[tokio::test]
    async fn test_admin_disabled_without_configured_key() {
        let (status, _) = call(test_state(None), "DELETE", "/api/admin/cache?key=").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_health_reports_memory_backend() {
        let state = test_state(None);
        state
            .catalog
            .cache()
            .set(&channel_cache_key("http://a"), "{}")
            .await;

        let (status, body) = call(state, "GET", "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["cache"]["backend"], "memory");
        assert_eq!(body["cache"]["entries"], 1);
    }
}
