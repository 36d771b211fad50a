//! Provider catalog and channel playlist pipeline
//!
//! fetch → decrypt → parse → cache, one sequential chain per call.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

use crate::models::{ChannelCacheEnvelope, PlaylistItem, Provider};
use crate::services::cache::Cache;
use crate::services::crypto::Decryptor;
use crate::services::http::HttpFetcher;
use crate::services::m3u_parser::parse_m3u;
use crate::services::metrics::{record_cache, record_fetch_failure};

pub const PROVIDERS_CACHE_KEY: &str = "cricfy_providers";

/// Cache key for a provider's channel list: `channels_<sha256 hex of url>`
pub fn channel_cache_key(provider_url: &str) -> String {
    format!("channels_{:x}", Sha256::digest(provider_url.as_bytes()))
}

fn now_secs() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Provider/channel fetcher
pub struct CatalogService {
    http: HttpFetcher,
    cache: Cache,
    decryptor: Decryptor,
    catalog_url: String,
    fallback_providers: Vec<Provider>,
    channel_ttl_secs: u64,
}

impl CatalogService {
    pub fn new(
        http: HttpFetcher,
        cache: Cache,
        decryptor: Decryptor,
        catalog_url: &str,
        fallback_providers: Vec<Provider>,
        channel_ttl_secs: u64,
    ) -> Self {
        Self {
            http,
            cache,
            decryptor,
            catalog_url: catalog_url.to_string(),
            fallback_providers,
            channel_ttl_secs,
        }
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Fetch the provider catalog
    ///
    /// Never fails: any fetch, decryption or shape problem yields the
    /// fallback list. Only a successfully decoded catalog is cached.
    pub async fn get_providers(&self) -> Vec<Provider> {
        if let Some(cached) = self.cache.get(PROVIDERS_CACHE_KEY).await {
            match Provider::list_from_json(&cached) {
                Some(providers) => {
                    record_cache("providers", "hit");
                    return providers;
                }
                None => tracing::warn!("Cached provider list is not a JSON array, refetching"),
            }
        }

        record_cache("providers", "miss");
        tracing::info!("[Cache Miss] Fetching providers from remote URL");

        let payload = match self.http.fetch_text(&self.catalog_url).await {
            Ok(body) if !body.trim().is_empty() => body,
            Ok(_) => {
                tracing::warn!("Provider catalog response was empty");
                return self.fallback_providers.clone();
            }
            Err(e) => {
                tracing::error!("Error fetching providers: {:#}", e);
                record_fetch_failure("catalog");
                return self.fallback_providers.clone();
            }
        };

        let Some(decrypted) = self.decryptor.catalog(&payload) else {
            return self.fallback_providers.clone();
        };

        let Some(providers) = Provider::list_from_json(&decrypted) else {
            tracing::error!("Decrypted provider catalog is not a JSON array");
            return self.fallback_providers.clone();
        };

        self.cache.set(PROVIDERS_CACHE_KEY, &decrypted).await;
        tracing::info!(providers = providers.len(), "Providers cached successfully");

        providers
    }

    /// Fetch and parse the channels of one provider
    ///
    /// Cached lists younger than the channel TTL are served without a fetch.
    /// Transport failures propagate to the caller.
    pub async fn get_channels(&self, provider_url: &str) -> Result<Vec<PlaylistItem>> {
        let cache_key = channel_cache_key(provider_url);

        if let Some(channels) = self.read_cached_channels(&cache_key).await {
            return Ok(channels);
        }

        tracing::info!("[Cache Miss] Fetching M3U URL ({}) content", provider_url);

        let body = self.http.fetch_text(provider_url).await.map_err(|e| {
            tracing::error!("Error fetching M3U URL ({}) content: {:#}", provider_url, e);
            record_fetch_failure("playlist");
            e
        })?;

        let content = self.decryptor.playlist(&body);
        let channels = parse_m3u(&content);

        let envelope = ChannelCacheEnvelope::new(&channels, now_secs())
            .context("Failed to encode channel list")?;
        let encoded = serde_json::to_string(&envelope).context("Failed to encode channel list")?;
        self.cache.set(&cache_key, &encoded).await;

        tracing::info!(
            channels = channels.len(),
            "Channels cached for {}",
            provider_url
        );

        Ok(channels)
    }

    async fn read_cached_channels(&self, cache_key: &str) -> Option<Vec<PlaylistItem>> {
        let raw = self.cache.get(cache_key).await?;

        let envelope: ChannelCacheEnvelope = match serde_json::from_str(&raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!("Discarding malformed channel cache entry: {}", e);
                record_cache("channels", "miss");
                return None;
            }
        };

        if envelope.age(now_secs()) > self.channel_ttl_secs as f64 {
            record_cache("channels", "expired");
            return None;
        }

        match envelope.decode_channels() {
            Some(channels) => {
                record_cache("channels", "hit");
                Some(channels)
            }
            None => {
                record_cache("channels", "miss");
                None
            }
        }
    }
}
