use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

use crate::models::Provider;
use crate::services::crypto::PlaylistScheme;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub port: u16,
    pub admin_key: Option<String>,

    // Catalog source
    pub catalog_url: Option<String>,
    pub catalog_url_file: PathBuf,
    pub fallback_providers_file: PathBuf,

    // Key material
    pub secret_files: Vec<PathBuf>,
    pub legacy_secret_file: Option<PathBuf>,
    pub playlist_scheme: PlaylistScheme,

    // Cache
    pub redis_url: Option<String>,
    pub cache_namespace: String,
    pub cache_ttl_hours: u64,
    pub cache_max_entries: usize,
    pub channel_cache_ttl_secs: u64,
    pub warm_cache_on_start: bool,

    // Fetching
    pub fetch_timeout_secs: u64,
    pub user_agent: String,
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed_or<T: std::str::FromStr + std::fmt::Display>(name: &str, default: T) -> T {
    parse_or(name, non_empty(name), default)
}

fn parse_or<T: std::str::FromStr + std::fmt::Display>(
    name: &str,
    value: Option<String>,
    default: T,
) -> T {
    let Some(raw) = value else {
        return default;
    };

    match raw.parse() {
        Ok(parsed) => parsed,
        Err(_) => {
            tracing::warn!("Invalid {}={:?}, using default {}", name, raw, default);
            default
        }
    }
}

fn bool_or(name: &str, default: bool) -> bool {
    match non_empty(name).map(|v| v.to_ascii_lowercase()) {
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
        _ => default,
    }
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self {
            // Server
            port: parsed_or("PORT", 3001),
            admin_key: non_empty("ADMIN_KEY"),

            // Catalog source
            catalog_url: non_empty("CATALOG_URL"),
            catalog_url_file: non_empty("CATALOG_URL_FILE")
                .unwrap_or_else(|| "resources/cricfy_url.txt".to_string())
                .into(),
            fallback_providers_file: non_empty("FALLBACK_PROVIDERS_FILE")
                .unwrap_or_else(|| "resources/fallback_providers.json".to_string())
                .into(),

            // Key material
            secret_files: vec![
                non_empty("SECRET1_FILE")
                    .unwrap_or_else(|| "resources/secret1.txt".to_string())
                    .into(),
                non_empty("SECRET2_FILE")
                    .unwrap_or_else(|| "resources/secret2.txt".to_string())
                    .into(),
            ],
            legacy_secret_file: non_empty("LEGACY_SECRET_FILE").map(PathBuf::from),
            playlist_scheme: parsed_or("PLAYLIST_SCHEME", PlaylistScheme::Embedded),

            // Cache
            redis_url: non_empty("REDIS_URL"),
            cache_namespace: non_empty("CACHE_NAMESPACE")
                .unwrap_or_else(|| "cricfy_plugin".to_string()),
            cache_ttl_hours: parsed_or("CACHE_TTL_HOURS", 24u64).max(1),
            cache_max_entries: parsed_or("CACHE_MAX_ENTRIES", 1024),
            channel_cache_ttl_secs: parsed_or("CHANNEL_CACHE_TTL_SECS", 3600), // 1 hour
            warm_cache_on_start: bool_or("WARM_CACHE_ON_START", true),

            // Fetching
            fetch_timeout_secs: parsed_or("FETCH_TIMEOUT_SECS", 15),
            user_agent: non_empty("USER_AGENT").unwrap_or_else(|| {
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                    .to_string()
            }),
        }
    }

    /// Resolve the catalog URL: `CATALOG_URL` wins, else the URL file
    pub fn resolve_catalog_url(&self) -> Result<String> {
        if let Some(url) = &self.catalog_url {
            return Ok(url.clone());
        }
        read_catalog_url(&self.catalog_url_file)
    }

    /// Fallback providers; a missing file yields an empty list
    pub fn load_fallback_providers(&self) -> Result<Vec<Provider>> {
        load_fallback_providers(&self.fallback_providers_file)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

fn read_catalog_url(path: &Path) -> Result<String> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog URL file {}", path.display()))?;
    let url = raw.trim();
    anyhow::ensure!(!url.is_empty(), "Catalog URL file {} is empty", path.display());
    Ok(url.to_string())
}

fn load_fallback_providers(path: &Path) -> Result<Vec<Provider>> {
    if !path.exists() {
        tracing::warn!(
            "Fallback providers file {} not found, using an empty list",
            path.display()
        );
        return Ok(Vec::new());
    }

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read fallback providers {}", path.display()))?;
    Provider::list_from_json(&raw).with_context(|| {
        format!(
            "Fallback providers file {} is not a JSON array",
            path.display()
        )
    })
}
