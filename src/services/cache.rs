//! TTL key-value cache in front of the catalog and playlist fetches
//!
//! Keys live under a namespace (`<namespace>:<key>`). Two backends are
//! supported: an in-process LRU map and Redis. Backend failures never reach
//! callers: reads degrade to a miss and writes to a logged no-op.

use anyhow::Result;
use lru::LruCache;
use regex::Regex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::services::redis::RedisStore;

/// Stored value with its write time (unix millis)
#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    stored_at: i64,
}

/// In-process store with LRU eviction and a store-wide TTL
#[derive(Clone)]
pub struct MemoryStore {
    entries: Arc<Mutex<LruCache<String, CacheEntry>>>,
    ttl_ms: i64,
}

impl MemoryStore {
    pub fn new(max_entries: usize, ttl_hours: u64) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Arc::new(Mutex::new(LruCache::new(capacity))),
            ttl_ms: i64::try_from(ttl_hours)
                .unwrap_or(i64::MAX)
                .saturating_mul(3_600_000),
        }
    }

    async fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().await;
        let now = chrono::Utc::now().timestamp_millis();

        let expired = match entries.get(key) {
            Some(entry) if now - entry.stored_at <= self.ttl_ms => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };

        if expired {
            entries.pop(key);
        }
        None
    }

    async fn set(&self, key: &str, value: &str) {
        self.insert_entry(key, value, chrono::Utc::now().timestamp_millis())
            .await;
    }

    async fn insert_entry(&self, key: &str, value: &str, stored_at: i64) {
        let mut entries = self.entries.lock().await;
        entries.put(
            key.to_string(),
            CacheEntry {
                value: value.to_string(),
                stored_at,
            },
        );
    }

    async fn delete_matching(&self, namespace_prefix: &str, matcher: &Regex) -> usize {
        let mut entries = self.entries.lock().await;
        let doomed: Vec<String> = entries
            .iter()
            .filter_map(|(key, _)| {
                let bare = key.strip_prefix(namespace_prefix)?;
                matcher.is_match(bare).then(|| key.clone())
            })
            .collect();

        for key in &doomed {
            entries.pop(key);
        }
        doomed.len()
    }

    async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[derive(Clone)]
enum CacheBackend {
    Memory(MemoryStore),
    Redis(RedisStore),
}

/// Shortest store-level TTL; Redis rejects `SETEX 0`
const MIN_TTL_HOURS: u64 = 1;

/// Namespaced cache handle shared by the pipeline and the admin routes
#[derive(Clone)]
pub struct Cache {
    backend: CacheBackend,
    namespace: String,
    ttl_hours: u64,
}

impl Cache {
    /// In-process cache (entries lost on restart)
    pub fn memory(namespace: &str, ttl_hours: u64, max_entries: usize) -> Self {
        let ttl_hours = ttl_hours.max(MIN_TTL_HOURS);
        Self {
            backend: CacheBackend::Memory(MemoryStore::new(max_entries, ttl_hours)),
            namespace: namespace.to_string(),
            ttl_hours,
        }
    }

    /// Redis-backed cache shared across processes
    pub fn redis(namespace: &str, ttl_hours: u64, store: RedisStore) -> Self {
        Self {
            backend: CacheBackend::Redis(store),
            namespace: namespace.to_string(),
            ttl_hours: ttl_hours.max(MIN_TTL_HOURS),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self.backend {
            CacheBackend::Memory(_) => "memory",
            CacheBackend::Redis(_) => "redis",
        }
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }

    /// Read a value; backend errors read as a miss
    pub async fn get(&self, key: &str) -> Option<String> {
        let full_key = self.namespaced(key);
        match &self.backend {
            CacheBackend::Memory(store) => store.get(&full_key).await,
            CacheBackend::Redis(store) => match store.get(&full_key).await {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!("Cache read failed for {}: {}", key, e);
                    None
                }
            },
        }
    }

    /// Write a value under the store TTL; backend errors are logged and dropped
    pub async fn set(&self, key: &str, value: &str) {
        let full_key = self.namespaced(key);
        match &self.backend {
            CacheBackend::Memory(store) => store.set(&full_key, value).await,
            CacheBackend::Redis(store) => {
                let ttl_secs = self.ttl_hours.saturating_mul(3600);
                if let Err(e) = store.set_ex(&full_key, value, ttl_secs).await {
                    tracing::warn!("Cache write failed for {}: {}", key, e);
                }
            }
        }
    }

    /// Delete every key matching a SQL LIKE pattern (`%` clears the namespace)
    ///
    /// Returns the number of removed entries.
    pub async fn delete(&self, pattern: &str) -> Result<usize> {
        let removed = match &self.backend {
            CacheBackend::Memory(store) => {
                let matcher = like_to_regex(pattern)?;
                store
                    .delete_matching(&self.namespaced(""), &matcher)
                    .await
            }
            CacheBackend::Redis(store) => {
                let glob = format!(
                    "{}{}",
                    escape_glob(&self.namespaced("")),
                    like_to_glob(pattern)
                );
                store.delete_matching(&glob).await?
            }
        };

        tracing::info!(pattern = pattern, removed = removed, "Cache entries deleted");
        Ok(removed)
    }

    /// Backend reachability (always true for the in-process store)
    pub async fn ping(&self) -> bool {
        match &self.backend {
            CacheBackend::Memory(_) => true,
            CacheBackend::Redis(store) => store.ping().await.unwrap_or(false),
        }
    }

    /// Number of live entries, when the backend can tell cheaply
    pub async fn entry_count(&self) -> Option<usize> {
        match &self.backend {
            CacheBackend::Memory(store) => Some(store.len().await),
            CacheBackend::Redis(_) => None,
        }
    }
}

/// Translate a SQL LIKE pattern into an anchored regex
fn like_to_regex(pattern: &str) -> Result<Regex> {
    let mut re = String::from("(?s)^");
    for c in pattern.chars() {
        match c {
            '%' => re.push_str(".*"),
            '_' => re.push('.'),
            other => re.push_str(&regex::escape(other.encode_utf8(&mut [0u8; 4]))),
        }
    }
    re.push('$');
    Ok(Regex::new(&re)?)
}

/// Translate a SQL LIKE pattern into a Redis glob
fn like_to_glob(pattern: &str) -> String {
    pattern
        .chars()
        .map(|c| match c {
            '%' => "*".to_string(),
            '_' => "?".to_string(),
            other => escape_glob(other.encode_utf8(&mut [0u8; 4])),
        })
        .collect()
}

fn escape_glob(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_set_roundtrip() {
        let cache = Cache::memory("test", 24, 16);
        assert_eq!(cache.get("missing").await, None);

        cache.set("providers", "[]").await;
        assert_eq!(cache.get("providers").await.as_deref(), Some("[]"));

        cache.set("providers", "[1]").await;
        assert_eq!(cache.get("providers").await.as_deref(), Some("[1]"));
    }

    #[tokio::test]
    async fn test_store_ttl_expiry() {
        let store = MemoryStore::new(16, 24);
        let now = chrono::Utc::now().timestamp_millis();

        store.insert_entry("fresh", "a", now - 3_600_000).await;
        store.insert_entry("stale", "b", now - 25 * 3_600_000).await;

        assert_eq!(store.get("fresh").await.as_deref(), Some("a"));
        assert_eq!(store.get("stale").await, None);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_zero_ttl_is_clamped() {
        let cache = Cache::memory("test", 0, 16);
        assert_eq!(cache.ttl_hours, MIN_TTL_HOURS);

        cache.set("providers", "[]").await;
        assert_eq!(cache.get("providers").await.as_deref(), Some("[]"));
    }

    #[test]
    fn test_huge_ttl_does_not_wrap() {
        let store = MemoryStore::new(16, u64::MAX);
        assert_eq!(store.ttl_ms, i64::MAX);
    }

    #[tokio::test]
    async fn test_lru_capacity() {
        let cache = Cache::memory("test", 24, 2);
        cache.set("a", "1").await;
        cache.set("b", "2").await;
        cache.set("c", "3").await;

        assert_eq!(cache.get("a").await, None);
        assert_eq!(cache.entry_count().await, Some(2));
    }

    #[tokio::test]
    async fn test_delete_by_pattern() {
        let cache = Cache::memory("test", 24, 16);
        cache.set("cricfy_providers", "[]").await;
        cache.set("channels_abc", "{}").await;
        cache.set("channels_def", "{}").await;

        assert_eq!(cache.delete("channels_%").await.unwrap(), 2);
        assert!(cache.get("channels_abc").await.is_none());
        assert!(cache.get("cricfy_providers").await.is_some());

        assert_eq!(cache.delete("%").await.unwrap(), 1);
        assert_eq!(cache.entry_count().await, Some(0));
    }

    #[tokio::test]
    async fn test_delete_respects_namespace() {
        let store = MemoryStore::new(16, 24);
        let ours = Cache {
            backend: CacheBackend::Memory(store.clone()),
            namespace: "ours".to_string(),
            ttl_hours: 24,
        };
        let theirs = Cache {
            backend: CacheBackend::Memory(store),
            namespace: "theirs".to_string(),
            ttl_hours: 24,
        };

        ours.set("k", "1").await;
        theirs.set("k", "2").await;

        assert_eq!(ours.delete("%").await.unwrap(), 1);
        assert_eq!(theirs.get("k").await.as_deref(), Some("2"));
    }

    #[test]
    fn test_like_to_regex() {
        let re = like_to_regex("channels_%").unwrap();
        assert!(re.is_match("channels_abc"));
        assert!(re.is_match("channelsXabc"));
        assert!(!re.is_match("cricfy_providers"));

        let exact = like_to_regex("a.b").unwrap();
        assert!(exact.is_match("a.b"));
        assert!(!exact.is_match("axb"));

        assert!(like_to_regex("%").unwrap().is_match(""));
    }

    #[test]
    fn test_like_to_glob() {
        assert_eq!(like_to_glob("%"), "*");
        assert_eq!(like_to_glob("channels_%"), "channels?*");
        assert_eq!(like_to_glob("a*b[1]"), "a\\*b\\[1\\]");
    }
}
