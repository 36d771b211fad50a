use lazy_static::lazy_static;
use prometheus::{register_int_counter_vec, IntCounterVec};

lazy_static! {
    /// Cache lookups by cache kind ("providers", "channels") and outcome ("hit", "miss", "expired")
    pub static ref CACHE_LOOKUPS: IntCounterVec = register_int_counter_vec!(
        "cricfy_cache_lookups_total",
        "Cache lookups by kind and outcome",
        &["kind", "outcome"]
    )
    .unwrap();

    /// Decrypt attempts by strategy and outcome ("ok", "failed", "passthrough")
    pub static ref DECRYPT_RESULTS: IntCounterVec = register_int_counter_vec!(
        "cricfy_decrypt_results_total",
        "Decryption outcomes by strategy",
        &["strategy", "outcome"]
    )
    .unwrap();

    /// Upstream fetch failures by target ("catalog", "playlist")
    pub static ref FETCH_FAILURES: IntCounterVec = register_int_counter_vec!(
        "cricfy_fetch_failures_total",
        "Failed upstream fetches",
        &["target"]
    )
    .unwrap();
}

pub fn record_cache(kind: &str, outcome: &str) {
    CACHE_LOOKUPS.with_label_values(&[kind, outcome]).inc();
}

pub fn record_decrypt(strategy: &str, outcome: &str) {
    DECRYPT_RESULTS.with_label_values(&[strategy, outcome]).inc();
}

pub fn record_fetch_failure(target: &str) {
    FETCH_FAILURES.with_label_values(&[target]).inc();
}
