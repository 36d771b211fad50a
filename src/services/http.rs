use anyhow::{bail, Context, Result};
use reqwest::Client;
use std::time::Duration;

/// Single-attempt, timeout-bounded GET returning the body as text
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(timeout_secs))
            .gzip(true)
            .build()
            .expect("Failed to create HTTP client");

        Self { client }
    }

    /// Fetch `url`; timeouts and non-2xx statuses are errors
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;

        let status = resp.status();
        if !status.is_success() {
            let friendly = match status {
                reqwest::StatusCode::NOT_FOUND => "Not found (404)".to_string(),
                reqwest::StatusCode::FORBIDDEN => "Access denied (403)".to_string(),
                reqwest::StatusCode::TOO_MANY_REQUESTS => "Rate limited (429)".to_string(),
                _ => {
                    let reason = status.canonical_reason().unwrap_or("Error");
                    format!("HTTP {}: {}", status.as_u16(), reason)
                }
            };
            bail!("{} fetching {}", friendly, url);
        }

        resp.text()
            .await
            .with_context(|| format!("Failed to read body from {}", url))
    }
}
