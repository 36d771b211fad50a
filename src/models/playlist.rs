use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Title used when an `#EXTINF` line carries no comma-separated title
pub const UNKNOWN_CHANNEL: &str = "Unknown Channel";

/// Single playable channel parsed from a provider playlist
///
/// Every field is defaulted on deserialization so cached entries written by
/// older builds (or carrying extra keys) still load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaylistItem {
    pub title: String,
    pub url: String,
    pub tvg_logo: String,
    pub group_title: String,
    pub user_agent: String,
    pub cookie: String,
    pub referer: String,
    /// Clearkey `kid:key` pair or license server URL
    pub license_string: String,
    pub is_drm: bool,
    /// Extra transport headers from the URL line (never user-agent/referer/cookie)
    pub headers: HashMap<String, String>,
}

/// Channel list as stored in the cache
///
/// `channels` holds the JSON-encoded item array as a string, `fetch_time`
/// the unix time (seconds) of the fetch that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelCacheEnvelope {
    #[serde(default)]
    pub channels: String,
    pub fetch_time: f64,
}

impl ChannelCacheEnvelope {
    pub fn new(items: &[PlaylistItem], fetch_time: f64) -> serde_json::Result<Self> {
        Ok(Self {
            channels: serde_json::to_string(items)?,
            fetch_time,
        })
    }

    /// Age of the envelope relative to `now` (seconds)
    pub fn age(&self, now: f64) -> f64 {
        now - self.fetch_time
    }

    /// Decode the embedded channel array
    ///
    /// Returns `None` when the payload is not a JSON array. Array entries that
    /// are not objects are skipped.
    pub fn decode_channels(&self) -> Option<Vec<PlaylistItem>> {
        let value: serde_json::Value = serde_json::from_str(&self.channels).ok()?;
        let entries = value.as_array()?;

        Some(
            entries
                .iter()
                .filter_map(|entry| PlaylistItem::deserialize(entry).ok())
                .collect(),
        )
    }
}
