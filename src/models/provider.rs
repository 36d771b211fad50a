use serde::{Deserialize, Serialize};

const DEFAULT_PROVIDER_TITLE: &str = "Unknown";
const DEFAULT_PROVIDER_IMAGE: &str =
    "https://www.iconexperience.com/_img/v_collection_png/256x256/shadow/unknown.png";

fn default_title() -> String {
    DEFAULT_PROVIDER_TITLE.to_string()
}

fn default_image() -> String {
    DEFAULT_PROVIDER_IMAGE.to_string()
}

/// Streaming provider entry from the decrypted catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_image")]
    pub image: String,
    /// Playlist URL for this provider
    #[serde(default)]
    pub cat_link: String,
}

impl Provider {
    /// Only providers with an http(s) playlist link can be listed
    pub fn has_playlist(&self) -> bool {
        self.cat_link.starts_with("http")
    }

    /// Decode a catalog JSON document
    ///
    /// Returns `None` unless the document is a JSON array. Entries that are not
    /// objects are dropped.
    pub fn list_from_json(json: &str) -> Option<Vec<Provider>> {
        let value: serde_json::Value = serde_json::from_str(json).ok()?;
        let entries = value.as_array()?;

        Some(
            entries
                .iter()
                .filter_map(|entry| Provider::deserialize(entry).ok())
                .collect(),
        )
    }
}
