use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

use crate::models::playlist::{PlaylistItem, UNKNOWN_CHANNEL};

const EXTINF: &str = "#EXTINF";
const EXTVLCOPT: &str = "#EXTVLCOPT";
const EXTHTTP: &str = "#EXTHTTP";
const LICENSE_KEY_PROP: &str = "#KODIPROP:inputstream.adaptive.license_key=";

lazy_static! {
    /// Regex to parse EXTINF attributes (key="value" or key=value up to the next comma)
    static ref ATTR_REGEX: Regex = Regex::new(r#"([a-zA-Z0-9_-]+)=("[^"]*"|[^,]+)"#).unwrap();
}

/// Parsed EXTINF line data
#[derive(Debug, Default)]
struct ExtinfData {
    attributes: HashMap<String, String>,
    title: String,
}

/// Metadata seen since the last URL line, applied to the next item
#[derive(Debug, Default)]
struct PendingAttributes {
    user_agent: Option<String>,
    cookie: Option<String>,
    referer: Option<String>,
    license_string: Option<String>,
    extinf: Option<ExtinfData>,
}

impl PendingAttributes {
    /// Build the item for `url_line` and reset the buffer
    fn take_item(&mut self, url_line: &str) -> Option<PlaylistItem> {
        let pending = std::mem::take(self);

        let mut item = PlaylistItem {
            title: UNKNOWN_CHANNEL.to_string(),
            ..Default::default()
        };

        if let Some(ua) = non_empty(pending.user_agent) {
            item.user_agent = ua;
        }
        if let Some(cookie) = non_empty(pending.cookie) {
            item.cookie = cookie;
        }
        if let Some(referer) = non_empty(pending.referer) {
            item.referer = referer;
        }
        if let Some(license) = non_empty(pending.license_string) {
            item.license_string = license;
            item.is_drm = true;
        }
        if let Some(mut extinf) = pending.extinf {
            if let Some(logo) = extinf.attributes.remove("tvg-logo") {
                item.tvg_logo = logo;
            }
            if let Some(group) = extinf.attributes.remove("group-title") {
                item.group_title = group;
            }
            if !extinf.title.is_empty() {
                item.title = extinf.title;
            }
        }

        match url_line.split_once('|') {
            Some((url, params)) => {
                item.url = url.to_string();
                apply_url_params(&mut item, params);
            }
            None => item.url = url_line.to_string(),
        }

        if item.url.is_empty() {
            tracing::debug!("Skipping playlist entry without URL: {}", url_line);
            return None;
        }

        Some(item)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Parse an EXTINF line
/// Format: #EXTINF:duration tvg-logo="..." group-title="...",Title
fn parse_extinf(line: &str) -> ExtinfData {
    let attributes = ATTR_REGEX
        .captures_iter(line)
        .map(|caps| {
            let key = caps[1].to_string();
            let value = caps[2].trim_matches('"').to_string();
            (key, value)
        })
        .collect();

    // Title is everything after the last comma
    let title = match line.rsplit_once(',') {
        Some((_, title)) => title.trim().to_string(),
        None => UNKNOWN_CHANNEL.to_string(),
    };

    ExtinfData { attributes, title }
}

/// Pipe parameters: `url|User-Agent=..&Referer=..&X-Header=..`
fn apply_url_params(item: &mut PlaylistItem, params: &str) {
    for param in params.split('&') {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };

        match key.to_ascii_lowercase().as_str() {
            "user-agent" => item.user_agent = value.to_string(),
            "referer" => item.referer = value.to_string(),
            "cookie" => item.cookie = value.to_string(),
            _ => {
                item.headers.insert(key.to_string(), value.to_string());
            }
        }
    }
}

/// Parse `#EXTHTTP:{"cookie": "...", "user-agent": "..."}`
fn parse_exthttp(line: &str, pending: &mut PendingAttributes) {
    let json = line
        .strip_prefix("#EXTHTTP:")
        .or_else(|| line.strip_prefix(EXTHTTP))
        .unwrap_or(line);

    let Ok(serde_json::Value::Object(fields)) = serde_json::from_str::<serde_json::Value>(json)
    else {
        return;
    };

    if let Some(cookie) = fields.get("cookie").and_then(|v| v.as_str()) {
        pending.cookie = Some(cookie.to_string());
    }
    if let Some(ua) = fields.get("user-agent").and_then(|v| v.as_str()) {
        pending.user_agent = Some(ua.to_string());
    }
}

/// Parse decrypted playlist text into channel items, in source order
///
/// Directive lines before a URL line describe that URL. Comment-only input
/// yields no items.
pub fn parse_m3u(content: &str) -> Vec<PlaylistItem> {
    let mut items = Vec::new();
    let mut pending = PendingAttributes::default();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line.starts_with(EXTINF) {
            pending.extinf = Some(parse_extinf(line));
        } else if line.starts_with(EXTVLCOPT) {
            if let Some((_, ua)) = line.split_once("http-user-agent=") {
                pending.user_agent = Some(ua.to_string());
            }
            if let Some((_, referer)) = line.split_once("http-referrer=") {
                pending.referer = Some(referer.to_string());
            }
        } else if line.starts_with(EXTHTTP) {
            parse_exthttp(line, &mut pending);
        } else if line.starts_with(LICENSE_KEY_PROP) {
            if let Some((_, license)) = line.split_once('=') {
                pending.license_string = Some(license.to_string());
            }
        } else if !line.starts_with('#') {
            if let Some(item) = pending.take_item(line) {
                items.push(item);
            }
        }
    }

    items
}
