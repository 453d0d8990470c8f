//! Extractor implementations

use super::types::CanonicalRecord;
use crate::types::RawRecord;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::LazyLock;

/// Quoted groups or bare words
static TAG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]+)"|(\S+)"#).unwrap());

/// Image fields in order of preference
const IMAGE_FIELDS: &[&str] = &[
    "picture_large",
    "picture_medium_large",
    "picture_medium",
    "picture_small",
    "picture_thumb",
];

/// Maps one raw record to its canonical form
pub trait Extractor: Send + Sync {
    /// `None` when a required field is missing
    fn extract(&self, raw: &RawRecord) -> Option<CanonicalRecord>;

    /// Extract every record that qualifies, keeping order
    fn extract_all(&self, raws: &[RawRecord]) -> Vec<CanonicalRecord> {
        raws.iter().filter_map(|raw| self.extract(raw)).collect()
    }
}

// ============================================================================
// Episodes
// ============================================================================

/// Extracts catalog episodes, keeping only those hosted on one media provider
#[derive(Debug, Clone)]
pub struct EpisodeExtractor {
    provider: String,
}

impl EpisodeExtractor {
    /// Require media from `provider` (e.g. "soundcloud")
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
        }
    }

    fn media_url(&self, raw: &RawRecord) -> Option<String> {
        raw.get("audio_sources")?
            .as_array()?
            .iter()
            .find(|source| source.get("source").and_then(Value::as_str) == Some(self.provider.as_str()))
            .and_then(|source| source.get("url"))
            .and_then(Value::as_str)
            .filter(|url| !url.is_empty())
            .map(String::from)
    }
}

impl Default for EpisodeExtractor {
    fn default() -> Self {
        Self::new("soundcloud")
    }
}

impl Extractor for EpisodeExtractor {
    fn extract(&self, raw: &RawRecord) -> Option<CanonicalRecord> {
        let media_url = self.media_url(raw)?;
        let natural_key = raw.get_str("episode_alias")?;

        let parent_alias = raw
            .parent
            .as_ref()
            .map(|p| p.alias.clone())
            .or_else(|| raw.get_str("show_alias").map(String::from));
        let parent_name = raw
            .parent
            .as_ref()
            .map(|p| p.display_name.clone())
            .or_else(|| parent_alias.clone());

        let media = raw.get("media");
        let image_url = IMAGE_FIELDS.iter().find_map(|field| {
            media?
                .get(*field)
                .and_then(Value::as_str)
                .filter(|url| !url.is_empty())
                .map(String::from)
        });

        Some(CanonicalRecord {
            natural_key: natural_key.to_string(),
            parent_alias,
            parent_name,
            title: raw.get_str("name").map(String::from),
            published_at: raw.get_str("broadcast").and_then(parse_timestamp),
            description: raw.get_str("description").map(String::from),
            descriptive_tags: value_set(raw.get("genres")),
            categorical_tags: value_set(raw.get("moods")),
            intensity: raw.get("intensity").and_then(scalar),
            location_short: raw.get_str("location_short").map(String::from),
            location_long: raw.get_str("location_long").map(String::from),
            duration_ms: None,
            is_streamable: None,
            play_count: None,
            media_url,
            image_url,
        })
    }
}

// ============================================================================
// Tracks
// ============================================================================

/// Extracts tracks from a cursor feed
///
/// Tracks that cannot be streamed are kept and flagged; their page URL is
/// still a valid media link.
#[derive(Debug, Clone, Default)]
pub struct TrackExtractor {
    /// Parent recorded on every track (the feed's account)
    account: Option<String>,
}

impl TrackExtractor {
    /// Create a track extractor
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the feed's account as every track's parent
    #[must_use]
    pub fn for_account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }
}

impl Extractor for TrackExtractor {
    fn extract(&self, raw: &RawRecord) -> Option<CanonicalRecord> {
        let media_url = raw.get_str("permalink_url")?.to_string();
        let natural_key = raw.get("id").and_then(scalar)?;

        let uploader = raw
            .get("user")
            .and_then(|user| user.get("username"))
            .and_then(Value::as_str)
            .map(String::from);

        let categorical_tags = raw
            .get_str("genre")
            .map(str::trim)
            .filter(|genre| !genre.is_empty())
            .map(|genre| BTreeSet::from([genre.to_string()]));

        Some(CanonicalRecord {
            natural_key,
            parent_alias: self.account.clone(),
            parent_name: uploader.or_else(|| self.account.clone()),
            title: raw.get_str("title").map(String::from),
            published_at: raw.get_str("created_at").and_then(parse_timestamp),
            description: raw.get_str("description").map(String::from),
            descriptive_tags: non_empty(parse_tags(raw.get_str("tag_list").unwrap_or_default())),
            categorical_tags,
            intensity: None,
            location_short: None,
            location_long: None,
            duration_ms: raw.get("duration").and_then(Value::as_u64),
            is_streamable: Some(raw.get("streamable").and_then(Value::as_bool).unwrap_or(true)),
            play_count: raw.get("playback_count").and_then(Value::as_u64),
            media_url,
            image_url: raw.get_str("artwork_url").map(String::from),
        })
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Split a tag list into tags, keeping double-quoted groups whole
///
/// `electronic "deep house" ambient` gives `electronic`, `deep house`, `ambient`.
pub fn parse_tags(tag_list: &str) -> Vec<String> {
    TAG_PATTERN
        .captures_iter(tag_list)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Collect `[{value: ..}]` entries into a set
fn value_set(entries: Option<&Value>) -> Option<BTreeSet<String>> {
    let values = entries?
        .as_array()?
        .iter()
        .filter_map(|entry| entry.get("value").and_then(Value::as_str))
        .filter(|value| !value.is_empty())
        .map(String::from);
    non_empty(values)
}

fn non_empty(values: impl IntoIterator<Item = String>) -> Option<BTreeSet<String>> {
    let set: BTreeSet<String> = values.into_iter().collect();
    (!set.is_empty()).then_some(set)
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// RFC 3339, or the `2013/03/07 18:34:38 +0000` form older feeds use
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y/%m/%d %H:%M:%S %z"))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}
