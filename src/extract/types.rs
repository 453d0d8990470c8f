//! Canonical record type

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The normalized, persisted form of a child record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    /// Globally unique key; upserts overwrite on it
    pub natural_key: String,
    /// Alias of the owning parent
    pub parent_alias: Option<String>,
    /// Display name of the owning parent
    pub parent_name: Option<String>,
    pub title: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub description: Option<String>,
    /// Free-form tags (genres, tag lists); `None` rather than empty
    pub descriptive_tags: Option<BTreeSet<String>>,
    /// Coarse categories (moods, genre); `None` rather than empty
    pub categorical_tags: Option<BTreeSet<String>>,
    pub intensity: Option<String>,
    pub location_short: Option<String>,
    pub location_long: Option<String>,
    pub duration_ms: Option<u64>,
    /// Whether the provider lets the media be played in place
    pub is_streamable: Option<bool>,
    pub play_count: Option<u64>,
    /// Media page URL; records without one are never produced
    pub media_url: String,
    pub image_url: Option<String>,
}

impl CanonicalRecord {
    /// Create a record with only the required fields set
    pub fn new(natural_key: impl Into<String>, media_url: impl Into<String>) -> Self {
        Self {
            natural_key: natural_key.into(),
            parent_alias: None,
            parent_name: None,
            title: None,
            published_at: None,
            description: None,
            descriptive_tags: None,
            categorical_tags: None,
            intensity: None,
            location_short: None,
            location_long: None,
            duration_ms: None,
            is_streamable: None,
            play_count: None,
            media_url: media_url.into(),
            image_url: None,
        }
    }

    /// Set the owning parent
    #[must_use]
    pub fn with_parent(mut self, alias: impl Into<String>, name: impl Into<String>) -> Self {
        self.parent_alias = Some(alias.into());
        self.parent_name = Some(name.into());
        self
    }
}
