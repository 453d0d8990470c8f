//! Page types
//!
//! Defines the transient page shape produced for every fetch.

use crate::types::RawRecord;

/// One decoded page of an upstream listing; never persisted
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPage {
    /// Records on this page, in upstream order
    pub items: Vec<RawRecord>,
    /// Total the upstream reports for the whole listing, if it reports one
    pub reported_total: Option<u64>,
    /// Opaque continuation (a full URL), if any
    pub next_cursor: Option<String>,
}

impl RawPage {
    /// Number of records on the page
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the page has no records
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Where a listing response keeps its records, total, and continuation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLayout {
    /// Dotted path to the records array
    pub records_path: String,
    /// Dotted path to the reported total
    pub total_path: Option<String>,
    /// Dotted path to the next-page URL
    pub next_path: Option<String>,
}

impl PageLayout {
    /// Offset listings: `results[]` with `metadata.resultset.count`
    pub fn offset_results() -> Self {
        Self {
            records_path: "results".to_string(),
            total_path: Some("metadata.resultset.count".to_string()),
            next_path: None,
        }
    }

    /// Cursor listings: `collection[]` with `next_href`
    pub fn cursor_collection() -> Self {
        Self {
            records_path: "collection".to_string(),
            total_path: None,
            next_path: Some("next_href".to_string()),
        }
    }
}
