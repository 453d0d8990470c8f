//! Pagination types and traits
//!
//! Defines the core pagination abstractions used by both strategies.

use crate::decode::RawPage;
use serde::{Deserialize, Serialize};

/// One request the walker should issue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// URL to fetch (relative to the fetcher's base, or absolute)
    pub url: String,
    /// Offset requested, for offset strategies
    pub offset: Option<u64>,
    /// Leading items of the response already yielded by an earlier page
    pub skip: usize,
}

impl PageRequest {
    /// Request a URL verbatim
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            offset: None,
            skip: 0,
        }
    }
}

/// Result of processing a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPage {
    /// More pages available
    Continue(PageRequest),
    /// No more pages
    Done,
}

impl NextPage {
    /// Check if this is a done result
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Check if this is a continue result
    pub fn is_continue(&self) -> bool {
        matches!(self, Self::Continue(_))
    }
}

/// Tracks pagination progress; also the restart point of a walk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationState {
    /// Index of the first item not yet yielded (offset strategies)
    pub offset: u64,
    /// Stored continuation URL (cursor strategies)
    pub cursor: Option<String>,
    /// Items yielded so far
    pub total_fetched: u64,
    /// Pages fetched so far
    pub pages: u64,
    /// Latest total reported by the upstream
    pub reported_total: Option<u64>,
    /// Stopped because the next index lies beyond the offset ceiling
    pub ceiling_reached: bool,
    /// Is pagination complete?
    pub done: bool,
}

impl PaginationState {
    /// Create a new pagination state
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume an offset walk at a given index
    pub fn at_offset(offset: u64) -> Self {
        Self {
            offset,
            ..Default::default()
        }
    }

    /// Resume a cursor walk from a stored continuation
    pub fn from_cursor(cursor: impl Into<String>) -> Self {
        Self {
            cursor: Some(cursor.into()),
            ..Default::default()
        }
    }

    /// Mark pagination as complete
    pub fn mark_done(&mut self) {
        self.done = true;
    }

    /// Add to total fetched
    pub fn add_fetched(&mut self, count: u64) {
        self.total_fetched += count;
    }

    /// Items the upstream declares but the offset window cannot reach
    pub fn unreachable(&self) -> u64 {
        match self.reported_total {
            Some(total) if self.ceiling_reached => total.saturating_sub(self.offset),
            _ => 0,
        }
    }
}

/// Core trait for pagination strategies
pub trait Paginator: Send + Sync {
    /// First request for a (possibly resumed) state; `None` if nothing is reachable
    fn first_request(&self, state: &mut PaginationState) -> Option<PageRequest>;

    /// Record a fetched page (before skipped items are dropped) and decide what's next
    fn process_page(
        &self,
        page: &RawPage,
        request: &PageRequest,
        state: &mut PaginationState,
    ) -> NextPage;
}
