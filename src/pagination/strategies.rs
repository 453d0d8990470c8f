//! Pagination strategy implementations
//!
//! Each strategy handles a specific pagination pattern.

use super::types::{NextPage, PageRequest, PaginationState, Paginator};
use crate::decode::RawPage;

// ============================================================================
// Offset Pagination
// ============================================================================

/// Offset-based pagination with an upstream offset ceiling
///
/// Requests `?limit=N&offset=K` with a fixed page size. When the next index
/// passes `max_offset`, one last page is requested at `max_offset` and its
/// already-yielded leading items are skipped, so exactly
/// `max_offset + page_size` items are reachable.
#[derive(Debug, Clone)]
pub struct OffsetPaginator {
    /// Listing path (no query string)
    pub path: String,
    /// Query parameter name for offset
    pub offset_param: String,
    /// Query parameter name for limit
    pub limit_param: String,
    /// Number of records per page
    pub page_size: u32,
    /// Largest offset the upstream accepts
    pub max_offset: Option<u32>,
    /// Extra query parameters appended after limit/offset (e.g. sort)
    pub extra_params: Vec<(String, String)>,
}

impl OffsetPaginator {
    /// Create a new offset paginator using `limit`/`offset` parameters
    pub fn new(path: impl Into<String>, page_size: u32) -> Self {
        Self {
            path: path.into(),
            offset_param: "offset".to_string(),
            limit_param: "limit".to_string(),
            page_size: page_size.max(1),
            max_offset: None,
            extra_params: Vec::new(),
        }
    }

    /// Set the offset ceiling
    #[must_use]
    pub fn with_max_offset(mut self, max_offset: u32) -> Self {
        self.max_offset = Some(max_offset);
        self
    }

    /// Add an extra query parameter
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_params.push((key.into(), value.into()));
        self
    }

    /// Number of items reachable through offsets alone
    pub fn reachable_window(&self) -> Option<u64> {
        self.max_offset
            .map(|max| u64::from(max) + u64::from(self.page_size))
    }

    /// Build the URL for an offset
    pub fn url_for(&self, offset: u64) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        query.append_pair(&self.limit_param, &self.page_size.to_string());
        query.append_pair(&self.offset_param, &offset.to_string());
        for (key, value) in &self.extra_params {
            query.append_pair(key, value);
        }
        format!("{}?{}", self.path, query.finish())
    }

    /// Request that yields items starting at `next_index`, if reachable
    fn request_for(&self, next_index: u64) -> Option<PageRequest> {
        let (offset, skip) = match self.max_offset.map(u64::from) {
            Some(max) if next_index > max => {
                if next_index >= max + u64::from(self.page_size) {
                    return None;
                }
                (max, (next_index - max) as usize)
            }
            _ => (next_index, 0),
        };

        Some(PageRequest {
            url: self.url_for(offset),
            offset: Some(offset),
            skip,
        })
    }
}

impl Paginator for OffsetPaginator {
    fn first_request(&self, state: &mut PaginationState) -> Option<PageRequest> {
        let request = self.request_for(state.offset);
        if request.is_none() {
            state.ceiling_reached = true;
            state.mark_done();
        }
        request
    }

    fn process_page(
        &self,
        page: &RawPage,
        request: &PageRequest,
        state: &mut PaginationState,
    ) -> NextPage {
        state.pages += 1;
        if page.reported_total.is_some() {
            state.reported_total = page.reported_total;
        }

        let received = page.len() as u64;
        state.add_fetched(received.saturating_sub(request.skip as u64));

        if page.is_empty() {
            state.mark_done();
            return NextPage::Done;
        }

        let requested_offset = request.offset.unwrap_or(state.offset);
        state.offset = state.offset.max(requested_offset + received);

        if let Some(total) = state.reported_total {
            if state.offset >= total {
                state.mark_done();
                return NextPage::Done;
            }
        }

        match self.request_for(state.offset) {
            Some(next) => NextPage::Continue(next),
            None => {
                state.ceiling_reached = true;
                state.mark_done();
                NextPage::Done
            }
        }
    }
}

// ============================================================================
// Cursor Pagination
// ============================================================================

/// Cursor pagination following an opaque next-page URL
///
/// The first request uses a constructed URL; afterwards each response's
/// continuation is requested exactly as received. Cursors are never parsed.
#[derive(Debug, Clone)]
pub struct CursorPaginator {
    /// URL of the first page
    pub initial_url: String,
}

impl CursorPaginator {
    /// Create a new cursor paginator
    pub fn new(initial_url: impl Into<String>) -> Self {
        Self {
            initial_url: initial_url.into(),
        }
    }
}

impl Paginator for CursorPaginator {
    fn first_request(&self, state: &mut PaginationState) -> Option<PageRequest> {
        match &state.cursor {
            Some(cursor) => Some(PageRequest::url(cursor.clone())),
            None => Some(PageRequest::url(self.initial_url.clone())),
        }
    }

    fn process_page(
        &self,
        page: &RawPage,
        request: &PageRequest,
        state: &mut PaginationState,
    ) -> NextPage {
        state.pages += 1;
        state.add_fetched(page.len() as u64);

        match &page.next_cursor {
            // A continuation pointing at itself would never end
            Some(next) if *next != request.url => {
                state.cursor = Some(next.clone());
                NextPage::Continue(PageRequest::url(next.clone()))
            }
            _ => {
                state.cursor = None;
                state.mark_done();
                NextPage::Done
            }
        }
    }
}
