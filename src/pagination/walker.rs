//! Page walker
//!
//! Drives a [`Paginator`] against a [`Fetcher`], yielding decoded pages lazily.

use super::types::{NextPage, PageRequest, PaginationState, Paginator};
use crate::decode::{PageDecoder, RawPage};
use crate::error::{Error, Result};
use crate::http::Fetcher;
use crate::types::{ParentEntity, RawRecord};
use futures::Stream;
use std::time::Duration;
use tracing::debug;

/// Lazily walks the pages of one listing
///
/// A walk is finite and can only be restarted from a [`PaginationState`]
/// (an offset or a stored cursor).
pub struct PageWalker<'a> {
    fetcher: &'a dyn Fetcher,
    paginator: &'a dyn Paginator,
    decoder: &'a PageDecoder,
    parent: Option<ParentEntity>,
    delay: Duration,
    state: PaginationState,
    pending: Option<PageRequest>,
    started: bool,
}

impl<'a> PageWalker<'a> {
    /// Create a walker starting from the beginning of the listing
    pub fn new(
        fetcher: &'a dyn Fetcher,
        paginator: &'a dyn Paginator,
        decoder: &'a PageDecoder,
    ) -> Self {
        Self {
            fetcher,
            paginator,
            decoder,
            parent: None,
            delay: Duration::ZERO,
            state: PaginationState::new(),
            pending: None,
            started: false,
        }
    }

    /// Attach a parent to every yielded record
    #[must_use]
    pub fn with_parent(mut self, parent: ParentEntity) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Sleep between page fetches
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Resume from a saved state
    #[must_use]
    pub fn resume_from(mut self, state: PaginationState) -> Self {
        self.state = state;
        self
    }

    /// Current pagination state
    pub fn state(&self) -> &PaginationState {
        &self.state
    }

    /// Fetch the next page; `Ok(None)` once the listing is exhausted
    ///
    /// On a fetch error the pending request is kept, so calling again retries
    /// the same page.
    pub async fn next_page(&mut self) -> Result<Option<RawPage>> {
        if self.state.done {
            return Ok(None);
        }

        let request = if self.started {
            let Some(request) = self.pending.clone() else {
                self.state.mark_done();
                return Ok(None);
            };
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            request
        } else {
            let Some(request) = self.paginator.first_request(&mut self.state) else {
                return Ok(None);
            };
            self.started = true;
            self.pending = Some(request.clone());
            request
        };

        debug!(
            "Fetching page {} ({})",
            self.state.pages + 1,
            request.url
        );

        let Some(body) = self.fetcher.fetch_json(&request.url).await? else {
            debug!("End of data signalled for {}", request.url);
            self.pending = None;
            self.state.mark_done();
            return Ok(None);
        };

        let mut page = self.decoder.decode(&body, self.parent.as_ref())?;

        self.pending = match self.paginator.process_page(&page, &request, &mut self.state) {
            NextPage::Continue(next) => Some(next),
            NextPage::Done => None,
        };

        if request.skip > 0 {
            let skip = request.skip.min(page.items.len());
            page.items.drain(..skip);
        }

        Ok(Some(page))
    }

    /// Walk to the end, collecting every record
    pub async fn collect_records(&mut self) -> Result<Vec<RawRecord>> {
        let mut records = Vec::new();
        while let Some(page) = self.next_page().await? {
            records.extend(page.items);
        }
        Ok(records)
    }

    /// Turn the walker into a stream of pages
    pub fn into_stream(self) -> impl Stream<Item = Result<RawPage>> + 'a {
        futures::stream::try_unfold(self, |mut walker| async move {
            let page = walker.next_page().await?;
            Ok::<_, Error>(page.map(|page| (page, walker)))
        })
    }
}

impl std::fmt::Debug for PageWalker<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageWalker")
            .field("parent", &self.parent)
            .field("delay", &self.delay)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
