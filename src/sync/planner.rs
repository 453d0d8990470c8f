//! Sync planner

use crate::decode::{PageDecoder, PageLayout};
use crate::error::{Error, Result};
use crate::http::Fetcher;
use crate::types::ParentEntity;
use tracing::debug;

/// What to do with one parent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDecision {
    /// The upstream reports no children
    RemoteEmpty,
    /// The local store holds at least as many children as the upstream reports
    UpToDate,
    /// Children must be fetched
    Fetch {
        /// Count reported by the upstream
        remote: u64,
        /// Count held locally
        local: u64,
    },
}

impl SyncDecision {
    /// Should the parent's children be fetched?
    pub fn needs_fetch(&self) -> bool {
        matches!(self, Self::Fetch { .. })
    }
}

/// Compares local and remote child counts
pub struct SyncPlanner<'a> {
    fetcher: &'a dyn Fetcher,
    children_path: &'a str,
    decoder: PageDecoder,
}

impl<'a> SyncPlanner<'a> {
    /// Create a planner; `children_path` contains an `{alias}` placeholder
    pub fn new(fetcher: &'a dyn Fetcher, children_path: &'a str) -> Self {
        Self {
            fetcher,
            children_path,
            decoder: PageDecoder::new(PageLayout::offset_results()),
        }
    }

    /// Ask the upstream how many children a parent has, in one minimal request
    ///
    /// An end-of-data response counts as zero.
    pub async fn remote_count(&self, parent: &ParentEntity) -> Result<u64> {
        let path = self.children_path.replace("{alias}", &parent.alias);
        let url = format!("{path}?limit=1&offset=0");

        let Some(body) = self.fetcher.fetch_json(&url).await? else {
            debug!("No listing for {}", parent.alias);
            return Ok(0);
        };

        self.decoder.reported_total(&body).ok_or_else(|| {
            Error::decode(format!("response for {url} carries no reported count"))
        })
    }

    /// Decide from the two counts
    pub fn plan(local: u64, remote: u64) -> SyncDecision {
        if remote == 0 {
            SyncDecision::RemoteEmpty
        } else if local >= remote {
            SyncDecision::UpToDate
        } else {
            SyncDecision::Fetch { remote, local }
        }
    }

    /// Fetch the remote count and decide
    pub async fn decide(&self, parent: &ParentEntity, local: u64) -> Result<SyncDecision> {
        let remote = self.remote_count(parent).await?;
        Ok(Self::plan(local, remote))
    }

    /// Records gained by a fetch; the whole extracted batch is upserted regardless
    pub fn new_records(local: u64, extracted: u64) -> u64 {
        extracted.saturating_sub(local)
    }
}

impl std::fmt::Debug for SyncPlanner<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncPlanner")
            .field("children_path", &self.children_path)
            .finish_non_exhaustive()
    }
}
