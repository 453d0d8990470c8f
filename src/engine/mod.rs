//! Execution engine module
//!
//! The sequential driver tying enumeration, planning, walking, extraction,
//! persistence, and checkpointing together.
//!
//! # Overview
//!
//! The engine module provides:
//! - `Harvester` - runs a catalog harvest or a cursor feed harvest
//! - `ProgressObserver` - receives `ProgressEvent`s (`TracingObserver` logs them)
//! - `HarvestReport` / `HarvestStats` - what a run did and where it stopped
//!
//! Batches are persisted before the checkpoint advances, so an interrupted
//! run may redo work but never skips it.

mod observer;
mod types;

pub use observer::{NoopObserver, ProgressObserver, TracingObserver};
pub use types::{CancelHandle, HarvestReport, HarvestStats, Outcome, ProgressEvent};

use crate::catalog::CollectionEnumerator;
use crate::config::HarvestConfig;
use crate::decode::{PageDecoder, PageLayout};
use crate::error::{Error, Result};
use crate::extract::{CanonicalRecord, EpisodeExtractor, Extractor, TrackExtractor};
use crate::http::Fetcher;
use crate::pagination::{CursorPaginator, OffsetPaginator, PageWalker, PaginationState};
use crate::state::{Checkpoint, CheckpointManager};
use crate::store::{persist_batch, RecordStore};
use crate::sync::{SyncDecision, SyncPlanner};
use crate::types::{extract_string, ParentEntity};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Sequential harvest driver
pub struct Harvester {
    fetcher: Arc<dyn Fetcher>,
    records: Arc<dyn RecordStore>,
    checkpoints: CheckpointManager,
    config: HarvestConfig,
    observer: Arc<dyn ProgressObserver>,
    cancel: CancelHandle,
}

impl Harvester {
    /// Create a harvester logging progress through `tracing`
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        records: Arc<dyn RecordStore>,
        checkpoints: CheckpointManager,
        config: HarvestConfig,
    ) -> Self {
        Self {
            fetcher,
            records,
            checkpoints,
            config,
            observer: Arc::new(TracingObserver),
            cancel: CancelHandle::new(),
        }
    }

    /// Send progress to another observer
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Handle that stops the run at the next unit boundary
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Checkpoint target of catalog runs
    pub fn catalog_target(&self) -> String {
        format!(
            "catalog:{}{}",
            self.config.api.base_url.trim_end_matches('/'),
            self.config.catalog.parents_path
        )
    }

    /// Checkpoint target of feed runs, keyed by the account as given
    pub fn feed_target(account: &str) -> String {
        format!("feed:{account}")
    }

    /// Numeric id of a feed account
    ///
    /// Numeric accounts are used as is; anything else is looked up through
    /// the resolve endpoint.
    pub async fn resolve_account(&self, account: &str) -> Result<String> {
        if !account.is_empty() && account.bytes().all(|b| b.is_ascii_digit()) {
            return Ok(account.to_string());
        }

        let url = self.config.feed.resolve_url(account);
        let unknown = || Error::UnknownAccount {
            account: account.to_string(),
        };
        let body = self.fetcher.fetch_json(&url).await?.ok_or_else(unknown)?;
        let id = extract_string(&body, "id").ok_or_else(unknown)?;

        info!("Resolved account {} to id {}", account, id);
        Ok(id)
    }

    fn emit(&self, event: ProgressEvent) {
        self.observer.on_event(&event);
    }

    async fn save(&self, checkpoint: &mut Checkpoint) {
        if let Err(e) = self.checkpoints.save(checkpoint).await {
            warn!("Could not save checkpoint: {}", e);
        }
    }

    fn finish(
        &self,
        target: String,
        mut stats: HarvestStats,
        started: Instant,
        checkpoint: &Checkpoint,
        completed: bool,
    ) -> HarvestReport {
        stats.set_duration(started.elapsed().as_millis() as u64);
        self.emit(ProgressEvent::RunFinished {
            completed,
            stats: stats.clone(),
        });
        HarvestReport {
            target,
            stats,
            completed,
            cancelled: !completed && self.cancel.is_cancelled(),
            processed_count: checkpoint.processed_count,
            resume_cursor: checkpoint.resume_cursor.clone(),
        }
    }

    // ========================================================================
    // Catalog
    // ========================================================================

    /// Harvest every reachable parent's children, resuming from the checkpoint
    ///
    /// Fails when the parent listing cannot be read at all or a batch cannot
    /// be persisted. Parents whose upstream is unavailable are skipped and
    /// counted as failed.
    pub async fn run_catalog(&self) -> Result<HarvestReport> {
        let started = Instant::now();
        let target = self.catalog_target();
        let mut checkpoint = self.checkpoints.load(&target, None).await;
        let mut stats = HarvestStats::new();

        self.emit(ProgressEvent::RunStarted {
            target: target.clone(),
            resumed_at: checkpoint.processed_count,
        });

        let enumeration = CollectionEnumerator::new(self.fetcher.as_ref(), &self.config.catalog)
            .enumerate()
            .await?;
        stats.unreachable = enumeration.unreachable;
        self.emit(ProgressEvent::Enumerated {
            parents: enumeration.parents.len() as u64,
            declared: enumeration.declared_total,
            unreachable: enumeration.unreachable,
        });

        let parents = &enumeration.parents;
        let start = resume_index(parents, &checkpoint);
        if start == 0 && !checkpoint.is_fresh() {
            checkpoint.rewind();
        }
        checkpoint.processed_count = start as u64;

        let counts = self.records.counts_by_parent().await?;
        let planner = SyncPlanner::new(self.fetcher.as_ref(), &self.config.catalog.children_path);
        let extractor = EpisodeExtractor::new(&self.config.extract.provider);
        let total = parents.len() as u64;

        for (index, parent) in parents.iter().enumerate().skip(start) {
            if self.cancel.is_cancelled() {
                self.save(&mut checkpoint).await;
                self.emit(ProgressEvent::Cancelled {
                    processed: checkpoint.processed_count,
                });
                return Ok(self.finish(target, stats, started, &checkpoint, false));
            }

            self.emit(ProgressEvent::ParentStarted {
                index: index as u64,
                total,
                alias: parent.alias.clone(),
            });
            stats.parents_examined += 1;

            let local = counts.get(&parent.alias).copied().unwrap_or(0);
            let outcome = match self
                .harvest_parent(parent, local, &planner, &extractor, &mut checkpoint, &mut stats)
                .await
            {
                Ok(outcome) => outcome,
                Err(e) if e.is_skippable() => Outcome::Failed {
                    reason: e.to_string(),
                },
                Err(e) => return Err(e),
            };

            stats.record_outcome(&outcome);
            checkpoint.complete_parent(&parent.alias);
            self.save(&mut checkpoint).await;
            self.emit(ProgressEvent::ParentFinished {
                alias: parent.alias.clone(),
                outcome,
            });
        }

        info!("Catalog pass complete, next run starts from the beginning");
        checkpoint.rewind();
        self.save(&mut checkpoint).await;

        Ok(self.finish(target, stats, started, &checkpoint, true))
    }

    async fn harvest_parent(
        &self,
        parent: &ParentEntity,
        local: u64,
        planner: &SyncPlanner<'_>,
        extractor: &dyn Extractor,
        checkpoint: &mut Checkpoint,
        stats: &mut HarvestStats,
    ) -> Result<Outcome> {
        let remote = match planner.decide(parent, local).await? {
            SyncDecision::RemoteEmpty => return Ok(Outcome::RemoteEmpty),
            SyncDecision::UpToDate => return Ok(Outcome::UpToDate),
            SyncDecision::Fetch { remote, .. } => remote,
        };
        debug!("{}: {} upstream, {} stored", parent.alias, remote, local);

        let catalog = &self.config.catalog;
        let paginator = OffsetPaginator::new(catalog.children_path_for(&parent.alias), catalog.page_size)
            .with_max_offset(catalog.max_offset);
        let decoder = PageDecoder::new(PageLayout::offset_results());
        let mut walker = PageWalker::new(self.fetcher.as_ref(), &paginator, &decoder)
            .with_parent(parent.clone())
            .with_delay(catalog.child_page_delay());

        let mut extracted = 0u64;
        while let Some(page) = walker.next_page().await? {
            stats.add_page();
            let batch = extractor.extract_all(&page.items);
            extracted += batch.len() as u64;
            self.persist(&batch, checkpoint, stats).await?;
        }

        let unreachable = walker.state().unreachable();
        if unreachable > 0 {
            // The local count stays short of the upstream one, so this parent
            // is walked again on every run
            warn!(
                "{}: {} of {} upstream records lie beyond offset {} and cannot be fetched",
                parent.alias, unreachable, remote, catalog.max_offset
            );
            stats.add_unreachable(unreachable);
        }
        if extracted < remote {
            debug!(
                "{}: {} of {} upstream records qualified",
                parent.alias, extracted, remote
            );
        }

        let new_records = SyncPlanner::new_records(local, extracted);
        if new_records == 0 {
            return Ok(Outcome::UpToDate);
        }
        Ok(Outcome::Updated {
            extracted,
            new_records,
            unreachable,
        })
    }

    /// Persist a batch, then advance the checkpoint
    async fn persist(
        &self,
        batch: &[CanonicalRecord],
        checkpoint: &mut Checkpoint,
        stats: &mut HarvestStats,
    ) -> Result<u64> {
        let written = persist_batch(self.records.as_ref(), batch).await? as u64;
        if written == 0 {
            return Ok(0);
        }

        stats.add_written(written);
        checkpoint.add_written(written);
        self.save(checkpoint).await;
        self.emit(ProgressEvent::BatchPersisted {
            written,
            total_written: stats.records_written,
        });
        Ok(written)
    }

    // ========================================================================
    // Feed
    // ========================================================================

    /// Walk an account's cursor feed, resuming from a stored cursor
    ///
    /// A page that cannot be fetched ends the run early with the cursor kept,
    /// so the next run continues from the same page. A stored cursor is only
    /// replayed when the account still resolves to the id it was captured
    /// against.
    pub async fn run_feed(&self, account: &str) -> Result<HarvestReport> {
        let started = Instant::now();
        let target = Self::feed_target(account);
        let account_id = self.resolve_account(account).await?;
        let mut checkpoint = self.checkpoints.load(&target, Some(&account_id)).await;
        let mut stats = HarvestStats::new();

        self.emit(ProgressEvent::RunStarted {
            target: target.clone(),
            resumed_at: checkpoint.processed_count,
        });

        let stored_cursor = checkpoint
            .resume_cursor
            .clone()
            .filter(|_| checkpoint.processed_count > 0);
        let resume = match stored_cursor {
            Some(cursor) => PaginationState::from_cursor(cursor),
            None => {
                if checkpoint.processed_count > 0 {
                    info!(
                        "{} records seen before but no cursor stored, starting over",
                        checkpoint.processed_count
                    );
                    checkpoint.rewind();
                }
                PaginationState::new()
            }
        };

        let paginator = CursorPaginator::new(self.config.feed.initial_url(&account_id));
        let decoder = PageDecoder::new(PageLayout::cursor_collection());
        let extractor = TrackExtractor::new().for_account(&account_id);
        let mut walker = PageWalker::new(self.fetcher.as_ref(), &paginator, &decoder)
            .with_delay(self.config.feed.page_delay())
            .resume_from(resume);

        stats.parents_examined = 1;

        loop {
            if self.cancel.is_cancelled() {
                self.emit(ProgressEvent::Cancelled {
                    processed: checkpoint.processed_count,
                });
                return Ok(self.finish(target, stats, started, &checkpoint, false));
            }

            let page = match walker.next_page().await {
                Ok(Some(page)) => page,
                Ok(None) => break,
                Err(e) if e.is_skippable() => {
                    warn!("Stopping feed run, run again to resume: {}", e);
                    stats.parents_failed = 1;
                    return Ok(self.finish(target, stats, started, &checkpoint, false));
                }
                Err(e) => return Err(e),
            };

            stats.add_page();
            let batch = extractor.extract_all(&page.items);
            checkpoint.processed_count += page.len() as u64;
            checkpoint.resume_cursor = walker.state().cursor.clone();

            if self.persist(&batch, &mut checkpoint, &mut stats).await? == 0 {
                // Advance past pages with nothing to store too
                self.save(&mut checkpoint).await;
            }
        }

        stats.parents_updated = 1;
        checkpoint.rewind();
        self.save(&mut checkpoint).await;

        Ok(self.finish(target, stats, started, &checkpoint, true))
    }
}

impl std::fmt::Debug for Harvester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Harvester")
            .field("config", &self.config)
            .field("cancel", &self.cancel)
            .finish_non_exhaustive()
    }
}

/// Position of the first parent a resumed run still has to process
///
/// Relocates by the last completed alias so a shifted listing does not skip
/// parents; falls back to the stored count when no alias was recorded.
fn resume_index(parents: &[ParentEntity], checkpoint: &Checkpoint) -> usize {
    match &checkpoint.last_parent {
        Some(alias) => match parents.iter().position(|p| &p.alias == alias) {
            Some(position) => position + 1,
            None => {
                warn!("Last completed parent {} no longer listed, starting over", alias);
                0
            }
        },
        None => (checkpoint.processed_count as usize).min(parents.len()),
    }
}
