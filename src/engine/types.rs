//! Engine types
//!
//! Progress events, per-parent outcomes, and run statistics.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// How one parent ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// Children were fetched and persisted
    Updated {
        /// Records that passed extraction
        extracted: u64,
        /// Records gained compared to the local count
        new_records: u64,
        /// Upstream records beyond the offset ceiling
        unreachable: u64,
    },
    /// Local count already matched, or a fetch gained nothing
    UpToDate,
    /// Upstream reports no children
    RemoteEmpty,
    /// Skipped after an error; retried on a later run
    Failed {
        reason: String,
    },
}

/// An event emitted while a run progresses
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// A run began
    RunStarted {
        target: String,
        /// Units already processed by an earlier, interrupted run
        resumed_at: u64,
    },
    /// The parent listing was enumerated
    Enumerated {
        parents: u64,
        declared: u64,
        unreachable: u64,
    },
    /// Work on a parent began
    ParentStarted {
        /// Zero-based position in the enumeration
        index: u64,
        total: u64,
        alias: String,
    },
    /// Work on a parent ended
    ParentFinished {
        alias: String,
        outcome: Outcome,
    },
    /// A batch reached the store
    BatchPersisted {
        written: u64,
        total_written: u64,
    },
    /// The run stopped on request
    Cancelled {
        processed: u64,
    },
    /// The run finished
    RunFinished {
        completed: bool,
        stats: HarvestStats,
    },
}

/// Statistics from a harvest run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HarvestStats {
    pub parents_examined: u64,
    pub parents_updated: u64,
    pub parents_up_to_date: u64,
    pub parents_empty: u64,
    pub parents_failed: u64,
    pub pages_fetched: u64,
    pub records_written: u64,
    pub new_records: u64,
    /// Declared parents the listing could not reach
    pub unreachable: u64,
    /// Declared child records beyond the offset ceiling, summed over parents
    pub records_unreachable: u64,
    pub duration_ms: u64,
}

impl HarvestStats {
    /// Create new stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a finished parent
    pub fn record_outcome(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Updated { new_records, .. } => {
                self.parents_updated += 1;
                self.new_records += new_records;
            }
            Outcome::UpToDate => self.parents_up_to_date += 1,
            Outcome::RemoteEmpty => self.parents_empty += 1,
            Outcome::Failed { .. } => self.parents_failed += 1,
        }
    }

    /// Add child records the offset window could not reach
    pub fn add_unreachable(&mut self, count: u64) {
        self.records_unreachable += count;
    }

    /// Add a page
    pub fn add_page(&mut self) {
        self.pages_fetched += 1;
    }

    /// Add persisted records
    pub fn add_written(&mut self, count: u64) {
        self.records_written += count;
    }

    /// Set duration
    pub fn set_duration(&mut self, ms: u64) {
        self.duration_ms = ms;
    }
}

/// Summary returned by every run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HarvestReport {
    pub target: String,
    pub stats: HarvestStats,
    /// The whole target was walked
    pub completed: bool,
    /// Stopped by a cancel request
    pub cancelled: bool,
    /// Where the next run resumes (units processed)
    pub processed_count: u64,
    /// Stored continuation for cursor runs
    pub resume_cursor: Option<String>,
}

/// Cooperative stop signal, checked between units of work
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// Create an untriggered handle
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the run to stop at the next unit boundary
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Has a stop been requested?
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
