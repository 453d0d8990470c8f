//! Checkpoint type
//!
//! Serialized to JSON (file store) or one table row per run target (DuckDB store).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Resume point of a run
///
/// `processed_count` counts completed parents for catalog runs and yielded
/// records for feed runs. `resume_cursor` is only meaningful for the
/// upstream `identity` it was recorded against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// What the run is harvesting (e.g. `catalog:<base url>` or `feed:<account>`)
    #[serde(default)]
    pub run_target: String,

    /// Upstream identity the progress was captured against (resolved account id)
    #[serde(default)]
    pub identity: Option<String>,

    #[serde(default)]
    pub processed_count: u64,

    /// Alias of the last completed parent
    #[serde(default)]
    pub last_parent: Option<String>,

    /// Opaque continuation of a cursor walk
    #[serde(default)]
    pub resume_cursor: Option<String>,

    #[serde(default)]
    pub records_written: u64,

    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Zero state for a target
    pub fn new(run_target: impl Into<String>) -> Self {
        Self {
            run_target: run_target.into(),
            ..Self::default()
        }
    }

    /// Bind to an upstream identity
    pub fn with_identity(mut self, identity: Option<&str>) -> Self {
        self.identity = identity.map(str::to_string);
        self
    }

    /// Is this checkpoint bound to `target`?
    pub fn is_for(&self, target: &str) -> bool {
        self.run_target == target
    }

    /// Was the progress captured against a different upstream identity?
    ///
    /// A checkpoint with no recorded identity conflicts with nothing.
    pub fn conflicts_with(&self, identity: Option<&str>) -> bool {
        matches!((self.identity.as_deref(), identity), (Some(stored), Some(given)) if stored != given)
    }

    /// Nothing has been processed yet
    pub fn is_fresh(&self) -> bool {
        self.processed_count == 0 && self.resume_cursor.is_none() && self.last_parent.is_none()
    }

    /// Record a completed parent
    pub fn complete_parent(&mut self, alias: impl Into<String>) {
        self.processed_count += 1;
        self.last_parent = Some(alias.into());
    }

    /// Record a persisted batch
    pub fn add_written(&mut self, count: u64) {
        self.records_written += count;
    }

    /// Back to the start of the same target
    pub fn rewind(&mut self) {
        self.processed_count = 0;
        self.last_parent = None;
        self.resume_cursor = None;
    }

    /// Stamp the modification time
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self {
            run_target: String::new(),
            identity: None,
            processed_count: 0,
            last_parent: None,
            resume_cursor: None,
            records_written: 0,
            updated_at: Utc::now(),
        }
    }
}
