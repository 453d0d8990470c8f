//! Checkpoint persistence
//!
//! Provides the store trait, a JSON file store with atomic writes, and the
//! manager the harvester talks to.

use super::types::Checkpoint;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Durable home of checkpoints, one per run target
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Read the checkpoint stored for `target`, if any
    async fn load_checkpoint(&self, target: &str) -> Result<Option<Checkpoint>>;

    /// Replace the checkpoint stored under `checkpoint.run_target`
    async fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()>;

    /// Remove the checkpoint stored for `target`
    async fn clear_checkpoint(&self, target: &str) -> Result<()>;

    /// Every stored checkpoint, ordered by run target
    async fn list_checkpoints(&self) -> Result<Vec<Checkpoint>>;
}

// ============================================================================
// File store
// ============================================================================

/// Checkpoints kept as a pretty JSON map `run target -> checkpoint` in one file
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    /// Create a store writing to `path`
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the checkpoint file
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<BTreeMap<String, Checkpoint>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| Error::state(format!("Failed to read checkpoint file: {e}")))?;

        serde_json::from_str(&contents)
            .map_err(|e| Error::state(format!("Failed to parse checkpoint file: {e}")))
    }

    async fn write_all(&self, checkpoints: &BTreeMap<String, Checkpoint>) -> Result<()> {
        let contents = serde_json::to_string_pretty(checkpoints)
            .map_err(|e| Error::state(format!("Failed to serialize checkpoint: {e}")))?;

        // Write to temp file first, then rename for atomicity
        let temp_path = self.path.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents)
            .await
            .map_err(|e| Error::state(format!("Failed to write checkpoint file: {e}")))?;

        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| Error::state(format!("Failed to rename checkpoint file: {e}")))?;

        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn load_checkpoint(&self, target: &str) -> Result<Option<Checkpoint>> {
        Ok(self.read_all().await?.remove(target))
    }

    async fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        let mut all = self.read_all().await?;
        all.insert(checkpoint.run_target.clone(), checkpoint.clone());
        self.write_all(&all).await
    }

    async fn clear_checkpoint(&self, target: &str) -> Result<()> {
        let mut all = self.read_all().await?;
        if all.remove(target).is_some() {
            self.write_all(&all).await?;
        }
        Ok(())
    }

    async fn list_checkpoints(&self) -> Result<Vec<Checkpoint>> {
        Ok(self.read_all().await?.into_values().collect())
    }
}

// ============================================================================
// Manager
// ============================================================================

/// Load-or-reset semantics over a [`CheckpointStore`]
#[derive(Clone)]
pub struct CheckpointManager {
    store: Arc<dyn CheckpointStore>,
}

impl CheckpointManager {
    /// Create a manager over a store
    pub fn new(store: Arc<dyn CheckpointStore>) -> Self {
        Self { store }
    }

    /// Load the checkpoint for `target`; never fails
    ///
    /// A missing or unreadable checkpoint yields the zero state. A checkpoint
    /// captured against a different upstream `identity` is discarded and the
    /// reset persisted; one with no recorded identity adopts the given one.
    pub async fn load(&self, target: &str, identity: Option<&str>) -> Checkpoint {
        let stored = match self.store.load_checkpoint(target).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!("Could not read checkpoint for {}, starting from zero: {}", target, e);
                None
            }
        };

        match stored {
            Some(checkpoint) if checkpoint.conflicts_with(identity) => {
                info!(
                    "Checkpoint for {} was captured against {:?}, resetting for {:?}",
                    target, checkpoint.identity, identity
                );
                let fresh = Checkpoint::new(target).with_identity(identity);
                if let Err(e) = self.store.save_checkpoint(&fresh).await {
                    warn!("Could not persist checkpoint reset: {}", e);
                }
                fresh
            }
            Some(mut checkpoint) => {
                debug!(
                    "Loaded checkpoint for {}: {} processed",
                    target, checkpoint.processed_count
                );
                if checkpoint.identity.is_none() {
                    checkpoint.identity = identity.map(str::to_string);
                }
                checkpoint
            }
            None => Checkpoint::new(target).with_identity(identity),
        }
    }

    /// Stamp and persist a checkpoint
    pub async fn save(&self, checkpoint: &mut Checkpoint) -> Result<()> {
        checkpoint.touch();
        self.store.save_checkpoint(checkpoint).await
    }

    /// Drop the stored checkpoint for `target` and return its zero state
    pub async fn reset(&self, target: &str) -> Result<Checkpoint> {
        self.store.clear_checkpoint(target).await?;
        Ok(Checkpoint::new(target))
    }

    /// Every stored checkpoint, for reporting
    pub async fn all(&self) -> Result<Vec<Checkpoint>> {
        self.store.list_checkpoints().await
    }
}

impl std::fmt::Debug for CheckpointManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckpointManager").finish_non_exhaustive()
    }
}
