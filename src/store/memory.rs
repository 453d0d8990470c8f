//! In-process record store

use super::types::RecordStore;
use crate::error::{Error, Result};
use crate::extract::CanonicalRecord;
use crate::state::{Checkpoint, CheckpointStore};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

/// Records and checkpoints held in memory; nothing survives the process
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<String, CanonicalRecord>>,
    checkpoints: Mutex<BTreeMap<String, Checkpoint>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record, ordered by natural key
    pub fn records(&self) -> Result<Vec<CanonicalRecord>> {
        Ok(lock(&self.records)?.values().cloned().collect())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| Error::Other("memory store poisoned".to_string()))
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn upsert(&self, records: &[CanonicalRecord]) -> Result<usize> {
        let mut stored = lock(&self.records)?;
        for record in records {
            stored.insert(record.natural_key.clone(), record.clone());
        }
        Ok(records.len())
    }

    async fn get(&self, natural_key: &str) -> Result<Option<CanonicalRecord>> {
        Ok(lock(&self.records)?.get(natural_key).cloned())
    }

    async fn counts_by_parent(&self) -> Result<HashMap<String, u64>> {
        let mut counts = HashMap::new();
        for record in lock(&self.records)?.values() {
            if let Some(alias) = &record.parent_alias {
                *counts.entry(alias.clone()).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn total_count(&self) -> Result<u64> {
        Ok(lock(&self.records)?.len() as u64)
    }

    async fn delete_all(&self) -> Result<()> {
        lock(&self.records)?.clear();
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for MemoryStore {
    async fn load_checkpoint(&self, target: &str) -> Result<Option<Checkpoint>> {
        Ok(lock(&self.checkpoints)?.get(target).cloned())
    }

    async fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        lock(&self.checkpoints)?.insert(checkpoint.run_target.clone(), checkpoint.clone());
        Ok(())
    }

    async fn clear_checkpoint(&self, target: &str) -> Result<()> {
        lock(&self.checkpoints)?.remove(target);
        Ok(())
    }

    async fn list_checkpoints(&self) -> Result<Vec<Checkpoint>> {
        Ok(lock(&self.checkpoints)?.values().cloned().collect())
    }
}
