//! Batch persistence

use super::types::RecordStore;
use crate::error::{Error, Result};
use crate::extract::CanonicalRecord;
use std::collections::HashMap;
use tracing::debug;

/// Persist one batch; returns the number of distinct records written
///
/// An empty batch touches nothing. Records sharing a natural key collapse to
/// the last one. Any store failure surfaces as [`Error::StoreWrite`].
pub async fn persist_batch(store: &dyn RecordStore, records: &[CanonicalRecord]) -> Result<usize> {
    if records.is_empty() {
        return Ok(0);
    }

    let mut slots: HashMap<&str, usize> = HashMap::with_capacity(records.len());
    let mut unique: Vec<CanonicalRecord> = Vec::with_capacity(records.len());
    for record in records {
        match slots.get(record.natural_key.as_str()) {
            Some(&slot) => unique[slot] = record.clone(),
            None => {
                slots.insert(&record.natural_key, unique.len());
                unique.push(record.clone());
            }
        }
    }

    if unique.len() < records.len() {
        debug!(
            "Collapsed {} duplicate keys in batch",
            records.len() - unique.len()
        );
    }

    store.upsert(&unique).await.map_err(|e| match e {
        Error::StoreWrite { .. } => e,
        other => Error::store_write(other.to_string()),
    })
}
