//! Store trait

use crate::error::Result;
use crate::extract::CanonicalRecord;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;

/// Durable home of canonical records
///
/// `upsert` must be idempotent: writing the same record twice leaves one row
/// holding the latest values.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert or overwrite records by natural key; returns rows written
    async fn upsert(&self, records: &[CanonicalRecord]) -> Result<usize>;

    /// Look up one record
    async fn get(&self, natural_key: &str) -> Result<Option<CanonicalRecord>>;

    /// Stored record count per parent alias
    async fn counts_by_parent(&self) -> Result<HashMap<String, u64>>;

    /// Total stored records
    async fn total_count(&self) -> Result<u64>;

    /// Remove every record
    async fn delete_all(&self) -> Result<()>;
}

/// Totals for status reporting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreSummary {
    pub total_records: u64,
    pub parents: u64,
}

impl StoreSummary {
    /// Gather totals from a store
    pub async fn collect(store: &dyn RecordStore) -> Result<Self> {
        let counts = store.counts_by_parent().await?;
        Ok(Self {
            total_records: store.total_count().await?,
            parents: counts.len() as u64,
        })
    }
}
