//! Tests for record stores and batch persistence

use super::*;
use crate::error::{Error, Result};
use crate::extract::CanonicalRecord;
use crate::state::{Checkpoint, CheckpointManager, CheckpointStore};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tempfile::tempdir;

fn record(key: &str, parent: &str) -> CanonicalRecord {
    CanonicalRecord::new(key, format!("https://soundcloud.com/nts/{key}"))
        .with_parent(parent, format!("Show {parent}"))
}

fn rich_record() -> CanonicalRecord {
    let mut record = record("fp-01", "floating-points");
    record.title = Some("Floating Points".to_string());
    record.published_at = Some(Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap());
    record.descriptive_tags = Some(BTreeSet::from(["Jazz".to_string(), "Ambient".to_string()]));
    record.categorical_tags = Some(BTreeSet::from(["Late Night".to_string()]));
    record.intensity = Some("35".to_string());
    record.duration_ms = Some(7_200_000);
    record.is_streamable = Some(false);
    record.play_count = Some(5120);
    record.image_url = Some("https://img/large.jpg".to_string());
    record
}

struct FailingStore;

#[async_trait]
impl RecordStore for FailingStore {
    async fn upsert(&self, _records: &[CanonicalRecord]) -> Result<usize> {
        Err(Error::Other("disk full".to_string()))
    }

    async fn get(&self, _natural_key: &str) -> Result<Option<CanonicalRecord>> {
        Ok(None)
    }

    async fn counts_by_parent(&self) -> Result<HashMap<String, u64>> {
        Ok(HashMap::new())
    }

    async fn total_count(&self) -> Result<u64> {
        Ok(0)
    }

    async fn delete_all(&self) -> Result<()> {
        Ok(())
    }
}

/// Behaviour every store must share
async fn check_store_contract(store: &dyn RecordStore) {
    let batch = vec![record("a1", "a"), record("a2", "a"), record("b1", "b")];

    assert_eq!(persist_batch(store, &batch).await.unwrap(), 3);
    assert_eq!(store.total_count().await.unwrap(), 3);

    // Same batch again changes nothing
    persist_batch(store, &batch).await.unwrap();
    assert_eq!(store.total_count().await.unwrap(), 3);

    let counts = store.counts_by_parent().await.unwrap();
    assert_eq!(counts.get("a"), Some(&2));
    assert_eq!(counts.get("b"), Some(&1));

    // Overwrite keeps the latest values
    let mut updated = record("a1", "a");
    updated.title = Some("Retitled".to_string());
    persist_batch(store, &[updated]).await.unwrap();
    let stored = store.get("a1").await.unwrap().unwrap();
    assert_eq!(stored.title.as_deref(), Some("Retitled"));
    assert_eq!(store.total_count().await.unwrap(), 3);

    // Every field survives the trip
    let rich = rich_record();
    persist_batch(store, &[rich.clone()]).await.unwrap();
    assert_eq!(store.get("fp-01").await.unwrap(), Some(rich));

    assert!(store.get("missing").await.unwrap().is_none());

    store.delete_all().await.unwrap();
    assert_eq!(store.total_count().await.unwrap(), 0);
    assert!(store.counts_by_parent().await.unwrap().is_empty());
}

/// Checkpoint behaviour every store must share
async fn check_checkpoint_contract(store: &dyn CheckpointStore) {
    assert!(store.load_checkpoint("feed:42").await.unwrap().is_none());

    let mut checkpoint = Checkpoint::new("feed:42").with_identity(Some("42"));
    checkpoint.processed_count = 100;
    checkpoint.last_parent = Some("42".to_string());
    checkpoint.resume_cursor =
        Some("https://api.example.com/users/42/tracks?offset=AbC%2F%3D%3D&limit=50".to_string());
    checkpoint.records_written = 98;
    checkpoint.updated_at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    store.save_checkpoint(&checkpoint).await.unwrap();
    assert_eq!(store.load_checkpoint("feed:42").await.unwrap(), Some(checkpoint.clone()));

    // One row per target: a second save for the same target replaces the first
    checkpoint.processed_count = 150;
    store.save_checkpoint(&checkpoint).await.unwrap();
    assert_eq!(
        store.load_checkpoint("feed:42").await.unwrap().map(|c| c.processed_count),
        Some(150)
    );

    // Another target gets its own row
    let mut catalog = Checkpoint::new("catalog:https://api.example.com");
    catalog.complete_parent("show-0002");
    catalog.updated_at = Utc.with_ymd_and_hms(2024, 5, 2, 8, 0, 0).unwrap();
    store.save_checkpoint(&catalog).await.unwrap();
    assert_eq!(
        store.load_checkpoint("feed:42").await.unwrap().map(|c| c.processed_count),
        Some(150)
    );
    let targets: Vec<String> = store
        .list_checkpoints()
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.run_target)
        .collect();
    assert_eq!(targets, vec!["catalog:https://api.example.com", "feed:42"]);

    store.clear_checkpoint("feed:42").await.unwrap();
    assert!(store.load_checkpoint("feed:42").await.unwrap().is_none());
    assert_eq!(
        store.load_checkpoint("catalog:https://api.example.com").await.unwrap(),
        Some(catalog)
    );
}

// ============================================================================
// Contract Tests
// ============================================================================

#[tokio::test]
async fn test_memory_store_contract() {
    let store = MemoryStore::new();
    check_store_contract(&store).await;
    check_checkpoint_contract(&store).await;
}

#[tokio::test]
async fn test_duckdb_in_memory_contract() {
    let store = DuckDbStore::in_memory().unwrap();
    check_store_contract(&store).await;
    check_checkpoint_contract(&store).await;
}

#[tokio::test]
async fn test_duckdb_file_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("harvest.duckdb");

    {
        let store = DuckDbStore::open(&path).unwrap();
        persist_batch(&store, &[record("a1", "a"), record("a2", "a")])
            .await
            .unwrap();
        let mut checkpoint = Checkpoint::new("catalog");
        checkpoint.complete_parent("a");
        store.save_checkpoint(&checkpoint).await.unwrap();
    }

    let store = Arc::new(DuckDbStore::open(&path).unwrap());
    assert_eq!(store.total_count().await.unwrap(), 2);

    let manager = CheckpointManager::new(store.clone());
    let checkpoint = manager.load("catalog", None).await;
    assert_eq!(checkpoint.processed_count, 1);
    assert_eq!(checkpoint.last_parent.as_deref(), Some("a"));
}

// ============================================================================
// persist_batch Tests
// ============================================================================

#[tokio::test]
async fn test_persist_empty_batch_is_noop() {
    // Would fail if it touched the store
    assert_eq!(persist_batch(&FailingStore, &[]).await.unwrap(), 0);
}

#[tokio::test]
async fn test_persist_failure_is_store_write() {
    let err = persist_batch(&FailingStore, &[record("a1", "a")])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::StoreWrite { .. }));
    assert!(!err.is_skippable());
}

#[tokio::test]
async fn test_persist_dedupes_last_wins() {
    let store = DuckDbStore::in_memory().unwrap();

    let mut second = record("dup", "a");
    second.title = Some("second".to_string());
    let mut first = record("dup", "a");
    first.title = Some("first".to_string());

    let written = persist_batch(&store, &[first, record("other", "a"), second])
        .await
        .unwrap();

    assert_eq!(written, 2);
    assert_eq!(store.total_count().await.unwrap(), 2);
    let stored = store.get("dup").await.unwrap().unwrap();
    assert_eq!(stored.title.as_deref(), Some("second"));
}

#[tokio::test]
async fn test_store_summary() {
    let store = MemoryStore::new();
    persist_batch(
        &store,
        &[record("a1", "a"), record("a2", "a"), record("b1", "b")],
    )
    .await
    .unwrap();

    let summary = StoreSummary::collect(&store).await.unwrap();
    assert_eq!(
        summary,
        StoreSummary {
            total_records: 3,
            parents: 2
        }
    );
}
