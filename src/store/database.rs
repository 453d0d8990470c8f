//! DuckDB-backed record store
//!
//! One file (or in-memory database) holds both the records and one checkpoint
//! row per run target. Timestamps are stored as RFC 3339 text and tag sets as
//! JSON arrays.

use super::types::RecordStore;
use crate::error::{Error, Result};
use crate::extract::CanonicalRecord;
use crate::state::{Checkpoint, CheckpointStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use duckdb::{params, Connection};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS catalog_records (
    natural_key VARCHAR PRIMARY KEY,
    parent_alias VARCHAR,
    parent_name VARCHAR,
    title VARCHAR,
    published_at VARCHAR,
    description VARCHAR,
    descriptive_tags VARCHAR,
    categorical_tags VARCHAR,
    intensity VARCHAR,
    location_short VARCHAR,
    location_long VARCHAR,
    duration_ms BIGINT,
    is_streamable BOOLEAN,
    play_count BIGINT,
    media_url VARCHAR NOT NULL,
    image_url VARCHAR,
    harvested_at VARCHAR NOT NULL
);
CREATE TABLE IF NOT EXISTS harvest_checkpoints (
    run_target VARCHAR PRIMARY KEY,
    identity VARCHAR,
    processed_count BIGINT NOT NULL,
    last_parent VARCHAR,
    resume_cursor VARCHAR,
    records_written BIGINT NOT NULL,
    updated_at VARCHAR NOT NULL
);
";

const UPSERT_RECORD: &str = "
INSERT INTO catalog_records (
    natural_key, parent_alias, parent_name, title, published_at, description,
    descriptive_tags, categorical_tags, intensity, location_short, location_long,
    duration_ms, is_streamable, play_count, media_url, image_url, harvested_at
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
ON CONFLICT (natural_key) DO UPDATE SET
    parent_alias = excluded.parent_alias,
    parent_name = excluded.parent_name,
    title = excluded.title,
    published_at = excluded.published_at,
    description = excluded.description,
    descriptive_tags = excluded.descriptive_tags,
    categorical_tags = excluded.categorical_tags,
    intensity = excluded.intensity,
    location_short = excluded.location_short,
    location_long = excluded.location_long,
    duration_ms = excluded.duration_ms,
    is_streamable = excluded.is_streamable,
    play_count = excluded.play_count,
    media_url = excluded.media_url,
    image_url = excluded.image_url,
    harvested_at = excluded.harvested_at
";

const SELECT_RECORD: &str = "
SELECT natural_key, parent_alias, parent_name, title, published_at, description,
       descriptive_tags, categorical_tags, intensity, location_short, location_long,
       duration_ms, is_streamable, play_count, media_url, image_url
FROM catalog_records WHERE natural_key = ?
";

const SELECT_CHECKPOINT: &str = "
SELECT run_target, identity, processed_count, last_parent, resume_cursor,
       records_written, updated_at
FROM harvest_checkpoints
";

const UPSERT_CHECKPOINT: &str = "
INSERT INTO harvest_checkpoints (
    run_target, identity, processed_count, last_parent, resume_cursor, records_written, updated_at
) VALUES (?, ?, ?, ?, ?, ?, ?)
ON CONFLICT (run_target) DO UPDATE SET
    identity = excluded.identity,
    processed_count = excluded.processed_count,
    last_parent = excluded.last_parent,
    resume_cursor = excluded.resume_cursor,
    records_written = excluded.records_written,
    updated_at = excluded.updated_at
";

/// Record and checkpoint store on DuckDB
pub struct DuckDbStore {
    conn: Mutex<Connection>,
    location: String,
}

impl DuckDbStore {
    /// Open (or create) a database file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .map_err(|e| Error::config(format!("Failed to open DuckDB at {}: {e}", path.display())))?;
        Self::init(conn, path.display().to_string())
    }

    /// Open a throwaway in-memory database
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::config(format!("Failed to create DuckDB connection: {e}")))?;
        Self::init(conn, ":memory:".to_string())
    }

    fn init(conn: Connection, location: String) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| Error::config(format!("Failed to create tables: {e}")))?;
        debug!("Opened record store at {}", location);
        Ok(Self {
            conn: Mutex::new(conn),
            location,
        })
    }

    /// Where the database lives
    pub fn location(&self) -> &str {
        &self.location
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Other("record store connection poisoned".to_string()))
    }
}

#[async_trait]
impl RecordStore for DuckDbStore {
    async fn upsert(&self, records: &[CanonicalRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let harvested_at = Utc::now().to_rfc3339();
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| Error::store_write(format!("Failed to begin transaction: {e}")))?;

        {
            let mut stmt = tx
                .prepare(UPSERT_RECORD)
                .map_err(|e| Error::store_write(format!("Failed to prepare upsert: {e}")))?;

            for record in records {
                stmt.execute(params![
                    record.natural_key,
                    record.parent_alias,
                    record.parent_name,
                    record.title,
                    record.published_at.map(|t| t.to_rfc3339()),
                    record.description,
                    tags_to_json(record.descriptive_tags.as_ref())?,
                    tags_to_json(record.categorical_tags.as_ref())?,
                    record.intensity,
                    record.location_short,
                    record.location_long,
                    record.duration_ms.map(|d| d as i64),
                    record.is_streamable,
                    record.play_count.map(|c| c as i64),
                    record.media_url,
                    record.image_url,
                    harvested_at,
                ])
                .map_err(|e| {
                    Error::store_write(format!("Failed to upsert {}: {e}", record.natural_key))
                })?;
            }
        }

        tx.commit()
            .map_err(|e| Error::store_write(format!("Failed to commit batch: {e}")))?;

        Ok(records.len())
    }

    async fn get(&self, natural_key: &str) -> Result<Option<CanonicalRecord>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(SELECT_RECORD, params![natural_key], |row| {
                Ok(StoredRow {
                    natural_key: row.get(0)?,
                    parent_alias: row.get(1)?,
                    parent_name: row.get(2)?,
                    title: row.get(3)?,
                    published_at: row.get(4)?,
                    description: row.get(5)?,
                    descriptive_tags: row.get(6)?,
                    categorical_tags: row.get(7)?,
                    intensity: row.get(8)?,
                    location_short: row.get(9)?,
                    location_long: row.get(10)?,
                    duration_ms: row.get(11)?,
                    is_streamable: row.get(12)?,
                    play_count: row.get(13)?,
                    media_url: row.get(14)?,
                    image_url: row.get(15)?,
                })
            });
        let row = optional(row)
            .map_err(|e| Error::store_read(format!("Failed to read {natural_key}: {e}")))?;

        row.map(StoredRow::into_record).transpose()
    }

    async fn counts_by_parent(&self) -> Result<HashMap<String, u64>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT parent_alias, COUNT(*) FROM catalog_records \
                 WHERE parent_alias IS NOT NULL GROUP BY parent_alias",
            )
            .map_err(|e| Error::store_read(format!("Failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
            .map_err(|e| Error::store_read(format!("Failed to count records: {e}")))?;

        let mut counts = HashMap::new();
        for row in rows {
            let (alias, count) =
                row.map_err(|e| Error::store_read(format!("Failed to read count: {e}")))?;
            counts.insert(alias, count.max(0) as u64);
        }
        Ok(counts)
    }

    async fn total_count(&self) -> Result<u64> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM catalog_records", [], |row| row.get(0))
            .map_err(|e| Error::store_read(format!("Failed to count records: {e}")))?;
        Ok(count.max(0) as u64)
    }

    async fn delete_all(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM catalog_records", [])
            .map_err(|e| Error::store_write(format!("Failed to delete records: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for DuckDbStore {
    async fn load_checkpoint(&self, target: &str) -> Result<Option<Checkpoint>> {
        let conn = self.lock()?;
        let row = conn.query_row(
            &format!("{SELECT_CHECKPOINT} WHERE run_target = ?"),
            params![target],
            checkpoint_row,
        );
        let row = optional(row)
            .map_err(|e| Error::state(format!("Failed to read checkpoint for {target}: {e}")))?;

        row.map(CheckpointRow::into_checkpoint).transpose()
    }

    async fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            UPSERT_CHECKPOINT,
            params![
                checkpoint.run_target,
                checkpoint.identity,
                checkpoint.processed_count as i64,
                checkpoint.last_parent,
                checkpoint.resume_cursor,
                checkpoint.records_written as i64,
                checkpoint.updated_at.to_rfc3339(),
            ],
        )
        .map_err(|e| Error::state(format!("Failed to save checkpoint: {e}")))?;
        Ok(())
    }

    async fn clear_checkpoint(&self, target: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM harvest_checkpoints WHERE run_target = ?",
            params![target],
        )
        .map_err(|e| Error::state(format!("Failed to clear checkpoint: {e}")))?;
        Ok(())
    }

    async fn list_checkpoints(&self) -> Result<Vec<Checkpoint>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!("{SELECT_CHECKPOINT} ORDER BY run_target"))
            .map_err(|e| Error::state(format!("Failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map([], checkpoint_row)
            .map_err(|e| Error::state(format!("Failed to list checkpoints: {e}")))?;

        let mut checkpoints = Vec::new();
        for row in rows {
            let row = row.map_err(|e| Error::state(format!("Failed to read checkpoint: {e}")))?;
            checkpoints.push(row.into_checkpoint()?);
        }
        Ok(checkpoints)
    }
}

impl std::fmt::Debug for DuckDbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuckDbStore")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

/// Column values of one `catalog_records` row
struct StoredRow {
    natural_key: String,
    parent_alias: Option<String>,
    parent_name: Option<String>,
    title: Option<String>,
    published_at: Option<String>,
    description: Option<String>,
    descriptive_tags: Option<String>,
    categorical_tags: Option<String>,
    intensity: Option<String>,
    location_short: Option<String>,
    location_long: Option<String>,
    duration_ms: Option<i64>,
    is_streamable: Option<bool>,
    play_count: Option<i64>,
    media_url: String,
    image_url: Option<String>,
}

impl StoredRow {
    fn into_record(self) -> Result<CanonicalRecord> {
        Ok(CanonicalRecord {
            natural_key: self.natural_key,
            parent_alias: self.parent_alias,
            parent_name: self.parent_name,
            title: self.title,
            published_at: self.published_at.as_deref().map(parse_time).transpose()?,
            description: self.description,
            descriptive_tags: tags_from_json(self.descriptive_tags.as_deref())?,
            categorical_tags: tags_from_json(self.categorical_tags.as_deref())?,
            intensity: self.intensity,
            location_short: self.location_short,
            location_long: self.location_long,
            duration_ms: self.duration_ms.map(|d| d.max(0) as u64),
            is_streamable: self.is_streamable,
            play_count: self.play_count.map(|c| c.max(0) as u64),
            media_url: self.media_url,
            image_url: self.image_url,
        })
    }
}

/// Column values of one `harvest_checkpoints` row
struct CheckpointRow {
    run_target: String,
    identity: Option<String>,
    processed_count: i64,
    last_parent: Option<String>,
    resume_cursor: Option<String>,
    records_written: i64,
    updated_at: String,
}

fn checkpoint_row(row: &duckdb::Row<'_>) -> duckdb::Result<CheckpointRow> {
    Ok(CheckpointRow {
        run_target: row.get(0)?,
        identity: row.get(1)?,
        processed_count: row.get(2)?,
        last_parent: row.get(3)?,
        resume_cursor: row.get(4)?,
        records_written: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

impl CheckpointRow {
    fn into_checkpoint(self) -> Result<Checkpoint> {
        Ok(Checkpoint {
            run_target: self.run_target,
            identity: self.identity,
            processed_count: self.processed_count.max(0) as u64,
            last_parent: self.last_parent,
            resume_cursor: self.resume_cursor,
            records_written: self.records_written.max(0) as u64,
            updated_at: parse_time(&self.updated_at)?,
        })
    }
}

/// Treat "no rows" as absence
fn optional<T>(result: duckdb::Result<T>) -> duckdb::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

fn tags_to_json(tags: Option<&BTreeSet<String>>) -> Result<Option<String>> {
    tags.map(serde_json::to_string).transpose().map_err(Error::from)
}

fn tags_from_json(raw: Option<&str>) -> Result<Option<BTreeSet<String>>> {
    raw.map(serde_json::from_str).transpose().map_err(Error::from)
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::store_read(format!("Invalid stored timestamp {raw:?}: {e}")))
}
