//! Record store module
//!
//! Persists canonical records idempotently (upsert by natural key).
//!
//! # Overview
//!
//! - `RecordStore` - the storage collaborator the harvester writes through
//! - `persist_batch` - batch persistence with in-batch deduplication
//! - `DuckDbStore` - file or in-memory DuckDB, also holding one checkpoint per run target
//! - `MemoryStore` - in-process store for tests and dry runs

mod batch;
mod database;
mod memory;
mod types;

pub use batch::persist_batch;
pub use database::DuckDbStore;
pub use memory::MemoryStore;
pub use types::{RecordStore, StoreSummary};

#[cfg(test)]
mod tests;
