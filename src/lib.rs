// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # Catalog Harvest
//!
//! Incremental, resumable harvesting of paginated, rate-limited catalog APIs
//! into a local DuckDB store.
//!
//! ## Features
//!
//! - **Offset Ceiling Workaround**: Reaches parents past the upstream's
//!   largest accepted offset by merging several sort orders
//! - **Incremental Sync**: Skips parents whose stored count already matches
//! - **Resumable Runs**: A checkpoint survives interruption; reruns continue
//! - **Cursor Feeds**: Follows opaque `next_href` cursors verbatim
//! - **Patient Fetching**: Backoff on throttling, request spacing, retries
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use catalog_harvest::config::HarvestConfig;
//! use catalog_harvest::engine::Harvester;
//! use catalog_harvest::http::{HttpClient, HttpClientConfig};
//! use catalog_harvest::state::CheckpointManager;
//! use catalog_harvest::store::DuckDbStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> catalog_harvest::Result<()> {
//!     let config = HarvestConfig::load("harvest.yaml")?;
//!     let client = HttpClient::with_config(HttpClientConfig::from_settings(
//!         &config.http,
//!         &config.api,
//!     ))?;
//!     let store = Arc::new(DuckDbStore::open("harvest.duckdb")?);
//!     let checkpoints = CheckpointManager::new(store.clone());
//!
//!     let harvester = Harvester::new(Arc::new(client), store, checkpoints, config);
//!     let report = harvester.run_catalog().await?;
//!     println!("{} records written", report.stats.records_written);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          Harvester                              │
//! │  run_catalog() → HarvestReport     run_feed(account) → Report   │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌──────────┬───────────┬───────┴───────┬───────────┬─────────────┐
//! │  Fetch   │ Paginate  │    Catalog    │  Extract  │   Persist   │
//! ├──────────┼───────────┼───────────────┼───────────┼─────────────┤
//! │ Retry    │ Offset    │ Sort passes   │ Episodes  │ DuckDB      │
//! │ Backoff  │ Cursor    │ Sync planner  │ Tracks    │ Checkpoint  │
//! │ Spacing  │ Walker    │               │           │             │
//! └──────────┴───────────┴───────────────┴───────────┴─────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(missing_docs)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Run configuration
pub mod config;

/// HTTP fetcher with retry, backoff and request spacing
pub mod http;

/// Page envelope decoding
pub mod decode;

/// Offset and cursor pagination
pub mod pagination;

/// Parent enumeration past the offset ceiling
pub mod catalog;

/// Per-parent sync planning
pub mod sync;

/// Record extraction
pub mod extract;

/// Checkpointing
pub mod state;

/// Record stores
pub mod store;

/// Main execution engine
pub mod engine;

/// Command-line interface
pub mod cli;

#[cfg(test)]
mod testing;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use config::HarvestConfig;
pub use engine::{HarvestReport, Harvester};
pub use store::{DuckDbStore, RecordStore};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
