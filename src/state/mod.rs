//! Checkpoint module
//!
//! Tracks how far a run got so an interrupted run can resume exactly.
//!
//! # Overview
//!
//! The module provides:
//! - `Checkpoint` - the resume record of one run target
//! - `CheckpointStore` - where checkpoints live (file, or a record store)
//! - `CheckpointManager` - load-or-reset semantics on top of a store

mod manager;
mod types;

pub use manager::{CheckpointManager, CheckpointStore, FileCheckpointStore};
pub use types::Checkpoint;
