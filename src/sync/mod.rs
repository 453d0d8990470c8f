//! Incremental sync planning
//!
//! Decides per parent whether its children need fetching by comparing the
//! upstream's reported count with the locally stored count.
//!
//! The comparison is a heuristic: edits to records that were already counted
//! are not detected.

mod planner;

pub use planner::{SyncDecision, SyncPlanner};
