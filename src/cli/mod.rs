//! CLI module
//!
//! Command-line interface for running harvests.
//!
//! # Commands
//!
//! - `catalog` - Harvest every reachable parent's children
//! - `feed` - Walk an account's cursor-paginated feed
//! - `status` - Show the stored checkpoint and record totals

mod commands;
mod runner;

pub use commands::{Cli, Commands};
pub use runner::Runner;
