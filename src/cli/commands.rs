//! CLI command definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Catalog Harvest CLI
#[derive(Parser, Debug)]
#[command(name = "catalog-harvest")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// YAML configuration file (defaults apply when omitted)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// DuckDB file holding records and the checkpoint
    #[arg(short, long, global = true, default_value = "harvest.duckdb")]
    pub store: PathBuf,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Harvest the parent catalog, resuming where the last run stopped
    Catalog {
        /// Discard the checkpoint and start from the first parent
        #[arg(long)]
        reset: bool,

        /// Also delete every stored record
        #[arg(long)]
        reset_all: bool,
    },

    /// Harvest an account's cursor feed
    Feed {
        /// Account whose items are walked
        #[arg(short, long)]
        account: String,

        /// Client credential appended to every request
        #[arg(long, env = "HARVEST_CLIENT_ID")]
        client_id: Option<String>,

        /// Discard the stored cursor and start from the first page
        #[arg(long)]
        reset: bool,
    },

    /// Show the stored checkpoints and record totals
    Status,
}
