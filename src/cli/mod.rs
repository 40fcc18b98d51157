//! CLI module - Command-line interface definitions and handlers
//!
//! Uses clap v4 with derive macros for argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod commands;
pub mod output;

/// tierkv - reconciling key-value store over redundant storage tiers
#[derive(Parser, Debug)]
#[command(name = "tierkv")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable machine-readable JSON output.
    #[arg(long, short = 'm', visible_alias = "machine", global = true)]
    pub robot: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file path (default: ~/.config/tierkv/config.toml)
    #[arg(long, global = true, env = "TIERKV_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding the tier files
    #[arg(long, global = true, env = "TIERKV_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show which storage tiers passed the round-trip probe
    Probe(commands::probe::ProbeArgs),

    /// Read a key from the selected tier only
    Get(commands::kv::GetArgs),

    /// Write a key to the selected tier only
    Set(commands::kv::SetArgs),

    /// Remove a key from the selected tier only
    Remove(commands::kv::RemoveArgs),

    /// Clear the selected tier
    Clear(commands::kv::ClearArgs),

    /// Load the best replica of a key across all tiers
    Load(commands::load::LoadArgs),

    /// Save a key with read-back verification
    Save(commands::load::SaveArgs),

    /// Rewrite the best replica of every registry key to all tiers
    Reconcile(commands::reconcile::ReconcileArgs),

    /// Show where a key physically lives
    Scan(commands::scan::ScanArgs),

    /// Tombstone a key and wipe it from every tier
    HardClear(commands::scan::HardClearArgs),

    /// Inspect and append log collections
    Logs(commands::logs::LogsArgs),

    /// Write-test every tier and report quota usage
    Health(commands::health::HealthArgs),

    /// Copy page-tier data into the extension tier once
    Migrate(commands::migrate::MigrateArgs),

    /// Export registry keys to a JSON snapshot
    Export(commands::backup::ExportArgs),

    /// Restore registry keys from a JSON snapshot
    Import(commands::backup::ImportArgs),

    /// Show the effective configuration
    Config(commands::config::ConfigArgs),
}
