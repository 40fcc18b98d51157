//! CLI command implementations
//!
//! Each subcommand has its own module with:
//! - Args struct for command-line arguments
//! - `run()` function to execute the command

use std::path::Path;

use serde_json::Value;

use crate::app::AppContext;
use crate::cli::Commands;
use crate::error::{Result, StoreError};

pub mod backup;
pub mod config;
pub mod health;
pub mod kv;
pub mod load;
pub mod logs;
pub mod migrate;
pub mod probe;
pub mod reconcile;
pub mod scan;

/// Dispatch a command to its handler
pub async fn run(ctx: &AppContext, command: &Commands) -> Result<()> {
    match command {
        Commands::Probe(args) => probe::run(ctx, args),
        Commands::Get(args) => kv::run_get(ctx, args),
        Commands::Set(args) => kv::run_set(ctx, args),
        Commands::Remove(args) => kv::run_remove(ctx, args),
        Commands::Clear(args) => kv::run_clear(ctx, args),
        Commands::Load(args) => load::run_load(ctx, args),
        Commands::Save(args) => load::run_save(ctx, args).await,
        Commands::Reconcile(args) => reconcile::run(ctx, args),
        Commands::Scan(args) => scan::run_scan(ctx, args),
        Commands::HardClear(args) => scan::run_hard_clear(ctx, args),
        Commands::Logs(args) => logs::run(ctx, args).await,
        Commands::Health(args) => health::run(ctx, args),
        Commands::Migrate(args) => migrate::run(ctx, args),
        Commands::Export(args) => backup::run_export(ctx, args),
        Commands::Import(args) => backup::run_import(ctx, args).await,
        Commands::Config(args) => config::run(ctx, args),
    }
}

/// Parse a command-line value as JSON, falling back to a plain string.
#[must_use]
pub fn parse_value(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// Read a JSON document given on the command line.
pub fn read_json_file(path: &Path) -> Result<Value> {
    if !path.exists() {
        return Err(StoreError::NotFound(path.display().to_string()));
    }
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| StoreError::ParseError {
        key: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Compact one-line rendering for human output.
#[must_use]
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}
