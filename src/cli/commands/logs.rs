//! tierkv logs - Show and append log collections

use std::path::PathBuf;

use chrono::Utc;
use clap::{Args, Subcommand};
use serde::Serialize;

use super::read_json_file;
use crate::app::AppContext;
use crate::cli::output::{self, HumanLayout};
use crate::error::{Result, StoreError};
use crate::logs::{parse_entries, LogEntry};

#[derive(Args, Debug)]
pub struct LogsArgs {
    #[command(subcommand)]
    pub command: LogsCommand,
}

#[derive(Subcommand, Debug)]
pub enum LogsCommand {
    /// Print the records of a log key, newest first
    Show {
        /// Log key; the namespace prefix is added when missing
        key: String,

        /// Include the archive companion
        #[arg(long)]
        all: bool,

        /// Print at most this many records
        #[arg(long, short = 'n')]
        limit: Option<usize>,
    },

    /// Merge new records into a log key
    Append {
        /// Log key; the namespace prefix is added when missing
        key: String,

        /// Record type
        #[arg(long = "type", required_unless_present = "file")]
        kind: Option<String>,

        /// Record subject
        #[arg(long, required_unless_present = "file")]
        subject: Option<String>,

        /// Milliseconds since the epoch (default: now)
        #[arg(long)]
        timestamp: Option<i64>,

        /// Read a JSON array of records instead
        #[arg(long, conflicts_with_all = ["kind", "subject", "timestamp"])]
        file: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct LogListing {
    key: String,
    total: usize,
    entries: Vec<LogEntry>,
}

pub async fn run(ctx: &AppContext, args: &LogsArgs) -> Result<()> {
    match &args.command {
        LogsCommand::Show { key, all, limit } => run_show(ctx, key, *all, *limit),
        LogsCommand::Append {
            key,
            kind,
            subject,
            timestamp,
            file,
        } => {
            let entries = match file {
                Some(path) => parse_entries(&read_json_file(path)?).map_err(|reason| {
                    StoreError::ParseError {
                        key: path.display().to_string(),
                        reason,
                    }
                })?,
                None => {
                    let (Some(kind), Some(subject)) = (kind, subject) else {
                        return Err(StoreError::Config(
                            "--type and --subject are required without --file".to_string(),
                        ));
                    };
                    let at = timestamp.unwrap_or_else(|| Utc::now().timestamp_millis());
                    vec![LogEntry::new(kind.as_str(), subject.as_str(), at)]
                }
            };
            run_append(ctx, key, entries).await
        }
    }
}

fn run_show(ctx: &AppContext, key: &str, all: bool, limit: Option<usize>) -> Result<()> {
    let mut entries = if all {
        ctx.engine.load_all_logs(key)
    } else {
        let collection = ctx.engine.log_collection(key);
        collection.into_entries()
    };
    let total = entries.len();
    if let Some(limit) = limit {
        entries.truncate(limit);
    }
    let listing = LogListing {
        key: ctx.engine.key(key).to_string(),
        total,
        entries,
    };

    output::emit(ctx.robot_mode, &listing, |l| {
        let mut layout = HumanLayout::new();
        layout.title(&format!("{} ({} records)", l.key, l.total));
        for entry in &l.entries {
            let when = chrono::DateTime::from_timestamp_millis(entry.timestamp)
                .map_or_else(|| entry.timestamp.to_string(), |t| t.to_rfc3339());
            layout.push_line(format!("{when}  {:<12} {}", entry.kind, entry.subject));
        }
        layout
    })
}

async fn run_append(ctx: &AppContext, key: &str, entries: Vec<LogEntry>) -> Result<()> {
    let outcome = ctx.engine.append_logs(key, entries).await?;
    output::emit(ctx.robot_mode, &outcome, |o| {
        let mut layout = HumanLayout::new();
        if o.added == 0 {
            layout.status(true, &format!("{}: nothing new", o.key));
        } else {
            layout.status(true, &format!("{}: {} added, {} total", o.key, o.added, o.total));
        }
        if o.tombstone_lifted {
            layout.bullet("tombstone lifted");
        }
        layout
    })
}
