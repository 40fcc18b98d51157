//! tierkv export/import - JSON snapshots of the registry keys

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;

use crate::app::AppContext;
use crate::backup::Snapshot;
use crate::cli::output::{self, HumanLayout};
use crate::error::Result;

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Write the snapshot here instead of stdout
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Snapshot file to restore
    pub path: PathBuf,
}

#[derive(Serialize)]
struct ExportSummary {
    path: String,
    keys: usize,
}

pub fn run_export(ctx: &AppContext, args: &ExportArgs) -> Result<()> {
    let snapshot = ctx.engine.export_snapshot();
    let Some(path) = &args.output else {
        // Without a target the snapshot itself is the output.
        return if ctx.robot_mode {
            output::emit_json(&output::robot_ok(&snapshot))
        } else {
            output::emit_json(&snapshot)
        };
    };

    snapshot.write(path)?;
    let summary = ExportSummary {
        path: path.display().to_string(),
        keys: snapshot.len(),
    };
    output::emit(ctx.robot_mode, &summary, |s| {
        let mut layout = HumanLayout::new();
        layout.status(true, &format!("exported {} key(s) to {}", s.keys, s.path));
        layout
    })
}

pub async fn run_import(ctx: &AppContext, args: &ImportArgs) -> Result<()> {
    let snapshot = Snapshot::read(&args.path)?;
    let report = ctx.engine.import_snapshot(&snapshot).await?;
    output::emit(ctx.robot_mode, &report, |r| {
        let mut layout = HumanLayout::new();
        layout.status(r.failed.is_empty(), &format!("restored {} key(s)", r.restored.len()));
        for key in &r.failed {
            layout.bullet(&format!("not restored: {key}"));
        }
        layout
    })
}
