//! tierkv migrate - One-time copy from the page tier to the extension tier

use clap::Args;

use crate::app::AppContext;
use crate::cli::output::{self, HumanLayout};
use crate::error::Result;

#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// Only report whether migration already ran
    #[arg(long)]
    pub status: bool,
}

pub fn run(ctx: &AppContext, args: &MigrateArgs) -> Result<()> {
    if args.status {
        let stats = ctx.engine.migration_status()?;
        return output::emit(ctx.robot_mode, &stats, |s| {
            let mut layout = HumanLayout::new();
            match s {
                Some(stats) => {
                    layout.status(true, "migration completed");
                    layout.kv("keys", &stats.migrated_count.to_string());
                    layout.kv("bytes", &stats.total_bytes.to_string());
                    layout.kv("completed", &stats.completed_at.to_rfc3339());
                }
                None => {
                    layout.status(false, "migration has not run");
                }
            }
            layout
        });
    }

    let report = ctx.engine.migrate_to_persistent()?;
    output::emit(ctx.robot_mode, &report, |r| {
        let mut layout = HumanLayout::new();
        if r.already_completed {
            layout.status(true, "migration already completed, nothing to do");
            return layout;
        }
        layout.title("Migration");
        for key in &r.migrated {
            layout.status(true, key);
        }
        for failure in &r.failed {
            layout.status(false, &format!("{}: {}", failure.key, failure.reason));
        }
        layout.blank();
        layout.kv("migrated", &r.migrated.len().to_string());
        layout.kv("kept", &r.kept.len().to_string());
        layout.kv("bytes", &r.total_bytes.to_string());
        layout
    })
}
