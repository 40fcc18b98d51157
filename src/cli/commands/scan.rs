//! tierkv scan/hard-clear - Per-tier inspection and sticky wipes

use clap::Args;

use crate::app::AppContext;
use crate::cli::output::{self, HumanLayout};
use crate::error::Result;

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Key to inspect; the namespace prefix is added when missing
    pub key: String,
}

#[derive(Args, Debug)]
pub struct HardClearArgs {
    /// Key to wipe; the namespace prefix is added when missing
    pub key: String,
}

pub fn run_scan(ctx: &AppContext, args: &ScanArgs) -> Result<()> {
    let report = ctx.engine.scan_all_locations(&args.key);
    output::emit(ctx.robot_mode, &report, |r| {
        let mut layout = HumanLayout::new();
        layout.title(&format!("Locations of {}", r.key));
        if r.tombstoned {
            layout.bullet("tombstoned: reads return an empty list");
        }
        for location in &r.locations {
            layout.section(location.tier.as_str());
            if let Some(error) = &location.error {
                layout.status(false, error);
            } else if !location.found {
                layout.kv("found", "no");
            } else if location.corrupted {
                layout.status(false, "stored text is not valid JSON");
            } else {
                layout.kv("type", location.data_type.unwrap_or("unknown"));
                layout.kv("items", &location.item_count.unwrap_or(0).to_string());
            }
            if let Some(preview) = &location.preview {
                layout.kv("preview", preview);
            }
            layout.blank();
        }
        layout
    })
}

pub fn run_hard_clear(ctx: &AppContext, args: &HardClearArgs) -> Result<()> {
    let report = ctx.engine.hard_clear(&args.key);
    output::emit(ctx.robot_mode, &report, |r| {
        let mut layout = HumanLayout::new();
        layout.status(
            r.errors.is_empty(),
            &format!("{} and {} cleared on {} tier(s)", r.key, r.archive, r.cleared.len()),
        );
        for error in &r.errors {
            layout.bullet(error);
        }
        layout
    })
}
