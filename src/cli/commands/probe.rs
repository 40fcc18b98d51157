//! tierkv probe - Show tier availability

use clap::Args;

use crate::app::AppContext;
use crate::cli::output::{self, HumanLayout};
use crate::error::Result;

#[derive(Args, Debug)]
pub struct ProbeArgs {}

pub fn run(ctx: &AppContext, _args: &ProbeArgs) -> Result<()> {
    let report = ctx.engine.probe_report();
    output::emit(ctx.robot_mode, report, |report| {
        let mut layout = HumanLayout::new();
        layout.title("Storage tiers");
        layout.kv("selected", report.selected.as_str());
        layout.kv("data dir", &ctx.data_dir.display().to_string());
        layout.blank();
        for probe in &report.results {
            let text = match &probe.detail {
                Some(detail) => format!("{} ({detail})", probe.tier),
                None => probe.tier.to_string(),
            };
            layout.status(probe.available, &text);
        }
        layout
    })
}
