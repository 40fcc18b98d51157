//! tierkv health - Write tests and quota usage per tier

use clap::Args;

use crate::app::AppContext;
use crate::cli::output::{self, HumanLayout};
use crate::error::Result;

#[derive(Args, Debug)]
pub struct HealthArgs {}

pub fn run(ctx: &AppContext, _args: &HealthArgs) -> Result<()> {
    let report = ctx.engine.health_check();
    output::emit(ctx.robot_mode, &report, |r| {
        let mut layout = HumanLayout::new();
        layout.title("Storage health");
        layout.kv("selected", r.selected.as_str());
        layout.blank();

        layout.section("Write tests");
        for test in &r.write_tests {
            let text = match &test.detail {
                Some(detail) => format!("{}: {detail}", test.tier),
                None => test.tier.to_string(),
            };
            layout.status(test.passed, &text);
        }
        layout.blank();

        layout.section("Quota");
        for check in &r.quota {
            let usage = match (check.quota, check.percent_used) {
                (Some(quota), Some(percent)) => format!("{} / {quota} bytes ({percent:.1}%)", check.used),
                _ => format!("{} bytes", check.used),
            };
            layout.status(!check.warning, &format!("{}: {usage}", check.tier));
        }

        if !r.issues.is_empty() {
            layout.blank();
            layout.section("Issues");
            for issue in &r.issues {
                layout.bullet(issue);
            }
        }
        layout
    })
}
