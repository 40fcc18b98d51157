//! tierkv reconcile - Converge every registry key across tiers

use clap::Args;

use crate::app::AppContext;
use crate::cli::output::{self, HumanLayout};
use crate::error::Result;

#[derive(Args, Debug)]
pub struct ReconcileArgs {}

pub fn run(ctx: &AppContext, _args: &ReconcileArgs) -> Result<()> {
    let report = ctx.engine.reconcile_all();
    output::emit(ctx.robot_mode, &report, |r| {
        let mut layout = HumanLayout::new();
        layout.title("Reconcile");
        for key in &r.canonicalized {
            let tiers: Vec<&str> = key.written.iter().map(|t| t.as_str()).collect();
            layout.status(
                true,
                &format!("{} from {} (score {}) -> {}", key.key, key.origin, key.score, tiers.join(", ")),
            );
        }
        for failure in &r.errors {
            layout.status(false, &format!("{} on {}: {}", failure.key, failure.tier, failure.message));
        }
        layout.blank();
        layout.kv("canonicalized", &r.canonicalized.len().to_string());
        layout.kv("untouched", &r.untouched.len().to_string());
        layout.kv("duration", &format!("{} ms", r.duration_ms));
        layout
    })
}
