//! tierkv get/set/remove/clear - Single-tier access without reconciliation

use clap::Args;
use serde::Serialize;
use serde_json::Value;

use super::{parse_value, render_value};
use crate::app::AppContext;
use crate::backend::TierId;
use crate::cli::output::{self, HumanLayout};
use crate::error::{Result, StoreError};

#[derive(Args, Debug)]
pub struct GetArgs {
    /// Exact storage key (no prefix is added)
    pub key: String,

    /// Value printed when the key is absent (JSON or plain text)
    #[arg(long)]
    pub default: Option<String>,
}

#[derive(Args, Debug)]
pub struct SetArgs {
    /// Exact storage key (no prefix is added)
    pub key: String,

    /// Value to store (JSON or plain text)
    pub value: String,
}

#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Exact storage key (no prefix is added)
    pub key: String,
}

#[derive(Args, Debug)]
pub struct ClearArgs {
    /// Required: clearing drops every key on the selected tier
    #[arg(long)]
    pub yes: bool,
}

#[derive(Serialize)]
struct KvResult {
    key: String,
    tier: TierId,
    value: Value,
}

#[derive(Serialize)]
struct ClearResult {
    tier: TierId,
    cleared: bool,
}

pub fn run_get(ctx: &AppContext, args: &GetArgs) -> Result<()> {
    let default = args.default.as_deref().map_or(Value::Null, parse_value);
    let result = KvResult {
        key: args.key.clone(),
        tier: ctx.engine.selected_tier(),
        value: ctx.engine.get(&args.key, default),
    };
    output::emit(ctx.robot_mode, &result, |r| {
        let mut layout = HumanLayout::new();
        layout.push_line(render_value(&r.value));
        layout
    })
}

pub fn run_set(ctx: &AppContext, args: &SetArgs) -> Result<()> {
    let value = parse_value(&args.value);
    if !ctx.engine.set(&args.key, &value) {
        return Err(StoreError::WriteFailed {
            key: args.key.clone(),
        });
    }
    let result = KvResult {
        key: args.key.clone(),
        tier: ctx.engine.selected_tier(),
        value,
    };
    output::emit(ctx.robot_mode, &result, |r| {
        let mut layout = HumanLayout::new();
        layout.status(true, &format!("{} stored on {}", r.key, r.tier));
        layout
    })
}

pub fn run_remove(ctx: &AppContext, args: &RemoveArgs) -> Result<()> {
    if !ctx.engine.remove(&args.key) {
        return Err(StoreError::WriteFailed {
            key: args.key.clone(),
        });
    }
    let result = KvResult {
        key: args.key.clone(),
        tier: ctx.engine.selected_tier(),
        value: Value::Null,
    };
    output::emit(ctx.robot_mode, &result, |r| {
        let mut layout = HumanLayout::new();
        layout.status(true, &format!("{} removed from {}", r.key, r.tier));
        layout
    })
}

pub fn run_clear(ctx: &AppContext, args: &ClearArgs) -> Result<()> {
    if !args.yes {
        return Err(StoreError::Config(
            "refusing to clear without --yes".to_string(),
        ));
    }
    let result = ClearResult {
        tier: ctx.engine.selected_tier(),
        cleared: ctx.engine.clear(),
    };
    output::emit(ctx.robot_mode, &result, |r| {
        let mut layout = HumanLayout::new();
        if r.cleared {
            layout.status(true, &format!("{} cleared", r.tier));
        } else {
            layout.status(false, &format!("{} has no bulk clear; nothing removed", r.tier));
        }
        layout
    })
}
