//! tierkv load/save - Reconciling reads and verified writes

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;
use serde_json::Value;

use super::{parse_value, read_json_file, render_value};
use crate::app::AppContext;
use crate::backend::TierId;
use crate::cli::output::{self, HumanLayout};
use crate::error::{Result, StoreError};

#[derive(Args, Debug)]
pub struct LoadArgs {
    /// Key to load; the namespace prefix is added when missing
    pub key: String,

    /// Value returned when no tier holds a usable copy (JSON or plain text)
    #[arg(long)]
    pub fallback: Option<String>,
}

#[derive(Args, Debug)]
pub struct SaveArgs {
    /// Key to save; the namespace prefix is added when missing
    pub key: String,

    /// Value to save (JSON or plain text)
    #[arg(required_unless_present = "file", conflicts_with = "file")]
    pub value: Option<String>,

    /// Read the value from a JSON file instead
    #[arg(long)]
    pub file: Option<PathBuf>,
}

#[derive(Serialize)]
struct LoadResult {
    key: String,
    found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    origin: Option<TierId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    score: Option<i64>,
    value: Value,
}

pub fn run_load(ctx: &AppContext, args: &LoadArgs) -> Result<()> {
    let key = ctx.engine.key(&args.key);
    let result = match ctx.engine.load_detailed(key.as_str()) {
        Some(winner) => LoadResult {
            key: key.to_string(),
            found: true,
            origin: Some(winner.origin),
            score: Some(winner.score),
            value: winner.value,
        },
        None => LoadResult {
            key: key.to_string(),
            found: false,
            origin: None,
            score: None,
            value: args.fallback.as_deref().map_or(Value::Null, parse_value),
        },
    };

    output::emit(ctx.robot_mode, &result, |r| {
        let mut layout = HumanLayout::new();
        if let (Some(origin), Some(score)) = (r.origin, r.score) {
            layout.kv("origin", origin.as_str());
            layout.kv("score", &score.to_string());
            layout.blank();
        }
        layout.push_line(render_value(&r.value));
        layout
    })
}

pub async fn run_save(ctx: &AppContext, args: &SaveArgs) -> Result<()> {
    let value = match (&args.file, &args.value) {
        (Some(path), _) => read_json_file(path)?,
        (None, Some(text)) => parse_value(text),
        (None, None) => {
            return Err(StoreError::Config("a value or --file is required".to_string()));
        }
    };

    let receipt = ctx.engine.save(&args.key, &value).await?;
    output::emit(ctx.robot_mode, &receipt, |r| {
        let mut layout = HumanLayout::new();
        layout.status(true, &format!("{} saved and verified", r.key));
        layout.kv("attempts", &r.attempts.to_string());
        layout.kv("bytes", &r.bytes.to_string());
        layout.kv("mirrored", if r.mirrored { "yes" } else { "no" });
        if r.quota_recovered {
            layout.bullet("recovered from a quota error by purging caches");
        }
        layout
    })
}
