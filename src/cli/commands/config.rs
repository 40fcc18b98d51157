//! tierkv config - Show the effective configuration

use clap::Args;
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::output;
use crate::config::Config;
use crate::error::{Result, StoreError};

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Print only the resolved file locations
    #[arg(long)]
    pub paths: bool,
}

#[derive(Serialize)]
struct ConfigPaths {
    data_dir: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    config_file: Option<String>,
}

#[derive(Serialize)]
struct ConfigView<'a> {
    #[serde(flatten)]
    paths: ConfigPaths,
    config: &'a Config,
}

pub fn run(ctx: &AppContext, args: &ConfigArgs) -> Result<()> {
    let paths = ConfigPaths {
        data_dir: ctx.data_dir.display().to_string(),
        config_file: ctx.config_path.as_ref().map(|p| p.display().to_string()),
    };

    if args.paths {
        return output::emit(ctx.robot_mode, &paths, |p| {
            let mut layout = output::HumanLayout::new();
            layout.kv("data dir", &p.data_dir);
            layout.kv("config file", p.config_file.as_deref().unwrap_or("(defaults)"));
            layout
        });
    }

    if ctx.robot_mode {
        let view = ConfigView {
            paths,
            config: &ctx.config,
        };
        return output::emit_json(&output::robot_ok(&view));
    }

    let text = toml::to_string_pretty(&ctx.config).map_err(|e| StoreError::Config(e.to_string()))?;
    println!("{text}");
    Ok(())
}
