//! tierkv - Reconciling key-value store CLI
//!
//! Keeps namespaced values consistent across several unreliable storage tiers.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tierkv::app::AppContext;
use tierkv::cli::output::{emit_json, robot_error_structured};
use tierkv::cli::Cli;
use tierkv::{Result, StoreError};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.robot {
                // Robot mode: structured error to stdout
                if let Err(emit_err) = emit_json(&robot_error_structured(&e)) {
                    eprintln!("Error: {e} ({emit_err})");
                }
            } else {
                eprintln!("Error: {e}");
                eprintln!("Hint: {}", e.to_structured().suggestion);
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(StoreError::Io)?;
    let ctx = AppContext::from_cli(cli)?;
    runtime.block_on(tierkv::cli::commands::run(&ctx, &cli.command))
}

fn init_tracing(cli: &Cli) {
    if cli.quiet {
        return;
    }

    let filter = match cli.verbose {
        0 => "warn,tierkv=info",
        1 => "info,tierkv=debug",
        2 => "debug,tierkv=trace",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    if cli.robot {
        // JSON logging for robot mode
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
