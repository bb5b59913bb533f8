//! Lamina - layered container image builder
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use lamina::cli::{Cli, Commands};
use lamina::config::{Config, ConfigManager};
use lamina::error::{LaminaError, LaminaResult};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8, config: &Config) {
    // 0 = warn (spinners only), 1 = info, 2+ = debug
    let filter = match verbose {
        0 => EnvFilter::new("lamina=warn"),
        1 => EnvFilter::new("lamina=info"),
        _ => EnvFilter::new("lamina=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time();
    if config.general.log_format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run() -> LaminaResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = config_manager.load().await?;

    init_logging(cli.verbose, &config);
    debug!("Using config {}", config_manager.path().display());

    let command = async {
        match cli.command {
            Commands::Build(args) => lamina::cli::commands::build(args, &config).await,
            Commands::Batch(args) => lamina::cli::commands::batch(args, &config).await,
            Commands::Inspect(args) => lamina::cli::commands::inspect(args, &config).await,
            Commands::Config(args) => {
                lamina::cli::commands::config(args, &config_manager, &config).await
            }
        }
    };

    // Dropping the command future on Ctrl-C kills resolver subprocesses and
    // removes work directories.
    tokio::select! {
        result = command => result,
        _ = tokio::signal::ctrl_c() => Err(LaminaError::Cancelled),
    }
}
