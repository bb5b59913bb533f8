//! CLI argument definitions using clap derive

use crate::builder::StrategyChoice;
use crate::config::CONFIG_ENV;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Lamina - layered container images for application directories
///
/// Builds an image from a base image and a source directory, caching the
/// dependency layer in the registry so unchanged dependencies are never
/// installed twice.
#[derive(Parser, Debug)]
#[command(name = "lamina")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = CONFIG_ENV)]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build an image from a source directory and push it
    Build(BuildArgs),

    /// Run several builds from a TOML file
    Batch(BatchArgs),

    /// Show how a directory would be built, without touching a registry
    Inspect(InspectArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// Arguments for the build command
#[derive(Parser, Debug)]
pub struct BuildArgs {
    /// Base image reference
    #[arg(long)]
    pub base: String,

    /// Reference to push the built image to
    #[arg(long)]
    pub name: String,

    /// Application directory
    #[arg(short, long, default_value = ".")]
    pub directory: PathBuf,

    /// Repository holding dependency cache tags
    #[arg(long)]
    pub cache_repo: Option<String>,

    /// Always resolve dependencies, never read or write the cache
    #[arg(long)]
    pub no_cache: bool,

    /// Build against an in-memory registry with an empty base image
    #[arg(long)]
    pub dry_run: bool,

    /// Builder strategy (default: from config, detected when auto)
    #[arg(long, value_enum)]
    pub strategy: Option<StrategyChoice>,
}

/// Arguments for the batch command
#[derive(Parser, Debug)]
pub struct BatchArgs {
    /// TOML file with one `[[build]]` table per image
    pub file: PathBuf,

    /// Maximum builds running at once (default: build.concurrency)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Build against an in-memory registry with empty base images
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the inspect command
#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// Application directory
    #[arg(short, long, default_value = ".")]
    pub directory: PathBuf,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write the default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format for inspect
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON output
    Json,
}
