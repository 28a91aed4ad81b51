//! Command-line interface definitions.
//!
//! Defines the CLI structure for the runtime using `clap`: `run` starts the
//! service in the foreground, `check` validates a configuration file.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG: &str = "config.toml";

/// Periodic wind-park simulation runtime
#[derive(Parser, Debug)]
#[command(name = "eolica-runtime")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the simulation service (foreground)
    Run(RunArgs),

    /// Validate a configuration file and exit
    Check(ConfigPathArg),
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,

    /// Override log level (debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Use JSON log format instead of pretty-printed logs.
    #[arg(long)]
    pub json_logs: bool,
}

#[derive(Args, Debug)]
pub struct ConfigPathArg {
    /// Path to the configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,
}
