// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `cadence`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "cadence",
    version,
    about = "Run commands on timers, on other tasks' results, or in batches.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Cadence.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Cadence.toml")]
    pub config: String,

    /// Stop all tasks after this long (e.g. `30s`, `5m`).
    ///
    /// Overrides `[config].run_for`.
    #[arg(long, value_name = "DURATION")]
    pub run_for: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `CADENCE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print each task's trigger plan, but don't execute
    /// any commands.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
