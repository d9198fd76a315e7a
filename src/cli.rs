// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `buildtrace`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "buildtrace",
    version,
    about = "Run a build/test tool and reconstruct its errors, warnings and test results.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the settings file (TOML).
    ///
    /// A missing file is not an error; defaults are used instead.
    #[arg(long, value_name = "PATH", default_value = "Buildtrace.toml")]
    pub config: PathBuf,

    /// Kill the tool after this long (e.g. `30s`, `10m`). Overrides the
    /// settings file.
    #[arg(long, value_name = "DURATION")]
    pub timeout: Option<String>,

    /// Service-messages directory. Overrides the settings file and the
    /// agent environment.
    #[arg(long, value_name = "DIR")]
    pub service_messages: Option<PathBuf>,

    /// Working directory for the tool.
    #[arg(long, value_name = "DIR")]
    pub working_dir: Option<PathBuf>,

    /// Short display name for the tool (defaults to the executable name).
    #[arg(long, value_name = "NAME")]
    pub name: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `BUILDTRACE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// The tool to run.
    #[arg(required = true)]
    pub program: String,

    /// Arguments passed to the tool.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
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
