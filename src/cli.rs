// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::config::{CommandConfig, CommandsConfig, SchemaConfig, WatchOptions};
use crate::errors::{Result, RewatchError};

/// Command-line arguments for `rewatch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "rewatch",
    version,
    about = "Watch a source tree, rebuild on change, and restart long-running commands.",
    long_about = None,
    args_conflicts_with_subcommands = true
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Schema file, or a directory to look for one in.
    #[arg(value_name = "PATH", default_value = ".")]
    pub path: PathBuf,

    /// Run only this schema (1-based). Repeat to select several.
    #[arg(long, value_name = "N")]
    pub schema: Vec<usize>,

    /// Parse + validate, print the schemas, but don't start anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Don't send desktop notifications when a build fails.
    #[arg(long, global = true)]
    pub no_notify: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `REWATCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Watch and run a single command without a schema file.
    Run(RunArgs),
    /// Print version and platform information.
    Version,
}

/// `rewatch run <RUN> [BUILD]`.
#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Command to run (split on whitespace).
    #[arg(value_name = "RUN")]
    pub run: String,

    /// Command to build with before each run (split on whitespace).
    #[arg(value_name = "BUILD")]
    pub build: Option<String>,

    #[arg(long, default_value = "APP")]
    pub label: String,

    /// Directory to watch.
    #[arg(long, default_value = ".")]
    pub path: PathBuf,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub recursive: bool,

    /// Extension to react to, with its dot (`--ext .go`). Repeatable.
    #[arg(long = "ext", value_name = "EXT")]
    pub extensions: Vec<String>,

    /// Path under the watched directory to ignore. Repeatable.
    #[arg(long = "exclude", value_name = "PATH")]
    pub excluded_paths: Vec<String>,

    /// Env file loaded for every step.
    #[arg(long = "env", value_name = "FILE")]
    pub env_file: Option<PathBuf>,

    #[arg(long, value_name = "MS")]
    pub debounce_ms: Option<u64>,
}

impl RunArgs {
    /// Ad-hoc schema equivalent to these arguments.
    pub fn to_schema(&self) -> Result<SchemaConfig> {
        let run = CommandConfig::from_command_line(&self.run)
            .ok_or_else(|| RewatchError::Config("run command is empty".to_string()))?;

        let build = match &self.build {
            Some(line) => Some(
                CommandConfig::from_command_line(line)
                    .ok_or_else(|| RewatchError::Config("build command is empty".to_string()))?,
            ),
            None => None,
        };

        let mut schema = SchemaConfig {
            label: Some(self.label.clone()),
            env_file: self.env_file.clone(),
            watcher: WatchOptions {
                path: self.path.clone(),
                recursive: self.recursive,
                extensions: self.extensions.clone(),
                excluded_paths: self.excluded_paths.clone(),
            },
            commands: CommandsConfig {
                build,
                run: vec![run],
                clean: Vec::new(),
            },
            ..SchemaConfig::default()
        };
        if let Some(ms) = self.debounce_ms {
            schema.debounce_ms = ms;
        }
        Ok(schema)
    }
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

impl LogLevel {
    /// Spelling accepted by `--log-level`, for forwarding to child invocations.
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
