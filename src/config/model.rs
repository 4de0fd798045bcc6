// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::types::{RestartStrategy, DEFAULT_DEBOUNCE, DEFAULT_KILL_TIMEOUT};

/// Schema file as read from disk, before validation.
///
/// The same shape is accepted as TOML, JSON, or YAML:
///
/// ```toml
/// [[schema]]
/// label = "api"
/// envs = { PORT = "8080" }
///
/// [schema.watcher]
/// path = "."
/// extensions = [".go"]
/// excluded_paths = ["vendor"]
///
/// [schema.commands.build]
/// method = "go"
/// args = ["build", "-o", "app"]
///
/// [[schema.commands.run]]
/// method = "./app"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub schema: Vec<SchemaConfig>,
}

/// Validated configuration. Only constructible through
/// `ConfigFile::try_from(RawConfigFile)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub schemas: Vec<SchemaConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(schemas: Vec<SchemaConfig>) -> Self {
        Self { schemas }
    }

    /// Look up a schema by its 1-based position, the way it is addressed on
    /// the command line.
    pub fn schema(&self, number: usize) -> Option<&SchemaConfig> {
        number.checked_sub(1).and_then(|i| self.schemas.get(i))
    }
}

/// One independently supervised unit.
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaConfig {
    #[serde(default)]
    pub label: Option<String>,

    /// Directory to `chdir` into before anything else starts.
    ///
    /// Filled in with the config file's directory by the loader when absent.
    #[serde(default)]
    pub workdir: Option<PathBuf>,

    /// Schema-wide environment; step environments fall back to it.
    #[serde(default)]
    pub envs: BTreeMap<String, String>,

    #[serde(default)]
    pub env_file: Option<PathBuf>,

    #[serde(default)]
    pub watcher: WatchOptions,

    #[serde(default)]
    pub commands: CommandsConfig,

    /// Quiet period before a burst of changes turns into one reload.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default)]
    pub restart: RestartStrategy,

    /// Grace period between SIGINT and SIGKILL when stopping a process tree.
    #[serde(default = "default_kill_timeout_ms")]
    pub kill_timeout_ms: u64,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            label: None,
            workdir: None,
            envs: BTreeMap::new(),
            env_file: None,
            watcher: WatchOptions::default(),
            commands: CommandsConfig::default(),
            debounce_ms: default_debounce_ms(),
            restart: RestartStrategy::default(),
            kill_timeout_ms: default_kill_timeout_ms(),
        }
    }
}

impl SchemaConfig {
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or("")
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn kill_timeout(&self) -> Duration {
        Duration::from_millis(self.kill_timeout_ms)
    }
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE.as_millis() as u64
}

fn default_kill_timeout_ms() -> u64 {
    DEFAULT_KILL_TIMEOUT.as_millis() as u64
}

/// `watcher` block.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchOptions {
    #[serde(default = "default_watch_path")]
    pub path: PathBuf,

    #[serde(default = "default_recursive")]
    pub recursive: bool,

    /// Extensions with the leading dot (`".go"`). Empty matches everything.
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Sub-paths of `path` to ignore, together with everything beneath them.
    #[serde(default)]
    pub excluded_paths: Vec<String>,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            path: default_watch_path(),
            recursive: default_recursive(),
            extensions: Vec::new(),
            excluded_paths: Vec::new(),
        }
    }
}

fn default_watch_path() -> PathBuf {
    PathBuf::from(".")
}

fn default_recursive() -> bool {
    true
}

/// `commands` block.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CommandsConfig {
    #[serde(default)]
    pub build: Option<CommandConfig>,

    #[serde(default)]
    pub run: Vec<CommandConfig>,

    /// Paths removed when the schema shuts down.
    #[serde(default)]
    pub clean: Vec<PathBuf>,
}

/// A single build or run step.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CommandConfig {
    /// Optional sub-label shown next to the schema label for run steps.
    #[serde(default)]
    pub label: Option<String>,

    pub method: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub envs: BTreeMap<String, String>,

    #[serde(default)]
    pub env_file: Option<PathBuf>,
}

impl CommandConfig {
    /// Build a step from a whitespace-separated command line, as used by
    /// `rewatch run "<cmd>"`.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let method = parts.next()?;
        Some(Self {
            method,
            args: parts.collect(),
            ..Self::default()
        })
    }

    /// `method args...` for display.
    pub fn display(&self) -> String {
        std::iter::once(self.method.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
