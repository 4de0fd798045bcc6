#![allow(dead_code)]

use std::path::{Path, PathBuf};

use rewatch::config::{CommandConfig, ConfigFile, RawConfigFile, SchemaConfig};
use rewatch::types::RestartStrategy;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn with_schema(mut self, schema: SchemaConfig) -> Self {
        self.config.schema.push(schema);
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `SchemaConfig`.
pub struct SchemaConfigBuilder {
    schema: SchemaConfig,
}

impl SchemaConfigBuilder {
    pub fn new(label: &str) -> Self {
        Self {
            schema: SchemaConfig {
                label: Some(label.to_string()),
                ..SchemaConfig::default()
            },
        }
    }

    pub fn watch(mut self, path: impl AsRef<Path>) -> Self {
        self.schema.watcher.path = path.as_ref().to_path_buf();
        self
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.schema.watcher.recursive = recursive;
        self
    }

    pub fn extension(mut self, ext: &str) -> Self {
        self.schema.watcher.extensions.push(ext.to_string());
        self
    }

    pub fn exclude(mut self, path: &str) -> Self {
        self.schema.watcher.excluded_paths.push(path.to_string());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.schema.envs.insert(key.to_string(), value.to_string());
        self
    }

    pub fn env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.schema.env_file = Some(path.into());
        self
    }

    pub fn build_step(mut self, step: CommandConfig) -> Self {
        self.schema.commands.build = Some(step);
        self
    }

    pub fn run_step(mut self, step: CommandConfig) -> Self {
        self.schema.commands.run.push(step);
        self
    }

    pub fn clean(mut self, path: impl Into<PathBuf>) -> Self {
        self.schema.commands.clean.push(path.into());
        self
    }

    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.schema.debounce_ms = ms;
        self
    }

    pub fn kill_timeout_ms(mut self, ms: u64) -> Self {
        self.schema.kill_timeout_ms = ms;
        self
    }

    pub fn restart(mut self, strategy: RestartStrategy) -> Self {
        self.schema.restart = strategy;
        self
    }

    pub fn build(self) -> SchemaConfig {
        self.schema
    }
}

/// Builder for `CommandConfig`.
pub struct CommandConfigBuilder {
    step: CommandConfig,
}

impl CommandConfigBuilder {
    pub fn new(method: &str) -> Self {
        Self {
            step: CommandConfig {
                method: method.to_string(),
                ..CommandConfig::default()
            },
        }
    }

    /// `sh -c <script>`.
    pub fn shell(script: &str) -> Self {
        Self::new("sh").arg("-c").arg(script)
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.step.args.push(arg.to_string());
        self
    }

    pub fn label(mut self, label: &str) -> Self {
        self.step.label = Some(label.to_string());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.step.envs.insert(key.to_string(), value.to_string());
        self
    }

    pub fn env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.step.env_file = Some(path.into());
        self
    }

    pub fn build(self) -> CommandConfig {
        self.step
    }
}
