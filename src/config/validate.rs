// src/config/validate.rs

use crate::config::model::{CommandConfig, ConfigFile, RawConfigFile, SchemaConfig};
use crate::errors::{Result, RewatchError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::RewatchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.schema))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_schemas(cfg)?;
    for (i, schema) in cfg.schema.iter().enumerate() {
        validate_schema(i, schema)?;
    }
    Ok(())
}

fn ensure_has_schemas(cfg: &RawConfigFile) -> Result<()> {
    if cfg.schema.is_empty() {
        return Err(RewatchError::Config(
            "config must contain at least one schema".to_string(),
        ));
    }
    Ok(())
}

fn validate_schema(index: usize, schema: &SchemaConfig) -> Result<()> {
    let prefix = format!("schema[{index}]");

    if schema.debounce_ms == 0 {
        return Err(RewatchError::Config(format!(
            "{prefix}.debounce_ms must be >= 1 (got 0)"
        )));
    }

    if let Some(ref build) = schema.commands.build {
        validate_command(&format!("{prefix}.commands.build"), build)?;
    }

    if schema.commands.run.is_empty() {
        return Err(RewatchError::Config(format!(
            "{prefix}.commands.run: list of commands to run is empty"
        )));
    }

    for (i, run) in schema.commands.run.iter().enumerate() {
        validate_command(&format!("{prefix}.commands.run[{i}]"), run)?;
    }

    Ok(())
}

fn validate_command(path: &str, cmd: &CommandConfig) -> Result<()> {
    if cmd.method.trim().is_empty() {
        return Err(RewatchError::Config(format!("{path}: method is empty")));
    }
    Ok(())
}
