// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! Only setup failures travel through these variants: a bad schema, an
//! unreadable watch root, a program that cannot be spawned. Per-cycle build
//! and run failures are reported through the output collaborator instead and
//! never end a supervisor.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RewatchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Filesystem error: {0}")]
    Filesystem(String),

    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("env_file {path:?}: {source}")]
    EnvFile {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RewatchError {
    /// True for errors that mean the schema itself is unusable, as opposed to
    /// an environmental failure while it was running.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            RewatchError::Config(_)
                | RewatchError::EnvFile { .. }
                | RewatchError::Toml(_)
                | RewatchError::Json(_)
                | RewatchError::Yaml(_)
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, RewatchError>;
