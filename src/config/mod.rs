// src/config/mod.rs

//! Configuration loading and validation for rewatch.
//!
//! Responsibilities:
//! - Define the serde data model shared by TOML, JSON, and YAML (`model.rs`).
//! - Find and load a schema file from disk (`loader.rs`).
//! - Validate basic invariants like non-empty run lists (`validate.rs`).
//! - Fall back to a synthesized schema for Go modules (`detect.rs`), then
//!   to the Go entries of `.vscode/launch.json` (`vscode.rs`).

pub mod detect;
pub mod loader;
pub mod model;
pub mod validate;
pub mod vscode;

pub use loader::{load, load_and_validate, load_from_path, ConfigFormat, DEFAULT_FILE_NAMES};
pub use model::{
    CommandConfig, CommandsConfig, ConfigFile, RawConfigFile, SchemaConfig, WatchOptions,
};
