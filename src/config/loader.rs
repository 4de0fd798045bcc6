// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::detect::detect_go_project;
use crate::config::vscode::{detect_vscode_launch, LAUNCH_FILE};
use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, RewatchError};

/// File names looked up, in order, when the tool is pointed at a directory.
pub const DEFAULT_FILE_NAMES: [&str; 9] = [
    "rewatch.toml",
    ".rewatch.toml",
    "rewatch.json",
    ".rewatch.json",
    ".rewatch",
    "rewatch.yml",
    "rewatch.yaml",
    ".rewatch.yml",
    ".rewatch.yaml",
];

/// Serialization format of a schema file, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
    Yaml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => ConfigFormat::Toml,
            Some("yml") | Some("yaml") => ConfigFormat::Yaml,
            // `.rewatch` has no extension and is JSON.
            _ => ConfigFormat::Json,
        }
    }
}

/// Parse a schema file without semantic validation.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    parse_str(&contents, ConfigFormat::from_path(path))
}

pub fn parse_str(contents: &str, format: ConfigFormat) -> Result<RawConfigFile> {
    let raw = match format {
        ConfigFormat::Toml => toml::from_str(contents)?,
        ConfigFormat::Json => serde_json::from_str(contents)?,
        ConfigFormat::Yaml => serde_yaml::from_str(contents)?,
    };
    Ok(raw)
}

/// Load a schema file and validate it.
///
/// Schemas without a `workdir` get the directory that contains the file, so
/// relative watch paths and commands resolve next to the config.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let mut raw = load_from_path(path)?;

    let base = config_root_dir(path);
    for schema in raw.schema.iter_mut() {
        if schema.workdir.is_none() {
            schema.workdir = Some(base.clone());
        }
    }

    ConfigFile::try_from(raw)
}

/// Resolve `path` to a config: a file is loaded directly, a directory is
/// searched for one of [`DEFAULT_FILE_NAMES`] and, failing that, inspected
/// for a Go module and then for Go launch configurations.
pub fn load(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let meta = fs::metadata(path).map_err(|e| {
        RewatchError::Config(format!("cannot access {:?}: {e}", path))
    })?;

    if !meta.is_dir() {
        return load_and_validate(path);
    }

    if let Some(file) = find_config_file(path)? {
        info!(config = ?file, "using config file");
        return load_and_validate(file);
    }

    if let Some(cfg) = detect_go_project(path)? {
        info!(dir = ?path, "no config file found; detected a Go module");
        return Ok(cfg);
    }

    if let Some(cfg) = detect_vscode_launch(path)? {
        info!(dir = ?path, schemas = cfg.schemas.len(), "using Go launch configurations from {LAUNCH_FILE}");
        return Ok(cfg);
    }

    Err(RewatchError::Config(format!(
        "none of these files {:?} were found in {:?}",
        DEFAULT_FILE_NAMES, path
    )))
}

/// First of [`DEFAULT_FILE_NAMES`] that exists as a file in `dir`.
pub fn find_config_file(dir: &Path) -> Result<Option<PathBuf>> {
    for name in DEFAULT_FILE_NAMES {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Ok(Some(candidate));
        }
        debug!(candidate = ?candidate, "config candidate not present");
    }
    Ok(None)
}

/// Directory containing the config file, or `.` for a bare file name.
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_follows_extension() {
        assert_eq!(ConfigFormat::from_path(Path::new("a/rewatch.toml")), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path(Path::new(".rewatch.yml")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("rewatch.yaml")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("rewatch.json")), ConfigFormat::Json);
        assert_eq!(ConfigFormat::from_path(Path::new(".rewatch")), ConfigFormat::Json);
    }

    #[test]
    fn bare_file_name_resolves_to_current_dir() {
        assert_eq!(config_root_dir(Path::new("rewatch.toml")), PathBuf::from("."));
        assert_eq!(
            config_root_dir(Path::new("services/api/rewatch.toml")),
            PathBuf::from("services/api")
        );
    }

    #[test]
    fn yaml_and_json_share_the_same_shape() {
        let yaml = r#"
schema:
  - label: api
    watcher:
      extensions: [".go"]
      excluded_paths: ["vendor"]
    commands:
      build:
        method: go
        args: ["build"]
      run:
        - method: ./api
"#;
        let json = r#"{"schema":[{"label":"api","watcher":{"extensions":[".go"],"excluded_paths":["vendor"]},"commands":{"build":{"method":"go","args":["build"]},"run":[{"method":"./api"}]}}]}"#;

        for raw in [
            parse_str(yaml, ConfigFormat::Yaml).unwrap(),
            parse_str(json, ConfigFormat::Json).unwrap(),
        ] {
            let schema = &raw.schema[0];
            assert_eq!(schema.display_label(), "api");
            assert!(schema.watcher.recursive, "recursive defaults to true");
            assert_eq!(schema.watcher.path, PathBuf::from("."));
            assert_eq!(schema.watcher.extensions, vec![".go"]);
            assert_eq!(schema.commands.build.as_ref().unwrap().method, "go");
            assert_eq!(schema.commands.run[0].method, "./api");
            assert_eq!(schema.debounce_ms, 300);
        }
    }
}
