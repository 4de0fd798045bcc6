// src/config/detect.rs

//! Zero-config fallback: synthesize a schema for a plain Go module.

use std::fs;
use std::path::Path;

use crate::config::model::{
    CommandConfig, CommandsConfig, ConfigFile, SchemaConfig, WatchOptions,
};
use crate::errors::{Result, RewatchError};

/// Returns a single-schema config when `dir` holds a `go.mod` and at least one
/// `.go` file, `None` otherwise.
pub fn detect_go_project(dir: &Path) -> Result<Option<ConfigFile>> {
    let mut has_go_mod = false;
    let mut has_go_files = false;

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name == "go.mod" {
            has_go_mod = true;
        } else if name.ends_with(".go") {
            has_go_files = true;
        }
    }

    if !(has_go_mod && has_go_files) {
        return Ok(None);
    }

    let go_mod = fs::read_to_string(dir.join("go.mod"))?;
    let binary = binary_name_from_go_mod(&go_mod).ok_or_else(|| {
        RewatchError::Config("go.mod has no module declaration".to_string())
    })?;

    let env_file = dir.join(".env");
    let schema = SchemaConfig {
        workdir: Some(dir.to_path_buf()),
        env_file: env_file.is_file().then(|| ".env".into()),
        watcher: WatchOptions {
            path: ".".into(),
            recursive: true,
            extensions: vec![".go".to_string()],
            excluded_paths: vec!["vendor".to_string()],
        },
        commands: CommandsConfig {
            build: Some(CommandConfig {
                method: "go".to_string(),
                args: vec!["build".to_string(), "-gcflags=all=-N -l".to_string()],
                ..CommandConfig::default()
            }),
            run: vec![CommandConfig {
                method: format!("./{binary}"),
                ..CommandConfig::default()
            }],
            clean: Vec::new(),
        },
        ..SchemaConfig::default()
    };

    Ok(Some(ConfigFile::new_unchecked(vec![schema])))
}

/// Last path segment of the `module` directive, which is what `go build`
/// names the binary.
pub fn binary_name_from_go_mod(contents: &str) -> Option<String> {
    contents.lines().find_map(|line| {
        let module = line.trim().strip_prefix("module ")?.trim();
        let name = module.rsplit('/').next()?.trim_matches('"');
        (!name.is_empty()).then(|| name.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_name_uses_last_segment() {
        let go_mod = "// header\nmodule github.com/acme/widget\n\ngo 1.22\n";
        assert_eq!(binary_name_from_go_mod(go_mod).as_deref(), Some("widget"));
        assert_eq!(binary_name_from_go_mod("module tool").as_deref(), Some("tool"));
        assert!(binary_name_from_go_mod("go 1.22").is_none());
    }

    #[test]
    fn detects_module_with_sources() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("go.mod"), "module example.com/srv\n").unwrap();
        fs::write(dir.path().join("main.go"), "package main\n").unwrap();
        fs::write(dir.path().join(".env"), "PORT=1\n").unwrap();

        let cfg = detect_go_project(dir.path()).unwrap().expect("go project");
        let schema = &cfg.schemas[0];
        assert_eq!(schema.commands.run[0].method, "./srv");
        assert_eq!(schema.watcher.extensions, vec![".go"]);
        assert_eq!(schema.watcher.excluded_paths, vec!["vendor"]);
        assert_eq!(schema.env_file.as_deref(), Some(Path::new(".env")));
    }

    #[test]
    fn go_mod_alone_is_not_enough() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("go.mod"), "module example.com/srv\n").unwrap();
        assert!(detect_go_project(dir.path()).unwrap().is_none());
    }
}
