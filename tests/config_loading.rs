// tests/config_loading.rs

mod common;
use crate::common::{init_tracing, write_file};

use std::path::PathBuf;

use rewatch::config::{self, ConfigFile};
use rewatch::errors::RewatchError;
use rewatch::types::RestartStrategy;

fn config_err(err: RewatchError) -> String {
    match err {
        RewatchError::Config(msg) => msg,
        other => panic!("expected a configuration error, got {other:?}"),
    }
}

#[test]
fn toml_file_loads_with_defaults_and_workdir() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rewatch.toml");
    write_file(
        &path,
        r#"
[[schema]]
label = "api"
restart = "build_first"
envs = { PORT = "8080" }

[schema.watcher]
extensions = [".go"]
excluded_paths = ["vendor"]

[schema.commands.build]
method = "go"
args = ["build", "-o", "api"]

[[schema.commands.run]]
method = "./api"
label = "server"

[[schema]]
label = "worker"
workdir = "/srv/worker"
debounce_ms = 50

[[schema.commands.run]]
method = "./worker"
"#,
    );

    let cfg = config::load_and_validate(&path).unwrap();
    assert_eq!(cfg.schemas.len(), 2);

    let api = cfg.schema(1).unwrap();
    assert_eq!(api.display_label(), "api");
    assert_eq!(api.workdir.as_deref(), Some(dir.path()));
    assert_eq!(api.restart, RestartStrategy::BuildFirst);
    assert_eq!(api.envs.get("PORT").map(String::as_str), Some("8080"));
    assert!(api.watcher.recursive);
    assert_eq!(api.debounce_ms, 300);
    assert_eq!(api.commands.build.as_ref().unwrap().display(), "go build -o api");
    assert_eq!(api.commands.run[0].label.as_deref(), Some("server"));

    let worker = cfg.schema(2).unwrap();
    assert_eq!(worker.workdir, Some(PathBuf::from("/srv/worker")));
    assert_eq!(worker.debounce_ms, 50);
    assert_eq!(worker.restart, RestartStrategy::TerminateFirst);
    assert!(worker.commands.build.is_none());
}

#[test]
fn directory_lookup_prefers_toml_over_yaml() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write_file(
        &dir.path().join("rewatch.yml"),
        "schema:\n  - label: from-yaml\n    commands:\n      run:\n        - method: ./app\n",
    );
    write_file(
        &dir.path().join("rewatch.toml"),
        "[[schema]]\nlabel = \"from-toml\"\n[[schema.commands.run]]\nmethod = \"./app\"\n",
    );

    let cfg = config::load(dir.path()).unwrap();
    assert_eq!(cfg.schemas[0].display_label(), "from-toml");
}

#[test]
fn extensionless_dotfile_is_json() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write_file(
        &dir.path().join(".rewatch"),
        r#"{"schema":[{"label":"dot","commands":{"run":[{"method":"./app"}]}}]}"#,
    );

    let cfg = config::load(dir.path()).unwrap();
    assert_eq!(cfg.schemas[0].display_label(), "dot");
    assert_eq!(cfg.schemas[0].workdir.as_deref(), Some(dir.path()));
}

#[test]
fn missing_run_steps_name_the_schema() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rewatch.toml");
    write_file(
        &path,
        "[[schema]]\nlabel = \"ok\"\n[[schema.commands.run]]\nmethod = \"./a\"\n\n[[schema]]\nlabel = \"broken\"\n",
    );

    let msg = config_err(config::load_and_validate(&path).unwrap_err());
    assert!(msg.contains("schema[1].commands.run"), "{msg}");
}

#[test]
fn malformed_file_reports_parse_error() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rewatch.json");
    write_file(&path, "{ not json");

    let err = config::load_and_validate(&path).unwrap_err();
    assert!(matches!(err, RewatchError::Json(_)));
    assert!(err.is_configuration());
}

#[test]
fn empty_directory_has_no_config() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();

    let msg = config_err(config::load(dir.path()).unwrap_err());
    assert!(msg.contains("rewatch.toml"), "{msg}");
}

#[test]
fn go_module_without_config_is_detected() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write_file(&dir.path().join("go.mod"), "module github.com/acme/billing\n\ngo 1.22\n");
    write_file(&dir.path().join("main.go"), "package main\n");
    write_file(&dir.path().join(".env"), "PORT=9000\n");

    let cfg: ConfigFile = config::load(dir.path()).unwrap();
    let schema = &cfg.schemas[0];
    assert_eq!(schema.workdir.as_deref(), Some(dir.path()));
    assert_eq!(schema.env_file, Some(PathBuf::from(".env")));
    assert_eq!(schema.watcher.extensions, vec![".go"]);
    assert_eq!(schema.watcher.excluded_paths, vec!["vendor"]);
    assert_eq!(schema.commands.build.as_ref().unwrap().method, "go");
    assert_eq!(schema.commands.run[0].method, "./billing");
}

#[test]
fn go_mod_without_sources_is_not_a_project() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write_file(&dir.path().join("go.mod"), "module example.com/empty\n");

    assert!(config::load(dir.path()).is_err());
}

const LAUNCH_JSON: &str = r#"{
    // Generated by the Go extension.
    "version": "0.2.0",
    "configurations": [
        {
            // main service
            "name": "api",
            "type": "go",
            "request": "launch",
            "mode": "auto",
            "program": "${workspaceFolder}/cmd/api/main.go",
            "args": ["--port", "8080"],
            "envFile": "${workspaceFolder}/.env",
            "env": {"MODE": "dev"}
        },
        {
            "name": "attach",
            "type": "go",
            "request": "attach",
            "mode": "local",
            "processId": 0
        },
        {
            "name": "worker",
            "type": "go",
            "request": "launch",
            "mode": "auto",
            "program": "${workspaceFolder}/cmd/worker"
        }
    ]
}"#;

#[test]
fn vscode_launch_configurations_become_schemas() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write_file(&dir.path().join(".vscode/launch.json"), LAUNCH_JSON);

    let cfg = config::load(dir.path()).unwrap();
    assert_eq!(cfg.schemas.len(), 2);

    let api = cfg.schema(1).unwrap();
    assert_eq!(api.display_label(), "api");
    assert_eq!(api.workdir, Some(dir.path().join("cmd/api")));
    assert_eq!(api.env_file, Some(dir.path().join(".env")));
    assert_eq!(api.commands.run[0].args, vec!["--port", "8080"]);
    let build = api.commands.build.as_ref().unwrap();
    assert_eq!(build.args.last().map(String::as_str), Some("main.go"));

    let worker = cfg.schema(2).unwrap();
    assert_eq!(worker.display_label(), "worker");
    assert_eq!(worker.workdir, Some(dir.path().join("cmd/worker")));
    assert!(worker.env_file.is_none());
    let build = worker.commands.build.as_ref().unwrap();
    assert_eq!(build.args.last().map(String::as_str), Some("."));
    assert_eq!(
        worker.commands.clean,
        vec![PathBuf::from(&worker.commands.run[0].method)]
    );
}

#[test]
fn go_module_takes_precedence_over_launch_file() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write_file(&dir.path().join("go.mod"), "module example.com/svc\n");
    write_file(&dir.path().join("main.go"), "package main\n");
    write_file(&dir.path().join(".vscode/launch.json"), LAUNCH_JSON);

    let cfg = config::load(dir.path()).unwrap();
    assert_eq!(cfg.schemas.len(), 1);
    assert_eq!(cfg.schemas[0].commands.run[0].method, "./svc");
}

#[test]
fn launch_file_without_go_entries_is_ignored() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write_file(
        &dir.path().join(".vscode/launch.json"),
        r#"{"configurations": [{"name": "web", "type": "node", "request": "launch", "program": "index.js"}]}"#,
    );

    let msg = config_err(config::load(dir.path()).unwrap_err());
    assert!(msg.contains("rewatch.toml"), "{msg}");
}

#[test]
fn malformed_launch_file_is_a_parse_error() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write_file(
        &dir.path().join(".vscode/launch.json"),
        r#"{"configurations": [ invalid json ]}"#,
    );

    let err = config::load(dir.path()).unwrap_err();
    assert!(matches!(err, RewatchError::Json(_)));
}
