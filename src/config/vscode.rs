// src/config/vscode.rs

//! Import of Go launch configurations from `.vscode/launch.json`.
//!
//! Only `{"type": "go", "request": "launch", "mode": "auto"}` entries are
//! turned into schemas. Each one builds its program into a throwaway binary
//! inside its working directory, runs it with the configured arguments and
//! removes it on shutdown.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::config::model::{
    CommandConfig, CommandsConfig, ConfigFile, SchemaConfig, WatchOptions,
};
use crate::errors::Result;
use crate::watch::path_utils::{join_normalized, normalize};

/// Location of the launch file inside a workspace.
pub const LAUNCH_FILE: &str = ".vscode/launch.json";

const WORKSPACE_VAR: &str = "${workspaceFolder}";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Launch {
    #[serde(default)]
    pub configurations: Vec<LaunchConfiguration>,
}

/// One entry of `configurations`. Unknown keys are ignored.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LaunchConfiguration {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub request: String,
    pub mode: String,
    pub program: LaunchPath,
    pub args: Vec<String>,
    pub cwd: LaunchPath,
    #[serde(rename = "envFile")]
    pub env_file: LaunchPath,
    pub env: BTreeMap<String, String>,
}

/// A path as written in `launch.json`, possibly starting with
/// `${workspaceFolder}`.
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct LaunchPath(pub String);

impl LaunchPath {
    /// `${workspaceFolder}/x` becomes `./x`; anything else is kept.
    pub fn path(&self) -> String {
        match self.0.strip_prefix(WORKSPACE_VAR) {
            Some(rest) => format!("./{}", rest.trim_start_matches('/')),
            None => self.0.clone(),
        }
    }

    /// The directory to build from: the path itself for a package directory,
    /// its parent for a source file.
    pub fn workdir(&self) -> PathBuf {
        let path = PathBuf::from(self.path());
        if dotted_extension(&path).is_none() {
            return normalize(&path);
        }
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => normalize(parent),
            _ => PathBuf::from("."),
        }
    }

    /// Set, and free of variables other than `${workspaceFolder}`.
    pub fn is_usable(&self) -> bool {
        !self.0.is_empty() && (!self.0.starts_with("${") || self.0.starts_with(WORKSPACE_VAR))
    }

    /// What to hand to `go build`: the file name for a source file, `.` for a
    /// package directory.
    pub fn build_target(&self) -> String {
        let path = PathBuf::from(&self.0);
        match path.file_name() {
            Some(name) if dotted_extension(Path::new(name)).is_some() => {
                name.to_string_lossy().into_owned()
            }
            _ => ".".to_string(),
        }
    }
}

/// Same rule as the watch filter: everything from the last `.` of the file
/// name on.
fn dotted_extension(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_string_lossy();
    name.rfind('.').map(|dot| name[dot..].to_string())
}

impl LaunchConfiguration {
    pub fn is_supported(&self) -> bool {
        self.kind == "go"
            && self.request == "launch"
            && self.mode == "auto"
            && self.program.is_usable()
    }

    fn workdir(&self) -> PathBuf {
        if self.cwd.0.is_empty() {
            self.program.workdir()
        } else {
            normalize(Path::new(&self.cwd.path()))
        }
    }

    /// Schema for this entry, with paths resolved under `workspace`.
    /// `None` for entries that are not Go launch configurations.
    pub fn to_schema(&self, workspace: &Path) -> Option<SchemaConfig> {
        if !self.is_supported() {
            debug!(name = %self.name, kind = %self.kind, "skipping launch configuration");
            return None;
        }

        let env_file = self
            .env_file
            .is_usable()
            .then(|| join_normalized(workspace, Path::new(&self.env_file.path())));

        let binary = format!("./__rewatch_bin{}", rand::random::<u32>());

        Some(SchemaConfig {
            label: (!self.name.is_empty()).then(|| self.name.clone()),
            workdir: Some(join_normalized(workspace, &self.workdir())),
            envs: self.env.clone(),
            env_file,
            watcher: WatchOptions {
                path: PathBuf::from("."),
                recursive: true,
                extensions: vec![".go".to_string()],
                excluded_paths: vec!["vendor".to_string()],
            },
            commands: CommandsConfig {
                build: Some(CommandConfig {
                    method: "go".to_string(),
                    args: vec![
                        "build".to_string(),
                        "-o".to_string(),
                        binary.clone(),
                        self.program.build_target(),
                    ],
                    ..CommandConfig::default()
                }),
                run: vec![CommandConfig {
                    method: binary.clone(),
                    args: self.args.clone(),
                    ..CommandConfig::default()
                }],
                clean: vec![PathBuf::from(binary)],
            },
            ..SchemaConfig::default()
        })
    }
}

impl Launch {
    pub fn schemas(&self, workspace: &Path) -> Vec<SchemaConfig> {
        self.configurations
            .iter()
            .filter_map(|c| c.to_schema(workspace))
            .collect()
    }
}

/// Read `<workspace>/.vscode/launch.json`. `Ok(None)` when there is no such
/// file; unreadable or malformed files are errors.
pub fn load_launch(workspace: &Path) -> Result<Option<Launch>> {
    let file = workspace.join(LAUNCH_FILE);
    if !file.is_file() {
        return Ok(None);
    }

    let contents = fs::read_to_string(&file)?;
    let launch = serde_json::from_str(&strip_line_comments(&contents))?;
    Ok(Some(launch))
}

/// Blank out lines that are `//` comments. Comments after a value on the
/// same line are not supported.
pub fn strip_line_comments(contents: &str) -> String {
    contents
        .lines()
        .map(|line| if line.trim_start().starts_with("//") { "" } else { line })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Schemas for every supported launch configuration in `workspace`, or
/// `None` when there is no launch file or nothing in it is usable.
pub fn detect_vscode_launch(workspace: &Path) -> Result<Option<ConfigFile>> {
    let Some(launch) = load_launch(workspace)? else {
        return Ok(None);
    };

    let workspace = std::path::absolute(workspace)?;
    let schemas = launch.schemas(&workspace);
    if schemas.is_empty() {
        debug!(workspace = ?workspace, "launch.json has no Go launch configurations");
        return Ok(None);
    }
    Ok(Some(ConfigFile::new_unchecked(schemas)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn go_launch(program: &str) -> LaunchConfiguration {
        LaunchConfiguration {
            name: "api".to_string(),
            kind: "go".to_string(),
            request: "launch".to_string(),
            mode: "auto".to_string(),
            program: LaunchPath(program.to_string()),
            ..LaunchConfiguration::default()
        }
    }

    #[test]
    fn workspace_folder_becomes_relative() {
        let p = LaunchPath("${workspaceFolder}/cmd/api/main.go".to_string());
        assert_eq!(p.path(), "./cmd/api/main.go");
        assert_eq!(p.workdir(), PathBuf::from("cmd/api"));
        assert_eq!(p.build_target(), "main.go");

        let p = LaunchPath("${workspaceFolder}".to_string());
        assert_eq!(p.path(), "./");
        assert_eq!(p.workdir(), PathBuf::from("."));
        assert_eq!(p.build_target(), ".");
    }

    #[test]
    fn package_directories_build_in_place() {
        let p = LaunchPath("${workspaceFolder}/cmd/worker".to_string());
        assert_eq!(p.workdir(), PathBuf::from("cmd/worker"));
        assert_eq!(p.build_target(), ".");

        let p = LaunchPath("main.go".to_string());
        assert_eq!(p.workdir(), PathBuf::from("."));
        assert_eq!(p.build_target(), "main.go");
    }

    #[test]
    fn other_variables_are_not_usable() {
        assert!(LaunchPath("${workspaceFolder}/x".to_string()).is_usable());
        assert!(LaunchPath("./x".to_string()).is_usable());
        assert!(!LaunchPath("${file}".to_string()).is_usable());
        assert!(!LaunchPath(String::new()).is_usable());
    }

    #[test]
    fn only_go_launch_auto_entries_are_supported() {
        assert!(go_launch("main.go").is_supported());

        let mut attach = go_launch("main.go");
        attach.request = "attach".to_string();
        assert!(!attach.is_supported());

        let mut node = go_launch("main.go");
        node.kind = "node".to_string();
        assert!(!node.is_supported());

        let mut debug = go_launch("main.go");
        debug.mode = "debug".to_string();
        assert!(!debug.is_supported());

        assert!(!go_launch("${file}").is_supported());
    }

    #[test]
    fn schema_builds_a_throwaway_binary() {
        let mut cfg = go_launch("${workspaceFolder}/cmd/api/main.go");
        cfg.args = vec!["--port".to_string(), "8080".to_string()];
        cfg.env_file = LaunchPath("${workspaceFolder}/.env".to_string());
        cfg.env.insert("MODE".to_string(), "dev".to_string());

        let schema = cfg.to_schema(Path::new("/ws")).unwrap();
        assert_eq!(schema.display_label(), "api");
        assert_eq!(schema.workdir, Some(PathBuf::from("/ws/cmd/api")));
        assert_eq!(schema.env_file, Some(PathBuf::from("/ws/.env")));
        assert_eq!(schema.envs.get("MODE").map(String::as_str), Some("dev"));
        assert_eq!(schema.watcher.extensions, vec![".go"]);
        assert_eq!(schema.watcher.excluded_paths, vec!["vendor"]);

        let build = schema.commands.build.as_ref().unwrap();
        let binary = &schema.commands.run[0].method;
        assert!(binary.starts_with("./__rewatch_bin"));
        assert_eq!(build.method, "go");
        assert_eq!(build.args, vec!["build", "-o", binary.as_str(), "main.go"]);
        assert_eq!(schema.commands.run[0].args, vec!["--port", "8080"]);
        assert_eq!(schema.commands.clean, vec![PathBuf::from(binary)]);
    }

    #[test]
    fn explicit_cwd_wins_over_program_dir() {
        let mut cfg = go_launch("${workspaceFolder}/cmd/api/main.go");
        cfg.cwd = LaunchPath("${workspaceFolder}/deploy".to_string());
        let schema = cfg.to_schema(Path::new("/ws")).unwrap();
        assert_eq!(schema.workdir, Some(PathBuf::from("/ws/deploy")));
        assert!(schema.env_file.is_none());
    }

    #[test]
    fn comment_lines_are_blanked() {
        assert_eq!(strip_line_comments(""), "");
        assert_eq!(strip_line_comments("// a\n  // b"), "\n");
        assert_eq!(
            strip_line_comments("{\n  // who\n  \"name\": \"test\"\n}"),
            "{\n\n  \"name\": \"test\"\n}"
        );
        // URLs inside values stay intact.
        assert_eq!(
            strip_line_comments("\"url\": \"http://x\""),
            "\"url\": \"http://x\""
        );
    }
}
