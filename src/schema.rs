// src/schema.rs

//! Runs one schema in the current process: watcher, debouncer and
//! supervisor wired together.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::config::SchemaConfig;
use crate::engine::runtime::EVENT_CHANNEL_CAPACITY;
use crate::engine::{Debouncer, PipelineCore, PipelineEvent, PipelineHandle, Supervisor, SupervisorOptions};
use crate::env::{resolve_step_env, EnvMap};
use crate::errors::{Result, RewatchError};
use crate::exec::{ProcessDefinition, RealProcessBackend};
use crate::fs::{FileSystem, RealFileSystem};
use crate::notification::SharedNotifier;
use crate::output::{Label, SharedOutput};
use crate::watch::path_utils::display_relative;
use crate::watch::{DirectoryWatcher, WatchEvent};

/// Resolved build and run steps of a schema.
#[derive(Debug, Clone)]
pub struct PreparedPipeline {
    pub build: Option<ProcessDefinition>,
    pub run_steps: Vec<ProcessDefinition>,
}

impl PreparedPipeline {
    /// Resolve every step's environment against the schema-wide `env` and
    /// give each step its output label.
    pub fn prepare(schema: &SchemaConfig, env: &EnvMap) -> Result<Self> {
        let label = schema.display_label();

        let build = match &schema.commands.build {
            Some(cmd) => {
                let step_env = resolve_step_env(env, &cmd.envs, cmd.env_file.as_deref())?;
                Some(ProcessDefinition::new(Label::build().sub(label), cmd, &step_env)?)
            }
            None => None,
        };

        let run_steps = schema
            .commands
            .run
            .iter()
            .map(|cmd| {
                let step_env = resolve_step_env(env, &cmd.envs, cmd.env_file.as_deref())?;
                let step_label = Label::schema(label).sub(cmd.label.as_deref().unwrap_or(""));
                ProcessDefinition::new(step_label, cmd, &step_env)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { build, run_steps })
    }

    pub fn run_labels(&self) -> Vec<Label> {
        self.run_steps.iter().map(|d| d.label.clone()).collect()
    }
}

/// Schema-wide environment: `envs` overwritten by `env_file`.
pub fn schema_env(schema: &SchemaConfig) -> Result<EnvMap> {
    let mut env = EnvMap::from(schema.envs.clone());
    if let Some(path) = &schema.env_file {
        env.merge_env_file(path)?;
    }
    Ok(env)
}

/// Supervises one schema until shutdown or a fatal error.
pub struct SchemaRunner {
    schema: SchemaConfig,
    output: SharedOutput,
    notifier: SharedNotifier,
    fs: Arc<dyn FileSystem>,
}

impl SchemaRunner {
    pub fn new(schema: SchemaConfig, output: SharedOutput, notifier: SharedNotifier) -> Self {
        Self {
            schema,
            output,
            notifier,
            fs: Arc::new(RealFileSystem),
        }
    }

    pub fn with_fs(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    /// Run until `shutdown` flips to true (returns `Ok`) or the watcher or
    /// supervisor fails (returns that error after stopping every process).
    ///
    /// Changes the process working directory when the schema has a
    /// `workdir`; callers running several schemas must isolate them in
    /// separate processes.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let label = self.schema.display_label().to_string();
        let watch_label = Label::watcher().sub(&label);

        if let Some(dir) = &self.schema.workdir {
            std::env::set_current_dir(dir).map_err(|e| {
                RewatchError::Filesystem(format!("cannot change directory to {:?}: {e}", dir))
            })?;
            debug!(schema = %label, workdir = ?dir, "changed working directory");
        }

        let env = schema_env(&self.schema)?;
        let prepared = PreparedPipeline::prepare(&self.schema, &env)?;

        let mut watcher = DirectoryWatcher::with_fs(&self.schema.watcher, self.fs.clone())?;
        watcher.start()?;
        let root: PathBuf = watcher.root().to_path_buf();

        let (tx, rx) = mpsc::channel::<PipelineEvent>(EVENT_CHANNEL_CAPACITY);
        let core = PipelineCore::new(
            self.schema.restart,
            prepared.build.is_some(),
            prepared.run_steps.len(),
        );
        let options = SupervisorOptions {
            label: label.clone(),
            run_labels: prepared.run_labels(),
            clean: self.schema.commands.clean.clone(),
            fs: self.fs.clone(),
            output: self.output.clone(),
            notifier: self.notifier.clone(),
        };
        let backend = RealProcessBackend::new(
            prepared.build,
            prepared.run_steps,
            &tx,
            self.output.clone(),
            self.schema.kill_timeout(),
        );
        let handle = PipelineHandle::new(tx);
        let mut supervisor = tokio::spawn(Supervisor::new(core, rx, backend, options).run());

        handle.start().await;
        self.output.push(
            &watch_label,
            &format!("watching {} ({} directories)", root.display(), watcher.watched_count()),
        );
        info!(schema = %label, root = ?root, "schema running");

        let trigger_handle = handle.clone();
        let debouncer = Debouncer::new(self.schema.debounce(), move || trigger_handle.trigger());

        let output = self.output.clone();
        let on_change = |event: WatchEvent| {
            let what = if event.is_dir { "DIRECTORY" } else { "FILE" };
            let line = format!("{} {what}: {}", event.kind, display_relative(&root, &event.path));
            output.push(&watch_label, &line);
            debouncer.trigger();
        };

        let mut supervisor_result = None;
        let watch_result = tokio::select! {
            res = watcher.events(&mut shutdown, on_change) => res,
            joined = &mut supervisor => {
                supervisor_result = Some(joined);
                Ok(())
            }
        };

        debouncer.cancel();
        handle.quit().await;
        drop(handle);

        let supervisor_result = match supervisor_result {
            Some(joined) => joined,
            None => supervisor.await,
        };
        watcher.close();

        let supervised = match supervisor_result {
            Ok(res) => res,
            Err(e) => Err(RewatchError::Other(anyhow::anyhow!("supervisor task failed: {e}"))),
        };

        if let Err(e) = &watch_result {
            warn!(schema = %label, error = %e, "watcher stopped");
        }
        info!(schema = %label, "schema stopped");

        watch_result.and(supervised)
    }
}
