// src/exec/process.rs

//! A single supervised OS process.

use std::fmt;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::CommandConfig;
use crate::env::{EnvMap, LOCK_VAR, SUB_VAR};
use crate::errors::{Result, RewatchError};
use crate::exec::kill::terminate_tree;
use crate::output::{Label, SharedOutput};

/// Everything needed to spawn one step: resolved once when the pipeline is
/// prepared and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessDefinition {
    pub label: Label,
    pub program: String,
    pub args: Vec<String>,
    /// Appended to the inherited environment.
    pub env: Vec<(String, String)>,
}

impl ProcessDefinition {
    pub fn new(label: Label, command: &CommandConfig, env: &EnvMap) -> Result<Self> {
        Ok(Self {
            label,
            program: command.method.trim().to_string(),
            args: command.args.clone(),
            env: env.to_vars()?,
        })
    }

    /// `program arg1 arg2`, for messages.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// A running (or exited, not yet dropped) process and its output pumps.
///
/// Dropping the handle kills the direct child.
pub struct ProcessHandle {
    program: String,
    pid: Option<u32>,
    child: Child,
    pumps: Vec<JoinHandle<()>>,
}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("program", &self.program)
            .field("pid", &self.pid)
            .finish_non_exhaustive()
    }
}

impl ProcessHandle {
    /// Spawn `def`, streaming stdout and stderr line by line into `output`
    /// under the definition's label.
    ///
    /// On unix the child leads a new process group, so the whole tree it
    /// starts can be signalled at once.
    pub fn start(def: &ProcessDefinition, output: SharedOutput) -> Result<Self> {
        let mut cmd = Command::new(&def.program);
        cmd.args(&def.args)
            .envs(def.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            // Steps must not start a nested supervisor of their own.
            .env(LOCK_VAR, "1")
            .env_remove(SUB_VAR)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|source| RewatchError::Spawn {
            program: def.program.clone(),
            source,
        })?;

        let pid = child.id();
        info!(program = %def.program, pid, label = %def.label, "process started");

        let mut pumps = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            pumps.push(pump_lines(stdout, def.label.clone(), output.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            pumps.push(pump_lines(stderr, def.label.clone(), output));
        }

        Ok(Self {
            program: def.program.clone(),
            pid,
            child,
            pumps,
        })
    }

    /// OS pid captured at spawn time.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Wait for the process to exit on its own, then for its output to be
    /// fully relayed.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        let status = self.child.wait().await?;
        self.drain_output().await;
        Ok(status)
    }

    /// Terminate the whole process tree and wait until it is reaped.
    /// Calling this on a process that already exited is a no-op.
    pub async fn terminate(&mut self, grace: Duration) -> std::io::Result<()> {
        debug!(program = %self.program, pid = self.pid, "terminating process tree");
        terminate_tree(&mut self.child, grace).await?;
        self.drain_output().await;
        Ok(())
    }

    async fn drain_output(&mut self) {
        // Pumps end at EOF, which can lag when a grandchild still holds the
        // pipe open; don't let that block a restart.
        for pump in self.pumps.drain(..) {
            if tokio::time::timeout(Duration::from_millis(500), pump).await.is_err() {
                debug!(program = %self.program, "output pump still open after exit");
            }
        }
    }
}

fn pump_lines<R>(reader: R, label: Label, output: SharedOutput) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => output.push(&label, &line),
                Ok(None) => break,
                Err(e) => {
                    debug!(label = %label, error = %e, "stopped reading process output");
                    break;
                }
            }
        }
    })
}
