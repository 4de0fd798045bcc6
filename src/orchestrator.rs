// src/orchestrator.rs

//! Multi-schema mode.
//!
//! Each schema may `chdir` to its own working directory, which is process
//! wide, so every schema runs in a child invocation of this binary
//! (`--schema N`). Children run under a pseudo-terminal so their colored
//! output looks the same as when run directly; lines are relayed to our
//! stdout unchanged.

use std::fmt;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use portable_pty::{native_pty_system, ChildKiller, CommandBuilder, PtySize};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::env::{LOCK_VAR, SUB_VAR};
use crate::errors::{Result, RewatchError};
use crate::output::{Label, SharedOutput};

/// How one child invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildExit {
    pub schema: usize,
    pub success: bool,
    pub code: u32,
}

/// Live child, kept so an interrupt can be broadcast to it.
struct ChildControl {
    schema: usize,
    pid: Option<u32>,
    killer: Box<dyn ChildKiller + Send + Sync>,
}

type Registry = Arc<Mutex<Vec<ChildControl>>>;

#[derive(Clone)]
pub struct MultiSchemaOrchestrator {
    program: PathBuf,
    base_args: Vec<String>,
    output: SharedOutput,
}

impl fmt::Debug for MultiSchemaOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiSchemaOrchestrator")
            .field("program", &self.program)
            .field("base_args", &self.base_args)
            .finish_non_exhaustive()
    }
}

impl MultiSchemaOrchestrator {
    /// Children re-run the current executable with `base_args` followed by
    /// `--schema N`.
    pub fn new(base_args: Vec<String>, output: SharedOutput) -> Result<Self> {
        let program = std::env::current_exe()
            .map_err(|e| RewatchError::Filesystem(format!("cannot locate own executable: {e}")))?;
        Ok(Self::with_program(program, base_args, output))
    }

    pub fn with_program(program: impl Into<PathBuf>, base_args: Vec<String>, output: SharedOutput) -> Self {
        Self {
            program: program.into(),
            base_args,
            output,
        }
    }

    /// Argument list of the child running `schema`.
    pub fn child_args(&self, schema: usize) -> Vec<String> {
        let mut args = self.base_args.clone();
        args.push("--schema".to_string());
        args.push(schema.to_string());
        args
    }

    /// Run one child per schema number until all of them have exited.
    ///
    /// When `shutdown` flips to true, every child is interrupted (it then
    /// stops its own process trees) and awaited. Non-zero exits are reported
    /// unless they follow such an interrupt; one child failing never stops
    /// its siblings.
    pub async fn run(&self, schemas: &[usize], mut shutdown: watch::Receiver<bool>) -> Result<Vec<ChildExit>> {
        let registry: Registry = Arc::new(Mutex::new(Vec::new()));
        let exiting = Arc::new(AtomicBool::new(false));
        let cwd = std::env::current_dir()?;

        let mut children = JoinSet::new();
        for &schema in schemas {
            let program = self.program.clone();
            let args = self.child_args(schema);
            let output = self.output.clone();
            let registry = Arc::clone(&registry);
            let exiting = Arc::clone(&exiting);
            let cwd = cwd.clone();

            children.spawn_blocking(move || {
                run_child(schema, program, args, cwd, output, registry, exiting)
            });
        }
        info!(children = schemas.len(), "multi-schema orchestrator started");

        let mut exits = Vec::with_capacity(schemas.len());
        let mut listening = true;

        loop {
            tokio::select! {
                changed = shutdown.changed(), if listening => {
                    match changed {
                        Ok(()) if *shutdown.borrow() => {
                            listening = false;
                            exiting.store(true, Ordering::SeqCst);
                            broadcast_interrupt(&registry);
                        }
                        Ok(()) => {}
                        Err(_) => listening = false,
                    }
                }
                next = children.join_next() => match next {
                    None => break,
                    Some(Ok(Ok(exit))) => {
                        self.report(&exit, exiting.load(Ordering::SeqCst));
                        exits.push(exit);
                    }
                    Some(Ok(Err(e))) => {
                        self.output.push(&Label::system(), &format!("ERROR: {e:#}"));
                    }
                    Some(Err(e)) => warn!(error = %e, "child relay thread failed"),
                },
            }
        }

        info!("all schema children exited");
        Ok(exits)
    }

    fn report(&self, exit: &ChildExit, exiting: bool) {
        if exit.success {
            debug!(schema = exit.schema, "child exited cleanly");
        } else if exiting {
            debug!(schema = exit.schema, code = exit.code, "child exited during shutdown");
        } else {
            self.output.push(
                &Label::system(),
                &format!("schema {} exited with code {}", exit.schema, exit.code),
            );
        }
    }
}

/// Spawn one child under a pty, relay its output, and wait for it.
fn run_child(
    schema: usize,
    program: PathBuf,
    args: Vec<String>,
    cwd: PathBuf,
    output: SharedOutput,
    registry: Registry,
    exiting: Arc<AtomicBool>,
) -> anyhow::Result<ChildExit> {
    let pty = native_pty_system();
    let pair = pty
        .openpty(PtySize {
            rows: 24,
            cols: 120,
            pixel_width: 0,
            pixel_height: 0,
        })
        .context("opening pseudo-terminal")?;

    let mut cmd = CommandBuilder::new(&program);
    cmd.args(&args);
    cmd.cwd(&cwd);
    cmd.env(SUB_VAR, "1");
    cmd.env(LOCK_VAR, "1");

    let mut child = pair
        .slave
        .spawn_command(cmd)
        .with_context(|| format!("spawning schema {schema} child {:?}", program))?;
    // Only the child may hold the slave end, or reads never see EOF.
    drop(pair.slave);

    let pid = child.process_id();
    debug!(schema, pid, "schema child started");

    {
        let mut live = registry.lock().unwrap_or_else(|p| p.into_inner());
        live.push(ChildControl {
            schema,
            pid,
            killer: child.clone_killer(),
        });
    }
    // Shutdown may have started while we were spawning.
    if exiting.load(Ordering::SeqCst) {
        broadcast_interrupt(&registry);
    }

    let reader = pair.master.try_clone_reader().context("reading pseudo-terminal")?;
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                output.push_raw(line.trim_end_matches(['\r', '\n']));
            }
            // EIO once the child side is closed.
            Err(e) => {
                debug!(schema, error = %e, "pty closed");
                break;
            }
        }
    }

    let status = child.wait().context("waiting for schema child")?;
    drop(pair.master);

    registry
        .lock()
        .unwrap_or_else(|p| p.into_inner())
        .retain(|c| c.schema != schema);

    Ok(ChildExit {
        schema,
        success: status.success(),
        code: status.exit_code(),
    })
}

/// Ask every live child to shut down the way Ctrl-C would.
fn broadcast_interrupt(registry: &Registry) {
    let mut live = registry.lock().unwrap_or_else(|p| p.into_inner());
    for child in live.iter_mut() {
        interrupt(child);
    }
}

#[cfg(unix)]
fn interrupt(child: &mut ChildControl) {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.pid.and_then(|p| i32::try_from(p).ok()) else {
        kill_child(child);
        return;
    };

    match kill(Pid::from_raw(pid), Signal::SIGINT) {
        Ok(()) | Err(Errno::ESRCH) => debug!(schema = child.schema, pid, "interrupted schema child"),
        Err(errno) => {
            warn!(schema = child.schema, pid, %errno, "failed to interrupt schema child");
            kill_child(child);
        }
    }
}

#[cfg(not(unix))]
fn interrupt(child: &mut ChildControl) {
    kill_child(child);
}

fn kill_child(child: &mut ChildControl) {
    if let Err(e) = child.killer.kill() {
        debug!(schema = child.schema, error = %e, "schema child already gone");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::ConsoleOutput;

    #[test]
    fn child_args_append_schema_selector() {
        let orchestrator = MultiSchemaOrchestrator::with_program(
            "/usr/bin/rewatch",
            vec!["/proj/rewatch.toml".to_string(), "--no-notify".to_string()],
            ConsoleOutput::shared(),
        );
        assert_eq!(
            orchestrator.child_args(2),
            vec!["/proj/rewatch.toml", "--no-notify", "--schema", "2"]
        );
    }
}
