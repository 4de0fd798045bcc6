// src/exec/backend.rs

//! Pluggable process backend abstraction.
//!
//! The supervisor talks to a `ProcessBackend` instead of spawning processes
//! itself. This makes it easy to swap in a fake backend in tests while
//! keeping the production implementation here.
//!
//! - `RealProcessBackend` spawns OS processes, supervises each one in its
//!   own Tokio task, and reports exits back as `PipelineEvent`s.
//! - Tests can provide their own `ProcessBackend` that records the calls it
//!   receives and emits events directly.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::{BuildOutcome, Generation, PipelineEvent, RunOutcome};
use crate::errors::Result;
use crate::exec::kill::terminate_group;
use crate::exec::process::{ProcessDefinition, ProcessHandle};
use crate::output::SharedOutput;

pub type BackendFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Trait abstracting how a pipeline's processes are started and stopped.
///
/// Production code uses [`RealProcessBackend`]; tests can provide their own
/// implementation that doesn't spawn real processes.
pub trait ProcessBackend: Send {
    /// Launch the build step. Completion must be reported later as
    /// `PipelineEvent::BuildFinished`; the future resolves once it started.
    fn start_build(&mut self) -> BackendFuture<'_>;

    /// Stop an in-flight build (if any) and wait until it has exited. No
    /// `BuildFinished` is reported for a terminated build.
    fn terminate_build(&mut self) -> BackendFuture<'_>;

    /// Launch every run step. Steps that later exit on their own are
    /// reported as `PipelineEvent::RunStepExited` tagged with `generation`.
    fn start_run_steps(&mut self, generation: Generation) -> BackendFuture<'_>;

    /// Stop every run step and resolve only once each has been reaped.
    /// Terminated steps are not reported as exited.
    fn terminate_run_steps(&mut self) -> BackendFuture<'_>;
}

/// Internal handle for a supervised process.
///
/// - `cancel` asks the supervising task to terminate the process tree.
/// - `handle` is the Tokio task that owns the process; awaiting it means the
///   process has been reaped.
/// - `pid` also names the process group the child leads.
struct ActiveProcess {
    cancel: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
    pid: Option<u32>,
}

impl ActiveProcess {
    fn request_stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            if cancel.send(()).is_err() {
                debug!(pid = self.pid, "process already finished while cancelling");
            }
        }
    }

    /// Wait for the supervising task, then make sure nothing is left in the
    /// group. A leader that exited on its own was never signalled, so
    /// anything it started in the background is still running.
    async fn join(self, grace: Duration) {
        if let Err(e) = self.handle.await {
            warn!(pid = self.pid, error = %e, "process supervisor task failed");
        }
        if let Some(pgid) = self.pid {
            terminate_group(pgid, grace).await;
        }
    }

    async fn stop(mut self, grace: Duration) {
        self.request_stop();
        self.join(grace).await;
    }
}

/// Real backend used in production.
pub struct RealProcessBackend {
    build: Option<ProcessDefinition>,
    run_steps: Vec<ProcessDefinition>,
    events: mpsc::WeakSender<PipelineEvent>,
    output: SharedOutput,
    kill_timeout: Duration,
    active_build: Option<ActiveProcess>,
    active_steps: Vec<ActiveProcess>,
}

impl fmt::Debug for RealProcessBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealProcessBackend")
            .field("build", &self.build)
            .field("run_steps", &self.run_steps)
            .field("kill_timeout", &self.kill_timeout)
            .finish_non_exhaustive()
    }
}

impl RealProcessBackend {
    /// Only a weak reference to the supervisor channel is kept, so the
    /// channel still closes once every `PipelineHandle` is gone.
    pub fn new(
        build: Option<ProcessDefinition>,
        run_steps: Vec<ProcessDefinition>,
        events: &mpsc::Sender<PipelineEvent>,
        output: SharedOutput,
        kill_timeout: Duration,
    ) -> Self {
        Self {
            build,
            run_steps,
            events: events.downgrade(),
            output,
            kill_timeout,
            active_build: None,
            active_steps: Vec::new(),
        }
    }

    /// Pids of the run steps of the current generation that are still
    /// supervised.
    pub fn run_step_pids(&self) -> Vec<Option<u32>> {
        self.active_steps
            .iter()
            .filter(|p| !p.handle.is_finished())
            .map(|p| p.pid)
            .collect()
    }

    async fn stop_all_steps(&mut self) {
        let mut steps = std::mem::take(&mut self.active_steps);
        // Signal every tree first so they shut down concurrently.
        for step in steps.iter_mut() {
            step.request_stop();
        }
        for step in steps {
            step.join(self.kill_timeout).await;
        }
    }
}

async fn send_event(events: &mpsc::WeakSender<PipelineEvent>, event: PipelineEvent) {
    match events.upgrade() {
        Some(tx) => {
            if tx.send(event).await.is_err() {
                debug!("supervisor gone; dropping process event");
            }
        }
        None => debug!("supervisor gone; dropping process event"),
    }
}

impl ProcessBackend for RealProcessBackend {
    fn start_build(&mut self) -> BackendFuture<'_> {
        Box::pin(async move {
            let Some(def) = self.build.clone() else {
                // Nothing to build counts as an instant success.
                send_event(
                    &self.events,
                    PipelineEvent::BuildFinished(BuildOutcome::Succeeded {
                        elapsed: Duration::ZERO,
                    }),
                )
                .await;
                return Ok(());
            };

            // Never two builds at once.
            if let Some(previous) = self.active_build.take() {
                previous.stop(self.kill_timeout).await;
            }

            let started = Instant::now();
            let mut process = ProcessHandle::start(&def, self.output.clone())?;
            let pid = process.pid();
            let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();
            let events = self.events.clone();
            let grace = self.kill_timeout;

            let handle = tokio::spawn(async move {
                tokio::select! {
                    status = process.wait() => {
                        let outcome = match status {
                            Ok(status) if status.success() => BuildOutcome::Succeeded {
                                elapsed: started.elapsed(),
                            },
                            Ok(status) => BuildOutcome::Failed {
                                reason: format!("{} ({status})", def.command_line()),
                            },
                            Err(e) => BuildOutcome::Failed {
                                reason: format!("{}: {e}", def.command_line()),
                            },
                        };
                        debug!(pid, ?outcome, "build process finished");
                        send_event(&events, PipelineEvent::BuildFinished(outcome)).await;
                    }
                    _ = &mut cancel_rx => {
                        info!(pid, "terminating build");
                        if let Err(e) = process.terminate(grace).await {
                            warn!(pid, error = %e, "failed to terminate build");
                        }
                    }
                }
            });

            self.active_build = Some(ActiveProcess {
                cancel: Some(cancel_tx),
                handle,
                pid,
            });
            Ok(())
        })
    }

    fn terminate_build(&mut self) -> BackendFuture<'_> {
        Box::pin(async move {
            if let Some(build) = self.active_build.take() {
                build.stop(self.kill_timeout).await;
            }
            Ok(())
        })
    }

    fn start_run_steps(&mut self, generation: Generation) -> BackendFuture<'_> {
        Box::pin(async move {
            // Leftovers from a previous generation would otherwise overlap.
            self.stop_all_steps().await;

            for (index, def) in self.run_steps.clone().into_iter().enumerate() {
                let mut process = match ProcessHandle::start(&def, self.output.clone()) {
                    Ok(process) => process,
                    Err(e) => {
                        self.stop_all_steps().await;
                        return Err(e);
                    }
                };

                let pid = process.pid();
                let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();
                let events = self.events.clone();
                let grace = self.kill_timeout;

                let handle = tokio::spawn(async move {
                    tokio::select! {
                        status = process.wait() => {
                            let outcome = match status {
                                Ok(status) if status.success() => RunOutcome::Success,
                                Ok(status) => RunOutcome::Failed(status.code()),
                                Err(e) => {
                                    warn!(pid, error = %e, "failed to wait for run step");
                                    RunOutcome::Failed(None)
                                }
                            };
                            info!(pid, generation, index, ?outcome, "run step exited on its own");
                            send_event(
                                &events,
                                PipelineEvent::RunStepExited { generation, index, outcome },
                            )
                            .await;
                        }
                        _ = &mut cancel_rx => {
                            if let Err(e) = process.terminate(grace).await {
                                warn!(pid, error = %e, "failed to terminate run step");
                            }
                        }
                    }
                });

                self.active_steps.push(ActiveProcess {
                    cancel: Some(cancel_tx),
                    handle,
                    pid,
                });
            }

            debug!(generation, steps = self.active_steps.len(), "run steps started");
            Ok(())
        })
    }

    fn terminate_run_steps(&mut self) -> BackendFuture<'_> {
        Box::pin(async move {
            self.stop_all_steps().await;
            Ok(())
        })
    }
}
