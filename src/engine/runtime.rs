// src/engine/runtime.rs

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use crate::engine::core::PipelineCore;
use crate::engine::{CoreCommand, PipelineEvent, RunOutcome};
use crate::errors::Result;
use crate::exec::ProcessBackend;
use crate::fs::FileSystem;
use crate::notification::SharedNotifier;
use crate::output::{Label, SharedOutput};

/// Capacity of the supervisor's event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Everything the supervisor needs besides the core and the backend.
pub struct SupervisorOptions {
    /// Schema label, e.g. `api`.
    pub label: String,
    /// Labels of the run steps, indexed like the backend's run steps.
    pub run_labels: Vec<Label>,
    /// Paths removed on quit.
    pub clean: Vec<PathBuf>,
    pub fs: Arc<dyn FileSystem>,
    pub output: SharedOutput,
    pub notifier: SharedNotifier,
}

/// Cloneable way to talk to a running [`Supervisor`].
#[derive(Debug, Clone)]
pub struct PipelineHandle {
    tx: mpsc::Sender<PipelineEvent>,
}

impl PipelineHandle {
    pub fn new(tx: mpsc::Sender<PipelineEvent>) -> Self {
        Self { tx }
    }

    pub async fn start(&self) {
        self.send(PipelineEvent::Start).await;
    }

    /// Request a reload cycle. Safe to call from a timer callback; if the
    /// channel is full a trigger is dropped, since the backlog already
    /// guarantees a cycle once it drains.
    pub fn trigger(&self) {
        match self.tx.try_send(PipelineEvent::Trigger) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => debug!("supervisor busy; trigger coalesced"),
            Err(TrySendError::Closed(_)) => debug!("supervisor stopped; trigger dropped"),
        }
    }

    /// Stop the build, every run step, and the supervisor loop.
    pub async fn quit(&self) {
        self.send(PipelineEvent::Quit).await;
    }

    async fn send(&self, event: PipelineEvent) {
        if self.tx.send(event).await.is_err() {
            debug!("supervisor already stopped");
        }
    }
}

/// Drives a [`PipelineCore`] in response to `PipelineEvent`s, and delegates
/// process handling to a `ProcessBackend`.
///
/// This is a pure IO shell around the core, which contains all the restart
/// semantics. This struct handles async IO: reading events from the channel,
/// awaiting terminations, and reporting results.
pub struct Supervisor<B: ProcessBackend> {
    core: PipelineCore,
    event_rx: mpsc::Receiver<PipelineEvent>,
    backend: B,
    options: SupervisorOptions,
    build_label: Label,
}

impl<B: ProcessBackend> fmt::Debug for Supervisor<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("label", &self.options.label)
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<B: ProcessBackend> Supervisor<B> {
    pub fn new(
        core: PipelineCore,
        event_rx: mpsc::Receiver<PipelineEvent>,
        backend: B,
        options: SupervisorOptions,
    ) -> Self {
        let build_label = Label::build().sub(&options.label);
        Self {
            core,
            event_rx,
            backend,
            options,
            build_label,
        }
    }

    /// Main event loop.
    ///
    /// - Consumes `PipelineEvent`s from `event_rx`.
    /// - Feeds them into the core.
    /// - Executes the commands the core returns.
    ///
    /// Returns an error only when a process cannot be spawned; everything
    /// that ran is stopped first.
    pub async fn run(mut self) -> Result<()> {
        info!(schema = %self.options.label, "supervisor started");

        loop {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    info!(schema = %self.options.label, "all handles dropped; quitting");
                    PipelineEvent::Quit
                }
            };

            debug!(schema = %self.options.label, ?event, "supervisor received event");
            let mut queue = vec![event];

            while let Some(event) = queue.pop() {
                let step = self.core.step(event);

                for command in step.commands {
                    match self.execute_command(command).await {
                        Ok(Some(follow_up)) => queue.push(follow_up),
                        Ok(None) => {}
                        Err(e) => {
                            self.options.output.push(&self.build_label, &format!("ERROR: {e}"));
                            self.abort().await;
                            return Err(e);
                        }
                    }
                }

                if !step.keep_running {
                    info!(schema = %self.options.label, "supervisor stopped");
                    return Ok(());
                }
            }
        }
    }

    /// Execute a single command from the core. Some commands complete
    /// synchronously and produce the event that answers them.
    async fn execute_command(&mut self, command: CoreCommand) -> Result<Option<PipelineEvent>> {
        match command {
            CoreCommand::StartBuild => {
                self.options.output.push(&self.build_label, "PROCESSING...");
                self.backend.start_build().await?;
            }
            CoreCommand::TerminateBuild => {
                self.backend.terminate_build().await?;
            }
            CoreCommand::StartRunSteps { generation } => {
                info!(schema = %self.options.label, generation, "starting run steps");
                self.backend.start_run_steps(generation).await?;
            }
            CoreCommand::TerminateRunSteps => {
                debug!(schema = %self.options.label, "terminating run steps");
                self.backend.terminate_run_steps().await?;
                return Ok(Some(PipelineEvent::RunStepsTerminated));
            }
            CoreCommand::ReportBuildSuccess { elapsed } => {
                let line = format!("DONE ({:.3}s build time)", elapsed.as_secs_f64());
                self.options.output.push(&self.build_label, &line);
            }
            CoreCommand::ReportBuildFailure { reason } => {
                self.options.output.push(&self.build_label, &format!("FAILED: {reason}"));
                let title = format!("{} - BUILD FAILED", self.options.label);
                // A slow notification tool must not hold up the pipeline.
                let notifier = Arc::clone(&self.options.notifier);
                tokio::spawn(async move {
                    notifier.send(&title, &reason).await;
                });
            }
            CoreCommand::ReportRunExit { index, outcome } => {
                self.report_run_exit(index, outcome);
            }
            CoreCommand::Clean => self.clean(),
        }
        Ok(None)
    }

    fn report_run_exit(&self, index: usize, outcome: RunOutcome) {
        let label = self
            .options
            .run_labels
            .get(index)
            .cloned()
            .unwrap_or_else(|| Label::schema(&self.options.label));

        let line = match outcome {
            RunOutcome::Success => "process exited".to_string(),
            RunOutcome::Failed(Some(code)) => format!("process exited with code {code}"),
            RunOutcome::Failed(None) => "process terminated by signal".to_string(),
        };
        self.options.output.push(&label, &line);
    }

    /// Remove the clean-up paths. Failures are reported and skipped.
    fn clean(&self) {
        for path in &self.options.clean {
            if !self.options.fs.exists(path) {
                continue;
            }
            match self.options.fs.remove_path(path) {
                Ok(()) => debug!(path = ?path, "removed"),
                Err(e) => {
                    warn!(path = ?path, error = %e, "clean-up failed");
                    self.options
                        .output
                        .push(&Label::system(), &format!("clean-up of {} failed: {e:#}", path.display()));
                }
            }
        }
    }

    /// Best-effort stop of everything after a fatal error.
    async fn abort(&mut self) {
        let step = self.core.step(PipelineEvent::Quit);
        for command in step.commands {
            let result = match command {
                CoreCommand::TerminateBuild => self.backend.terminate_build().await,
                CoreCommand::TerminateRunSteps => self.backend.terminate_run_steps().await,
                CoreCommand::Clean => {
                    self.clean();
                    Ok(())
                }
                _ => Ok(()),
            };
            if let Err(e) = result {
                warn!(schema = %self.options.label, error = %e, "cleanup after failure incomplete");
            }
        }
    }
}
