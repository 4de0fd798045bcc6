// src/engine/event_handlers.rs

//! Event handling logic for the pipeline core.
//!
//! Each handler takes the current state and returns the next one plus the
//! commands the IO shell must carry out, in order.

use std::time::Duration;

use crate::engine::core::{AfterTerminate, CoreState, PipelineState};
use crate::engine::{BuildOutcome, Generation, RunOutcome};
use crate::types::RestartStrategy;

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    /// Launch the build step. Its result comes back as `BuildFinished`.
    StartBuild,
    /// Stop an in-flight build and wait for it to exit.
    TerminateBuild,
    /// Launch every run step as generation `generation`.
    StartRunSteps { generation: Generation },
    /// Stop every run step and wait until each has exited. The shell
    /// answers with `RunStepsTerminated`.
    TerminateRunSteps,
    ReportBuildSuccess { elapsed: Duration },
    ReportBuildFailure { reason: String },
    ReportRunExit { index: usize, outcome: RunOutcome },
    /// Remove the configured clean-up paths.
    Clean,
}

/// Decision returned by the core after handling a single `PipelineEvent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreStep {
    /// Commands the IO shell should execute, in order.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer event loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    fn cont(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }
}

/// First build, or the first generation of run steps when there is no build.
pub(crate) fn handle_start(core: &mut CoreState) -> CoreStep {
    if core.state != PipelineState::Idle {
        return CoreStep::cont(Vec::new());
    }
    // Anything that changed before the first build is covered by it.
    core.pending_trigger = false;
    CoreStep::cont(begin_build_or_run(core))
}

/// A debounced file change.
///
/// - While a build is in flight the trigger is remembered (once) and acted
///   on when the build finishes.
/// - Otherwise a reload cycle starts right away, in the order the restart
///   strategy dictates.
pub(crate) fn handle_trigger(core: &mut CoreState) -> CoreStep {
    let commands = match core.state {
        PipelineState::Idle | PipelineState::BuildRunning | PipelineState::Terminating(_) => {
            core.pending_trigger = true;
            Vec::new()
        }
        PipelineState::Stopped => Vec::new(),
        PipelineState::BuildFailed | PipelineState::RunningSteps => begin_cycle(core),
    };
    CoreStep::cont(commands)
}

pub(crate) fn handle_build_finished(core: &mut CoreState, outcome: BuildOutcome) -> CoreStep {
    if core.state != PipelineState::BuildRunning {
        // A build that was terminated during quit may still report back.
        return CoreStep::cont(Vec::new());
    }

    let mut commands = Vec::new();
    let succeeded = match outcome {
        BuildOutcome::Succeeded { elapsed } => {
            commands.push(CoreCommand::ReportBuildSuccess { elapsed });
            true
        }
        BuildOutcome::Failed { reason } => {
            commands.push(CoreCommand::ReportBuildFailure { reason });
            false
        }
    };

    if core.pending_trigger {
        // Sources changed while building; this result is already stale.
        core.pending_trigger = false;
        commands.push(CoreCommand::StartBuild);
        return CoreStep::cont(commands);
    }

    match (succeeded, core.strategy) {
        (false, _) => {
            // Whatever was running before the build keeps running.
            core.state = PipelineState::BuildFailed;
        }
        (true, RestartStrategy::BuildFirst) if core.live_steps > 0 => {
            core.state = PipelineState::Terminating(AfterTerminate::Run);
            commands.push(CoreCommand::TerminateRunSteps);
        }
        (true, _) => commands.extend(start_run_steps(core)),
    }

    CoreStep::cont(commands)
}

pub(crate) fn handle_run_steps_terminated(core: &mut CoreState) -> CoreStep {
    let PipelineState::Terminating(next) = core.state else {
        return CoreStep::cont(Vec::new());
    };

    core.live_steps = 0;
    let rebuild = next == AfterTerminate::Build || core.pending_trigger;
    core.pending_trigger = false;
    let commands = if rebuild {
        begin_build_or_run(core)
    } else {
        start_run_steps(core)
    };
    CoreStep::cont(commands)
}

/// A run step ended on its own. It is reported and not restarted; only the
/// next reload cycle brings it back.
pub(crate) fn handle_run_step_exited(
    core: &mut CoreState,
    generation: Generation,
    index: usize,
    outcome: RunOutcome,
) -> CoreStep {
    if generation != core.generation || core.live_steps == 0 || core.state == PipelineState::Stopped
    {
        return CoreStep::cont(Vec::new());
    }

    core.live_steps -= 1;
    CoreStep::cont(vec![CoreCommand::ReportRunExit { index, outcome }])
}

pub(crate) fn handle_quit(core: &mut CoreState) -> CoreStep {
    if core.state == PipelineState::Stopped {
        return CoreStep {
            commands: Vec::new(),
            keep_running: false,
        };
    }

    let mut commands = Vec::new();
    if core.state == PipelineState::BuildRunning {
        commands.push(CoreCommand::TerminateBuild);
    }
    commands.push(CoreCommand::TerminateRunSteps);
    commands.push(CoreCommand::Clean);

    core.state = PipelineState::Stopped;
    core.live_steps = 0;
    core.pending_trigger = false;

    CoreStep {
        commands,
        keep_running: false,
    }
}

/// Start of a reload cycle from a settled state.
fn begin_cycle(core: &mut CoreState) -> Vec<CoreCommand> {
    core.pending_trigger = false;
    match core.strategy {
        RestartStrategy::BuildFirst if core.has_build => {
            core.state = PipelineState::BuildRunning;
            vec![CoreCommand::StartBuild]
        }
        _ => {
            core.state = PipelineState::Terminating(AfterTerminate::Build);
            vec![CoreCommand::TerminateRunSteps]
        }
    }
}

fn begin_build_or_run(core: &mut CoreState) -> Vec<CoreCommand> {
    if core.has_build {
        core.state = PipelineState::BuildRunning;
        vec![CoreCommand::StartBuild]
    } else {
        start_run_steps(core)
    }
}

fn start_run_steps(core: &mut CoreState) -> Vec<CoreCommand> {
    core.generation += 1;
    core.live_steps = core.run_steps;
    core.state = PipelineState::RunningSteps;
    vec![CoreCommand::StartRunSteps {
        generation: core.generation,
    }]
}
