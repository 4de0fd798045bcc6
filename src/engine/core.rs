// src/engine/core.rs

//! Pure pipeline state machine.
//!
//! This module contains a synchronous, deterministic core that consumes
//! [`PipelineEvent`]s and produces:
//! - an updated pipeline state
//! - a list of commands describing what the IO shell should do next
//!
//! The async shell (`engine::runtime::Supervisor`) is responsible for:
//! - reading events from the channel
//! - starting and terminating processes through a `ProcessBackend`
//! - printing build results and sending notifications
//!
//! The core is unit tested without any Tokio, channels, filesystem, or
//! processes.

use crate::engine::event_handlers::{
    handle_build_finished, handle_quit, handle_run_step_exited, handle_run_steps_terminated,
    handle_start, handle_trigger, CoreStep,
};
use crate::engine::{Generation, PipelineEvent};
use crate::types::RestartStrategy;

/// What to do once the run steps are gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterTerminate {
    /// Rebuild, then start a new generation (`terminate_first` cycle).
    Build,
    /// The new build already succeeded; start a new generation.
    Run,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    BuildRunning,
    BuildFailed,
    RunningSteps,
    Terminating(AfterTerminate),
    Stopped,
}

/// Mutable state shared by the event handlers.
#[derive(Debug, Clone)]
pub(crate) struct CoreState {
    pub(crate) state: PipelineState,
    pub(crate) strategy: RestartStrategy,
    pub(crate) has_build: bool,
    pub(crate) run_steps: usize,
    pub(crate) generation: Generation,
    pub(crate) live_steps: usize,
    /// At most one trigger is remembered while busy; later ones coalesce.
    pub(crate) pending_trigger: bool,
}

/// Pure pipeline core for one schema.
///
/// It has **no** channels, no Tokio types, and does not perform any IO.
#[derive(Debug, Clone)]
pub struct PipelineCore {
    inner: CoreState,
}

impl PipelineCore {
    pub fn new(strategy: RestartStrategy, has_build: bool, run_steps: usize) -> Self {
        Self {
            inner: CoreState {
                state: PipelineState::Idle,
                strategy,
                has_build,
                run_steps,
                generation: 0,
                live_steps: 0,
                pending_trigger: false,
            },
        }
    }

    pub fn state(&self) -> PipelineState {
        self.inner.state
    }

    /// Generation of the most recently started run steps (0 before any).
    pub fn generation(&self) -> Generation {
        self.inner.generation
    }

    /// Run steps of the current generation that have not exited.
    pub fn live_steps(&self) -> usize {
        self.inner.live_steps
    }

    pub fn has_pending_trigger(&self) -> bool {
        self.inner.pending_trigger
    }

    /// Handle a single event, updating state and returning the resulting
    /// commands for the IO shell.
    pub fn step(&mut self, event: PipelineEvent) -> CoreStep {
        let core = &mut self.inner;
        match event {
            PipelineEvent::Start => handle_start(core),
            PipelineEvent::Trigger => handle_trigger(core),
            PipelineEvent::BuildFinished(outcome) => handle_build_finished(core, outcome),
            PipelineEvent::RunStepsTerminated => handle_run_steps_terminated(core),
            PipelineEvent::RunStepExited {
                generation,
                index,
                outcome,
            } => handle_run_step_exited(core, generation, index, outcome),
            PipelineEvent::Quit => handle_quit(core),
        }
    }
}
