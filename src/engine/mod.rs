// src/engine/mod.rs

//! Supervision engine for one schema.
//!
//! This module ties together:
//! - the debouncer that collapses bursts of file changes into one trigger
//! - the pipeline state machine (build, run steps, restart cycles)
//! - the supervisor event loop that reacts to:
//!   - debounced triggers
//!   - build completion
//!   - run steps exiting on their own
//!   - quit requests
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use std::time::Duration;

/// Run-step generation. Bumped every time the run steps are (re)started so
/// that exit reports from a superseded generation can be told apart.
pub type Generation = u64;

/// Result of one build step invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    Succeeded { elapsed: Duration },
    Failed { reason: String },
}

/// How a run step ended when nobody asked it to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Success,
    /// Exit code, or `None` when the process was killed by a signal.
    Failed(Option<i32>),
}

/// Events flowing into the supervisor from the debouncer, the process
/// backend and the schema runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// Run the first build (or start the run steps straight away).
    Start,
    /// Debounced file change.
    Trigger,
    /// The build step exited.
    BuildFinished(BuildOutcome),
    /// Every run step of the current generation has been terminated and
    /// reaped. Produced by the supervisor itself, never by the backend.
    RunStepsTerminated,
    /// A run step exited without being asked to.
    RunStepExited {
        generation: Generation,
        index: usize,
        outcome: RunOutcome,
    },
    /// Stop everything and leave the event loop.
    Quit,
}

pub mod core;
pub mod debounce;
pub mod event_handlers;
pub mod runtime;

pub use core::{PipelineCore, PipelineState};
pub use debounce::Debouncer;
pub use event_handlers::{CoreCommand, CoreStep};
pub use runtime::{PipelineHandle, Supervisor, SupervisorOptions};
