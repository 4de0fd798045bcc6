// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running build and run steps,
//! using `tokio::process::Command`, and reporting back to the supervisor
//! via `PipelineEvent`s.
//!
//! - [`process`] spawns one step and relays its output.
//! - [`kill`] terminates a whole process tree and waits for it.
//! - [`backend`] provides the `ProcessBackend` trait and the concrete
//!   `RealProcessBackend` that the supervisor uses in production, and which
//!   tests can replace with a fake implementation.

pub mod backend;
pub mod kill;
pub mod process;

pub use backend::{BackendFuture, ProcessBackend, RealProcessBackend};
pub use kill::{terminate_group, terminate_tree};
pub use process::{ProcessDefinition, ProcessHandle};
