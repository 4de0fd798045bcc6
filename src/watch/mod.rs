// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - Deciding which changed paths matter for a schema (extension allow-list,
//!   excluded subtrees).
//! - Wiring up a cross-platform filesystem watcher (`notify`) that registers
//!   directories one by one and picks up new ones as they appear.
//!
//! It does **not** know about builds or processes; it only turns filesystem
//! changes into [`WatchEvent`]s.

pub mod filter;
pub mod path_utils;
pub mod watcher;

pub use filter::PathFilter;
pub use watcher::{ChangeKind, DirectoryWatcher, WatchEvent};
