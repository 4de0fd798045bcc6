use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

/// Quiet period used when a schema does not set `debounce_ms`.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// How long a process group gets to exit after SIGINT before it is killed.
pub const DEFAULT_KILL_TIMEOUT: Duration = Duration::from_millis(5000);

/// Order of operations when a reload cycle starts.
///
/// - `TerminateFirst`: stop every run step, wait for each to exit, then
///   rebuild and restart (default). Old and new generations never overlap.
/// - `BuildFirst`: rebuild while the old generation keeps running; only a
///   successful build terminates and restarts the run steps. A failed build
///   leaves the old processes untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartStrategy {
    TerminateFirst,
    BuildFirst,
}

impl Default for RestartStrategy {
    fn default() -> Self {
        RestartStrategy::TerminateFirst
    }
}

impl FromStr for RestartStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "terminate_first" => Ok(RestartStrategy::TerminateFirst),
            "build_first" => Ok(RestartStrategy::BuildFirst),
            other => Err(format!(
                "invalid restart strategy: {other} (expected \"terminate_first\" or \"build_first\")"
            )),
        }
    }
}
