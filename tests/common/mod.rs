#![allow(dead_code, unused_imports)]

pub use rewatch_test_utils::builders;
pub use rewatch_test_utils::capture::CapturedOutput;
pub use rewatch_test_utils::fake_backend::{FakePipeline, Lifecycle};
pub use rewatch_test_utils::{init_tracing, wait_until, with_timeout};

use std::path::Path;
use std::time::Duration;

/// Give the OS notification backend time to deliver (or not deliver) events.
pub const SETTLE: Duration = Duration::from_millis(800);

/// Write `contents` to `path`, creating parent directories.
pub fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}

/// Non-empty lines of a file, or nothing if it does not exist yet.
pub fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .map(|s| s.lines().filter(|l| !l.is_empty()).map(str::to_string).collect())
        .unwrap_or_default()
}
