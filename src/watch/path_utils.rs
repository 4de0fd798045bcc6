// src/watch/path_utils.rs

//! Utility functions for path handling in the watcher.

use std::path::{Component, Path, PathBuf};

/// Lexically clean a path: drop `.` components and fold `..` into the
/// preceding component where there is one.
///
/// This never touches the filesystem, so it also works for paths that were
/// just deleted.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(
                    out.components().next_back(),
                    Some(Component::Normal(_))
                );
                if can_pop {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// `path` resolved under `root` and normalized. Absolute paths are kept as
/// they are (apart from normalization).
pub fn join_normalized(root: &Path, path: &Path) -> PathBuf {
    normalize(&root.join(path))
}

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// Falls back to the full path when it does not live under `root`.
pub fn display_relative(root: &Path, path: &Path) -> String {
    let shown = path.strip_prefix(root).unwrap_or(path);
    if shown.as_os_str().is_empty() {
        return ".".to_string();
    }
    shown.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_folds_dots() {
        assert_eq!(normalize(Path::new("./a/./b/../c")), PathBuf::from("a/c"));
        assert_eq!(normalize(Path::new(".")), PathBuf::from("."));
        assert_eq!(normalize(Path::new("./")), PathBuf::from("."));
        assert_eq!(normalize(Path::new("../x")), PathBuf::from("../x"));
        assert_eq!(normalize(Path::new("/a/../../b")), PathBuf::from("/b"));
    }

    #[test]
    fn join_keeps_absolute_event_paths() {
        assert_eq!(
            join_normalized(Path::new("/proj"), Path::new("/proj/src/../vendor")),
            PathBuf::from("/proj/vendor")
        );
        assert_eq!(
            join_normalized(Path::new("."), Path::new("vendor/pkg")),
            PathBuf::from("vendor/pkg")
        );
    }

    #[test]
    fn relative_display() {
        assert_eq!(
            display_relative(Path::new("/proj"), Path::new("/proj/src/main.go")),
            "src/main.go"
        );
        assert_eq!(display_relative(Path::new("/proj"), Path::new("/proj")), ".");
        assert_eq!(display_relative(Path::new("/proj"), Path::new("/tmp/x")), "/tmp/x");
    }
}
