// src/watch/filter.rs

use std::path::{Path, PathBuf};

use crate::watch::path_utils::{join_normalized, normalize};

/// Decides whether a changed path is relevant for a schema.
///
/// Pure and cheap; evaluated for every event rather than cached, because
/// the tree underneath keeps changing.
#[derive(Debug, Clone)]
pub struct PathFilter {
    root: PathBuf,
    extensions: Vec<String>,
    excluded: Vec<PathBuf>,
}

impl PathFilter {
    /// `excluded` entries are resolved under `root` once, here.
    pub fn new<S: AsRef<str>>(root: &Path, extensions: &[S], excluded: &[S]) -> Self {
        let root = normalize(root);
        let excluded = excluded
            .iter()
            .map(|e| join_normalized(&root, Path::new(e.as_ref())))
            .collect();

        Self {
            root,
            extensions: extensions.iter().map(|e| e.as_ref().to_string()).collect(),
            excluded,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn excluded(&self) -> &[PathBuf] {
        &self.excluded
    }

    /// True if the allow-list is empty or contains the path's extension
    /// (with its leading dot, compared case-sensitively).
    pub fn matches_extension(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }

        let ext = dotted_extension(path);
        self.extensions.iter().any(|allowed| *allowed == ext)
    }

    /// True if `path`, resolved under the root, is an excluded entry or lies
    /// beneath one. The root itself is never excluded.
    ///
    /// Matching is per path component: excluding `vendor` covers
    /// `vendor/pkg/a.go` but not `vendored/a.go` or `internal/vendor.go`.
    pub fn matches_excluded(&self, path: &Path) -> bool {
        if self.excluded.is_empty() {
            return false;
        }

        let path = join_normalized(&self.root, path);
        if path == self.root {
            return false;
        }

        self.excluded.iter().any(|dir| path.starts_with(dir))
    }
}

/// Everything from the last `.` of the file name on, or `""`.
///
/// Unlike `Path::extension`, a dotfile counts as all extension: `.env`
/// yields `".env"`, so it can be allow-listed.
fn dotted_extension(path: &Path) -> String {
    let Some(name) = path.file_name() else {
        return String::new();
    };
    let name = name.to_string_lossy();
    match name.rfind('.') {
        Some(dot) => name[dot..].to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(root: &str, exts: &[&str], excluded: &[&str]) -> PathFilter {
        PathFilter::new(Path::new(root), exts, excluded)
    }

    #[test]
    fn empty_allow_list_matches_everything() {
        let f = filter(".", &[], &[]);
        assert!(f.matches_extension(Path::new("main.go")));
        assert!(f.matches_extension(Path::new("Makefile")));
    }

    #[test]
    fn allow_list_is_literal_and_case_sensitive() {
        let f = filter(".", &[".go"], &[]);
        assert!(f.matches_extension(Path::new("main.go")));
        assert!(f.matches_extension(Path::new("/abs/pkg/util.go")));
        assert!(!f.matches_extension(Path::new("main.py")));
        assert!(!f.matches_extension(Path::new("MAIN.GO")));
        assert!(!f.matches_extension(Path::new("go")));
    }

    #[test]
    fn dotfiles_match_by_their_whole_name() {
        let f = filter(".", &[".env"], &[]);
        assert!(f.matches_extension(Path::new(".env")));
        assert!(f.matches_extension(Path::new("svc/.env")));
        assert!(f.matches_extension(Path::new("local.env")));
        assert!(!f.matches_extension(Path::new(".envrc")));

        let f = filter(".", &[".gz"], &[]);
        assert!(f.matches_extension(Path::new("dump.tar.gz")));
    }

    #[test]
    fn excluded_directory_covers_its_subtree() {
        let f = filter(".", &[], &["vendor"]);
        assert!(f.matches_excluded(Path::new("vendor")));
        assert!(f.matches_excluded(Path::new("vendor/pkg/a.go")));
        assert!(f.matches_excluded(Path::new("./vendor/pkg")));
        assert!(!f.matches_excluded(Path::new("internal/vendor.go")));
        assert!(!f.matches_excluded(Path::new("vendored/a.go")));
    }

    #[test]
    fn root_is_never_excluded() {
        let f = filter(".", &[], &["vendor"]);
        assert!(!f.matches_excluded(Path::new(".")));

        let f = filter("/proj", &[], &["tmp"]);
        assert!(!f.matches_excluded(Path::new("/proj")));
        assert!(f.matches_excluded(Path::new("/proj/tmp/x")));
        assert!(f.matches_excluded(Path::new("tmp/x")));
    }

    #[test]
    fn exclusions_are_resolved_under_root() {
        let f = filter("/proj/./svc", &[], &["./build/", "../shared"]);
        assert_eq!(
            f.excluded(),
            &[PathBuf::from("/proj/svc/build"), PathBuf::from("/proj/shared")]
        );
        assert!(f.matches_excluded(Path::new("/proj/svc/build/out.bin")));
        assert!(!f.matches_excluded(Path::new("/proj/svc/src/main.go")));
    }
}
