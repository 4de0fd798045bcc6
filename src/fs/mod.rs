// src/fs/mod.rs

use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub mod mock;

/// Abstract filesystem interface.
///
/// The watcher only needs to classify paths and enumerate directories; going
/// through this trait lets event classification be tested against an
/// in-memory tree.
pub trait FileSystem: Send + Sync + Debug {
    fn exists(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;

    /// Symlinks are not followed when walking a tree.
    fn is_symlink(&self, _path: &Path) -> bool {
        false
    }

    /// Return a list of entries in a directory.
    /// Returns full paths.
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// Remove a file, or a directory with everything in it.
    fn remove_path(&self, path: &Path) -> Result<()>;

    /// True when `path` is a readable directory with no entries.
    ///
    /// Unreadable or missing directories count as non-empty, so a directory
    /// that vanished between the event and this check still reaches the
    /// caller.
    fn is_dir_empty(&self, path: &Path) -> bool {
        match self.read_dir(path) {
            Ok(entries) => entries.is_empty(),
            Err(_) => false,
        }
    }
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn is_symlink(&self, path: &Path) -> bool {
        path.is_symlink()
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path).with_context(|| format!("reading dir {:?}", path))? {
            let entry = entry?;
            entries.push(entry.path());
        }
        Ok(entries)
    }

    fn remove_path(&self, path: &Path) -> Result<()> {
        if path.is_dir() {
            fs::remove_dir_all(path).with_context(|| format!("removing dir {:?}", path))
        } else {
            fs::remove_file(path).with_context(|| format!("removing file {:?}", path))
        }
    }

    fn is_dir_empty(&self, path: &Path) -> bool {
        // Only look at the first entry instead of listing everything.
        match fs::read_dir(path) {
            Ok(mut entries) => entries.next().is_none(),
            Err(_) => false,
        }
    }
}
