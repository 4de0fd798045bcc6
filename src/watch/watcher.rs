// src/watch/watcher.rs

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::event::ModifyKind;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::config::WatchOptions;
use crate::errors::{Result, RewatchError};
use crate::fs::{FileSystem, RealFileSystem};
use crate::watch::filter::PathFilter;

/// Normalized kind of a filesystem change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Create,
    Write,
    Remove,
    Rename,
    Other,
}

impl ChangeKind {
    /// `None` for changes that never matter: reads and pure metadata or
    /// permission updates.
    pub fn from_event_kind(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Access(_) => None,
            EventKind::Modify(ModifyKind::Metadata(_)) => None,
            EventKind::Create(_) => Some(ChangeKind::Create),
            EventKind::Modify(ModifyKind::Name(_)) => Some(ChangeKind::Rename),
            EventKind::Modify(_) => Some(ChangeKind::Write),
            EventKind::Remove(_) => Some(ChangeKind::Remove),
            EventKind::Any | EventKind::Other => Some(ChangeKind::Other),
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeKind::Create => "CREATE",
            ChangeKind::Write => "WRITE",
            ChangeKind::Remove => "REMOVE",
            ChangeKind::Rename => "RENAME",
            ChangeKind::Other => "CHANGE",
        };
        f.write_str(s)
    }
}

/// A change that passed filtering and should trigger a reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub kind: ChangeKind,
    pub path: PathBuf,
    pub is_dir: bool,
}

/// What to do with one path of a raw notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Ignore,
    /// A directory appeared: start watching it, and report it only when it
    /// already has content.
    RegisterDir { forward: bool },
    Forward,
}

/// Classify one path of a raw notification.
///
/// The emptiness check for new directories is best effort: a file written
/// right after the check is only seen once the directory is registered.
pub fn classify(
    kind: ChangeKind,
    path: &Path,
    fs: &dyn FileSystem,
    filter: &PathFilter,
) -> Disposition {
    if filter.matches_excluded(path) {
        return Disposition::Ignore;
    }

    // A directory moved in from outside arrives as a rename.
    if matches!(kind, ChangeKind::Create | ChangeKind::Rename) && fs.is_dir(path) {
        return Disposition::RegisterDir {
            forward: !fs.is_dir_empty(path),
        };
    }

    if filter.matches_extension(path) {
        Disposition::Forward
    } else {
        Disposition::Ignore
    }
}

/// Every directory under `root` (inclusive) that is not excluded.
///
/// Excluded directories are pruned, so nothing below them is visited.
/// Unreadable subdirectories are skipped with a warning; an unreadable root
/// is an error.
pub fn collect_directories(
    fs: &dyn FileSystem,
    filter: &PathFilter,
    root: &Path,
) -> Result<Vec<PathBuf>> {
    if !fs.is_dir(root) {
        return Err(RewatchError::Filesystem(format!(
            "watch root {:?} does not exist or is not a directory",
            root
        )));
    }

    let mut dirs = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let entries = match fs.read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if dir == root => {
                return Err(RewatchError::Filesystem(format!(
                    "cannot read watch root {:?}: {e:#}",
                    root
                )));
            }
            Err(e) => {
                warn!(dir = ?dir, error = %e, "skipping unreadable directory");
                continue;
            }
        };

        for entry in entries {
            if fs.is_dir(&entry) && !fs.is_symlink(&entry) && !filter.matches_excluded(&entry) {
                stack.push(entry);
            }
        }
        dirs.push(dir);
    }

    Ok(dirs)
}

/// Watches one schema's tree.
///
/// Directories are registered one by one (non-recursively) so that excluded
/// subtrees are never watched at all; directories created later are added as
/// they appear.
pub struct DirectoryWatcher {
    filter: PathFilter,
    recursive: bool,
    fs: Arc<dyn FileSystem>,
    inner: RecommendedWatcher,
    raw_rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
    watched: HashSet<PathBuf>,
}

impl fmt::Debug for DirectoryWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryWatcher")
            .field("root", &self.filter.root())
            .field("recursive", &self.recursive)
            .field("watched", &self.watched.len())
            .finish_non_exhaustive()
    }
}

impl DirectoryWatcher {
    pub fn new(options: &WatchOptions) -> Result<Self> {
        Self::with_fs(options, Arc::new(RealFileSystem))
    }

    /// Build a watcher whose tree walking and directory checks go through
    /// `fs`. The root is canonicalized so that event paths, which the OS
    /// reports as absolute, line up with the exclusion list.
    pub fn with_fs(options: &WatchOptions, fs: Arc<dyn FileSystem>) -> Result<Self> {
        let root = options.path.canonicalize().map_err(|e| {
            RewatchError::Filesystem(format!("watch root {:?}: {e}", options.path))
        })?;

        let filter = PathFilter::new(&root, &options.extensions, &options.excluded_paths);

        // Channel from the blocking notify callback into the async world.
        let (raw_tx, raw_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
        let inner = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                // The receiver is gone once the watcher is shutting down.
                let _ = raw_tx.send(res);
            },
            Config::default(),
        )?;

        Ok(Self {
            filter,
            recursive: options.recursive,
            fs,
            inner,
            raw_rx,
            watched: HashSet::new(),
        })
    }

    pub fn root(&self) -> &Path {
        self.filter.root()
    }

    pub fn filter(&self) -> &PathFilter {
        &self.filter
    }

    /// Register the root, and in recursive mode every non-excluded directory
    /// below it.
    pub fn start(&mut self) -> Result<()> {
        let root = self.filter.root().to_path_buf();
        let dirs = if self.recursive {
            collect_directories(self.fs.as_ref(), &self.filter, &root)?
        } else {
            if !self.fs.is_dir(&root) {
                return Err(RewatchError::Filesystem(format!(
                    "watch root {:?} does not exist or is not a directory",
                    root
                )));
            }
            vec![root.clone()]
        };

        for dir in dirs {
            self.inner.watch(&dir, RecursiveMode::NonRecursive).map_err(|e| {
                RewatchError::Filesystem(format!("cannot watch {:?}: {e}", dir))
            })?;
            self.watched.insert(dir);
        }

        info!(
            root = ?root,
            recursive = self.recursive,
            directories = self.watched.len(),
            "file watcher started"
        );
        Ok(())
    }

    /// Number of directories currently registered.
    pub fn watched_count(&self) -> usize {
        self.watched.len()
    }

    /// Deliver accepted changes to `callback` until `shutdown` flips to true
    /// (returns `Ok`) or the notification backend fails (returns the error;
    /// it is not retried).
    pub async fn events<F>(&mut self, shutdown: &mut watch::Receiver<bool>, mut callback: F) -> Result<()>
    where
        F: FnMut(WatchEvent),
    {
        loop {
            if *shutdown.borrow() {
                debug!("watcher event loop cancelled");
                return Ok(());
            }

            let raw = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        debug!("watcher shutdown channel dropped");
                        return Ok(());
                    }
                    continue;
                }
                raw = self.raw_rx.recv() => raw,
            };

            match raw {
                Some(Ok(event)) => self.dispatch(event, &mut callback),
                Some(Err(err)) => return Err(RewatchError::Watch(err)),
                None => {
                    return Err(RewatchError::Filesystem(
                        "notification backend closed unexpectedly".to_string(),
                    ));
                }
            }
        }
    }

    fn dispatch<F>(&mut self, event: Event, callback: &mut F)
    where
        F: FnMut(WatchEvent),
    {
        let Some(kind) = ChangeKind::from_event_kind(&event.kind) else {
            return;
        };

        for path in event.paths {
            match classify(kind, &path, self.fs.as_ref(), &self.filter) {
                Disposition::Ignore => {
                    if kind == ChangeKind::Remove {
                        self.watched.remove(&path);
                    }
                }
                Disposition::RegisterDir { forward } => {
                    if self.recursive {
                        self.register_new_dir(&path);
                    }
                    if forward {
                        callback(WatchEvent {
                            kind,
                            path,
                            is_dir: true,
                        });
                    } else {
                        debug!(path = ?path, "empty directory created; not reloading");
                    }
                }
                Disposition::Forward => {
                    if kind == ChangeKind::Remove {
                        self.watched.remove(&path);
                    }
                    callback(WatchEvent {
                        kind,
                        path,
                        is_dir: false,
                    });
                }
            }
        }
    }

    /// Watch a directory that appeared at runtime, including any
    /// subdirectories that were created before it was registered.
    fn register_new_dir(&mut self, dir: &Path) {
        let dirs = match collect_directories(self.fs.as_ref(), &self.filter, dir) {
            Ok(dirs) => dirs,
            Err(e) => {
                debug!(dir = ?dir, error = %e, "new directory vanished before registration");
                return;
            }
        };

        for dir in dirs {
            if self.watched.contains(&dir) {
                continue;
            }
            match self.inner.watch(&dir, RecursiveMode::NonRecursive) {
                Ok(()) => {
                    debug!(dir = ?dir, "watching new directory");
                    self.watched.insert(dir);
                }
                Err(e) => warn!(dir = ?dir, error = %e, "failed to watch new directory"),
            }
        }
    }

    /// Release the OS notification handle.
    pub fn close(self) {
        debug!(root = ?self.filter.root(), "file watcher closed");
        drop(self);
    }
}
