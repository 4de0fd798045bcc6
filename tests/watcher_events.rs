// tests/watcher_events.rs

mod common;
use crate::common::{init_tracing, with_timeout, write_file, SETTLE};

use std::error::Error;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use rewatch::config::WatchOptions;
use rewatch::engine::Debouncer;
use rewatch::errors::RewatchError;
use rewatch::watch::{DirectoryWatcher, WatchEvent};

type TestResult = Result<(), Box<dyn Error>>;

struct Running {
    events: mpsc::UnboundedReceiver<WatchEvent>,
    stop: watch::Sender<bool>,
    task: JoinHandle<rewatch::errors::Result<()>>,
}

impl Running {
    fn drain(&mut self) -> Vec<WatchEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = self.events.try_recv() {
            out.push(ev);
        }
        out
    }

    async fn stop(self) -> TestResult {
        self.stop.send(true)?;
        with_timeout(self.task).await??;
        Ok(())
    }
}

fn options(root: &Path, recursive: bool, extensions: &[&str], excluded: &[&str]) -> WatchOptions {
    WatchOptions {
        path: root.to_path_buf(),
        recursive,
        extensions: extensions.iter().map(|s| s.to_string()).collect(),
        excluded_paths: excluded.iter().map(|s| s.to_string()).collect(),
    }
}

fn spawn_watcher(opts: &WatchOptions) -> Result<Running, Box<dyn Error>> {
    let mut watcher = DirectoryWatcher::new(opts)?;
    watcher.start()?;

    let (tx, events) = mpsc::unbounded_channel();
    let (stop, mut stop_rx) = watch::channel(false);
    let task = tokio::spawn(async move {
        let res = watcher
            .events(&mut stop_rx, |ev| {
                let _ = tx.send(ev);
            })
            .await;
        watcher.close();
        res
    });

    Ok(Running { events, stop, task })
}

#[tokio::test]
async fn matching_file_write_is_reported() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let mut running = spawn_watcher(&options(dir.path(), true, &[".go"], &[]))?;

    write_file(&dir.path().join("README.md"), "docs");
    tokio::time::sleep(SETTLE).await;
    assert!(running.drain().is_empty());

    write_file(&dir.path().join("main.go"), "package main");
    tokio::time::sleep(SETTLE).await;
    let events = running.drain();
    assert!(!events.is_empty());
    assert!(events.iter().all(|e| e.path.ends_with("main.go") && !e.is_dir));

    running.stop().await
}

#[tokio::test]
async fn excluded_subtree_is_silent() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    write_file(&dir.path().join("vendor/pkg/a.go"), "package pkg");
    let mut running = spawn_watcher(&options(dir.path(), true, &[".go"], &["vendor"]))?;

    write_file(&dir.path().join("vendor/pkg/a.go"), "package pkg // changed");
    write_file(&dir.path().join("vendor/b.go"), "package vendor");
    tokio::time::sleep(SETTLE).await;
    assert!(running.drain().is_empty());

    write_file(&dir.path().join("internal/vendor.go"), "package internal");
    tokio::time::sleep(SETTLE).await;
    assert!(!running.drain().is_empty());

    running.stop().await
}

#[tokio::test]
async fn empty_directory_creation_is_silent() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let mut running = spawn_watcher(&options(dir.path(), true, &[], &[]))?;

    std::fs::create_dir(dir.path().join("empty"))?;
    tokio::time::sleep(SETTLE).await;
    assert!(running.drain().is_empty());

    // Once registered, files inside it are seen.
    write_file(&dir.path().join("empty/late.txt"), "x");
    tokio::time::sleep(SETTLE).await;
    assert!(running.drain().iter().any(|e| e.path.ends_with("late.txt")));

    running.stop().await
}

#[tokio::test]
async fn directory_with_file_triggers_exactly_one_reload() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let opts = options(dir.path(), true, &[], &[]);

    let mut watcher = DirectoryWatcher::new(&opts)?;
    watcher.start()?;

    let reloads = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&reloads);
    let debouncer = Debouncer::new(Duration::from_millis(300), move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let (stop, mut stop_rx) = watch::channel(false);
    let root = dir.path().to_path_buf();
    let writer = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        write_file(&root.join("pkg/main.src"), "fn main");
        tokio::time::sleep(Duration::from_millis(1200)).await;
        let _ = stop.send(true);
    });

    with_timeout(watcher.events(&mut stop_rx, |_| debouncer.trigger())).await?;
    writer.await?;

    assert_eq!(reloads.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn directory_moved_into_the_tree_is_watched() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let root = dir.path().join("root");
    std::fs::create_dir(&root)?;
    write_file(&dir.path().join("outside/pkg/a.src"), "a");
    let mut running = spawn_watcher(&options(&root, true, &[], &[]))?;

    std::fs::rename(dir.path().join("outside/pkg"), root.join("pkg"))?;
    tokio::time::sleep(SETTLE).await;
    let moved = running.drain();
    assert!(moved.iter().any(|e| e.path.ends_with("pkg") && e.is_dir), "{moved:?}");

    write_file(&root.join("pkg/b.src"), "b");
    tokio::time::sleep(SETTLE).await;
    assert!(running.drain().iter().any(|e| e.path.ends_with("b.src")));

    running.stop().await
}

#[tokio::test]
async fn non_recursive_ignores_subdirectories() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    std::fs::create_dir(dir.path().join("sub"))?;
    let mut running = spawn_watcher(&options(dir.path(), false, &[], &[]))?;

    write_file(&dir.path().join("sub/inner.txt"), "x");
    tokio::time::sleep(SETTLE).await;
    assert!(running.drain().iter().all(|e| !e.path.ends_with("inner.txt")));

    write_file(&dir.path().join("top.txt"), "x");
    tokio::time::sleep(SETTLE).await;
    assert!(running.drain().iter().any(|e| e.path.ends_with("top.txt")));

    running.stop().await
}

#[tokio::test]
async fn missing_root_is_a_filesystem_error() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let opts = options(&dir.path().join("does-not-exist"), true, &[], &[]);

    let err = DirectoryWatcher::new(&opts).unwrap_err();
    assert!(matches!(err, RewatchError::Filesystem(_)));
}
