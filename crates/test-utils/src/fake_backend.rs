use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use rewatch::engine::runtime::EVENT_CHANNEL_CAPACITY;
use rewatch::engine::{
    BuildOutcome, Generation, PipelineCore, PipelineEvent, PipelineHandle, Supervisor,
    SupervisorOptions,
};
use rewatch::errors::Result;
use rewatch::exec::{BackendFuture, ProcessBackend};
use rewatch::fs::FileSystem;
use rewatch::notification::{NoopNotifier, SharedNotifier};
use rewatch::output::{Label, SharedOutput};
use rewatch::types::RestartStrategy;

use crate::capture::CapturedOutput;
use crate::MockFileSystem;

/// Observable lifecycle step recorded by [`FakeBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    TerminateRequested,
    ProcessExited { pid: u32 },
    BuildStarted,
    BuildFinished { success: bool },
    BuildTerminated,
    RunStarted { generation: Generation, pid: u32 },
}

pub type Journal = Arc<Mutex<Vec<Lifecycle>>>;

#[derive(Debug, Default)]
struct FakeState {
    next_pid: u32,
    running: Vec<u32>,
    builds: VecDeque<bool>,
}

/// A fake backend that:
/// - records every lifecycle step into a shared journal
/// - "runs" processes by handing out fake pids
/// - finishes builds immediately, with scripted results (success by default)
pub struct FakeBackend {
    tx: mpsc::Sender<PipelineEvent>,
    run_steps: usize,
    journal: Journal,
    state: Arc<Mutex<FakeState>>,
}

impl FakeBackend {
    pub fn new(tx: mpsc::Sender<PipelineEvent>, run_steps: usize) -> Self {
        Self {
            tx,
            run_steps,
            journal: Arc::new(Mutex::new(Vec::new())),
            state: Arc::new(Mutex::new(FakeState {
                next_pid: 1000,
                ..FakeState::default()
            })),
        }
    }

    /// Results of the next builds, in order. Unscripted builds succeed.
    pub fn with_builds(self, results: &[bool]) -> Self {
        self.state.lock().unwrap().builds = results.iter().copied().collect();
        self
    }

    pub fn journal(&self) -> Journal {
        Arc::clone(&self.journal)
    }

    pub fn view(&self) -> FakeView {
        FakeView {
            state: Arc::clone(&self.state),
        }
    }

    fn record(&self, entry: Lifecycle) {
        self.journal.lock().unwrap().push(entry);
    }
}

/// Read access to the fake processes after the backend moved into a
/// supervisor.
#[derive(Clone)]
pub struct FakeView {
    state: Arc<Mutex<FakeState>>,
}

impl FakeView {
    pub fn running_pids(&self) -> Vec<u32> {
        self.state.lock().unwrap().running.clone()
    }

    /// Queue the result of a future build.
    pub fn push_build(&self, success: bool) {
        self.state.lock().unwrap().builds.push_back(success);
    }
}

impl ProcessBackend for FakeBackend {
    fn start_build(&mut self) -> BackendFuture<'_> {
        Box::pin(async move {
            self.record(Lifecycle::BuildStarted);
            let success = self.state.lock().unwrap().builds.pop_front().unwrap_or(true);
            self.record(Lifecycle::BuildFinished { success });

            let outcome = if success {
                BuildOutcome::Succeeded {
                    elapsed: Duration::from_millis(5),
                }
            } else {
                BuildOutcome::Failed {
                    reason: "exit status: 2".to_string(),
                }
            };
            let _ = self.tx.send(PipelineEvent::BuildFinished(outcome)).await;
            Ok(())
        })
    }

    fn terminate_build(&mut self) -> BackendFuture<'_> {
        Box::pin(async move {
            self.record(Lifecycle::BuildTerminated);
            Ok(())
        })
    }

    fn start_run_steps(&mut self, generation: Generation) -> BackendFuture<'_> {
        Box::pin(async move {
            for _ in 0..self.run_steps {
                let pid = {
                    let mut state = self.state.lock().unwrap();
                    state.next_pid += 1;
                    let pid = state.next_pid;
                    state.running.push(pid);
                    pid
                };
                self.record(Lifecycle::RunStarted { generation, pid });
            }
            Ok(())
        })
    }

    fn terminate_run_steps(&mut self) -> BackendFuture<'_> {
        Box::pin(async move {
            let running = std::mem::take(&mut self.state.lock().unwrap().running);
            if running.is_empty() {
                return Ok(());
            }
            self.record(Lifecycle::TerminateRequested);
            for pid in running {
                self.record(Lifecycle::ProcessExited { pid });
            }
            Ok(())
        })
    }
}

/// A supervisor running on a [`FakeBackend`], plus everything a test needs
/// to drive and observe it.
pub struct FakePipeline {
    pub handle: PipelineHandle,
    /// Raw sender, for injecting backend events such as run-step exits.
    pub events: mpsc::Sender<PipelineEvent>,
    pub journal: Journal,
    pub view: FakeView,
    pub output: CapturedOutput,
    pub fs: MockFileSystem,
    pub task: JoinHandle<Result<()>>,
}

impl FakePipeline {
    pub fn spawn(
        strategy: RestartStrategy,
        has_build: bool,
        run_steps: usize,
        builds: &[bool],
        clean: Vec<std::path::PathBuf>,
    ) -> Self {
        Self::spawn_with_notifier(
            strategy,
            has_build,
            run_steps,
            builds,
            clean,
            Arc::new(NoopNotifier),
        )
    }

    pub fn spawn_with_notifier(
        strategy: RestartStrategy,
        has_build: bool,
        run_steps: usize,
        builds: &[bool],
        clean: Vec<std::path::PathBuf>,
        notifier: SharedNotifier,
    ) -> Self {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let backend = FakeBackend::new(tx.clone(), run_steps).with_builds(builds);
        let journal = backend.journal();
        let view = backend.view();
        let output = CapturedOutput::new();
        let fs = MockFileSystem::new();

        let shared_output: SharedOutput = output.shared();
        let shared_fs: Arc<dyn FileSystem> = Arc::new(fs.clone());
        let options = SupervisorOptions {
            label: "app".to_string(),
            run_labels: (0..run_steps).map(|_| Label::schema("app")).collect(),
            clean,
            fs: shared_fs,
            output: shared_output,
            notifier,
        };

        let core = PipelineCore::new(strategy, has_build, run_steps);
        let task = tokio::spawn(Supervisor::new(core, rx, backend, options).run());

        Self {
            handle: PipelineHandle::new(tx.clone()),
            events: tx,
            journal,
            view,
            output,
            fs,
            task,
        }
    }

    pub fn journal(&self) -> Vec<Lifecycle> {
        self.journal.lock().unwrap().clone()
    }

    pub fn clear_journal(&self) {
        self.journal.lock().unwrap().clear();
    }
}
