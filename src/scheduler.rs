// src/scheduler.rs

//! Caller-facing control surface.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::dag::DagGraph;
use crate::engine::{CoreRun, RunResult, RunStatus, Runtime};
use crate::errors::{LoadgraphError, Result};
use crate::exec::ExecSettings;
use crate::progress::Progress;
use crate::task::Task;
use crate::types::SchedulerConfig;

/// Lifecycle of a [`Scheduler`] instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerStatus {
    Idle,
    Running,
    Finished(RunStatus),
}

#[derive(Debug)]
struct Control {
    status: SchedulerStatus,
    cancel: CancellationToken,
    /// Monotonically increasing run ID.
    run_counter: u64,
}

/// Dependency-aware concurrent task scheduler.
///
/// One instance executes one run at a time: `start` moves it from `Idle` to
/// `Running`, and `reset` returns a finished instance to `Idle`. All methods
/// take `&self`, so a shared instance can be cancelled from another task
/// while `start` is pending.
///
/// ```rust,ignore
/// let scheduler = Scheduler::new(SchedulerConfig::default())?;
/// let tasks = vec![
///     Task::builder("profile").critical(true).build(|_| async { Ok::<_, anyhow::Error>(1) }),
///     Task::builder("sales").after("profile").build(|_| async { Ok::<_, anyhow::Error>(2) }),
/// ];
/// let result = scheduler.start(tasks).await?;
/// ```
#[derive(Debug)]
pub struct Scheduler {
    config: SchedulerConfig,
    control: Mutex<Control>,
    progress: Arc<watch::Sender<Progress>>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        if config.max_concurrency == 0 {
            return Err(LoadgraphError::ConfigError(
                "max_concurrency must be >= 1 (got 0)".to_string(),
            ));
        }

        let (progress, _) = watch::channel(Progress::default());

        Ok(Self {
            config,
            control: Mutex::new(Control {
                status: SchedulerStatus::Idle,
                cancel: CancellationToken::new(),
                run_counter: 0,
            }),
            progress: Arc::new(progress),
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn status(&self) -> SchedulerStatus {
        self.lock().status
    }

    /// Receiver for progress snapshots, updated after every state transition.
    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.progress.subscribe()
    }

    /// Latest progress snapshot.
    pub fn progress(&self) -> Progress {
        self.progress.borrow().clone()
    }

    /// Execute `tasks` and wait for the run to reach a terminal state.
    ///
    /// Fails without running anything if the scheduler is not idle or the
    /// task set contains duplicate ids. Task failures, deadlocks and critical
    /// aborts are not errors here; they are reported in the [`RunResult`].
    pub async fn start<T: Send + 'static>(&self, tasks: Vec<Task<T>>) -> Result<RunResult<T>> {
        let graph = DagGraph::new(tasks.iter().map(|t| t.info.clone()))?;

        let (run_id, cancel) = {
            let mut control = self.lock();
            if control.status != SchedulerStatus::Idle {
                return Err(LoadgraphError::NotIdle);
            }
            control.run_counter += 1;
            control.status = SchedulerStatus::Running;
            (control.run_counter, control.cancel.clone())
        };

        info!(
            run_id,
            tasks = graph.len(),
            max_concurrency = self.config.max_concurrency,
            enable_retries = self.config.enable_retries,
            "starting scheduling run"
        );

        let mut guard = RunGuard {
            scheduler: self,
            finished: false,
        };

        let settings = ExecSettings {
            enable_retries: self.config.enable_retries,
            backoff: self.config.backoff,
        };
        let core = CoreRun::new(graph, self.config.max_concurrency);
        let runtime = Runtime::new(
            core,
            tasks,
            settings,
            cancel,
            Arc::clone(&self.progress),
        );

        let result = runtime.run().await;

        guard.finished = true;
        let mut control = self.lock();
        control.status = match &result {
            Ok(run) => SchedulerStatus::Finished(run.status),
            Err(_) => SchedulerStatus::Finished(RunStatus::Cancelled),
        };

        if let Ok(run) = &result {
            info!(run_id, status = ?run.status, summary = %run.summary(), "scheduling run finished");
        }

        result
    }

    /// Request cancellation of the active run.
    ///
    /// No new tasks are admitted; running tasks see the signal through their
    /// attempt context and are otherwise allowed to finish. Idempotent, and a
    /// no-op when no run is active.
    pub fn cancel(&self) {
        let control = self.lock();
        if control.status != SchedulerStatus::Running {
            debug!(status = ?control.status, "cancel requested with no active run; ignoring");
            return;
        }
        if control.cancel.is_cancelled() {
            debug!("cancel already requested");
            return;
        }
        info!(run_id = control.run_counter, "cancelling scheduling run");
        control.cancel.cancel();
    }

    /// Clear all run state so the instance can start a new run.
    pub fn reset(&self) -> Result<()> {
        let mut control = self.lock();
        if control.status == SchedulerStatus::Running {
            return Err(LoadgraphError::RunInProgress);
        }
        control.status = SchedulerStatus::Idle;
        control.cancel = CancellationToken::new();
        self.progress.send_replace(Progress::default());
        debug!("scheduler reset to idle");
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Leaves the scheduler in a consistent state if the `start` future is
/// dropped before the run finishes.
struct RunGuard<'a> {
    scheduler: &'a Scheduler,
    finished: bool,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let mut control = self.scheduler.lock();
        control.cancel.cancel();
        control.status = SchedulerStatus::Finished(RunStatus::Cancelled);
        debug!("run dropped before finishing; marking cancelled");
    }
}
