// src/engine/runtime.rs

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::errors::{LoadgraphError, Result, TaskError};
use crate::exec::{run_task, ExecSettings};
use crate::progress::Progress;
use crate::task::{Task, TaskId};

use super::core::{CoreCommand, CoreRun, CoreStep};
use super::{RunEvent, RunResult};

type Execution<T> = (TaskId, std::result::Result<T, TaskError>);

/// Drives a [`CoreRun`] to completion.
///
/// This is the IO shell around the core: it spawns one execution per
/// admitted task into a [`JoinSet`], feeds attempt events, completions and
/// the caller's cancellation into the core, publishes progress, and carries
/// out the commands the core returns.
pub struct Runtime<T> {
    core: CoreRun<T>,
    tasks: HashMap<TaskId, Task<T>>,
    settings: ExecSettings,
    cancel: CancellationToken,
    progress: Arc<watch::Sender<Progress>>,
}

impl<T> fmt::Debug for Runtime<T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static> Runtime<T> {
    pub fn new(
        core: CoreRun<T>,
        tasks: impl IntoIterator<Item = Task<T>>,
        settings: ExecSettings,
        cancel: CancellationToken,
        progress: Arc<watch::Sender<Progress>>,
    ) -> Self {
        let tasks = tasks
            .into_iter()
            .map(|task| (task.info.id.clone(), task))
            .collect();

        Self {
            core,
            tasks,
            settings,
            cancel,
            progress,
        }
    }

    /// Main event loop.
    ///
    /// Returns once the core reports a terminal state. In-flight executions
    /// still running at that point (only possible after a critical failure)
    /// are aborted. An execution that dies without reporting an outcome is a
    /// bug in the runner and ends the run with an error.
    pub async fn run(mut self) -> Result<RunResult<T>> {
        info!(tasks = self.core.graph().len(), "run started");

        let (event_tx, mut event_rx) = mpsc::channel::<RunEvent<T>>(64);
        let mut in_flight: JoinSet<Execution<T>> = JoinSet::new();
        let mut cancel_seen = false;

        let mut step = self.core.begin();

        loop {
            self.apply(step, &mut in_flight, &event_tx);

            if self.core.is_finished() {
                break;
            }

            // Cancellation is polled first so the core learns about it
            // before any failure the cancellation itself caused.
            let event = tokio::select! {
                biased;
                _ = self.cancel.cancelled(), if !cancel_seen => {
                    cancel_seen = true;
                    RunEvent::CancelRequested
                }
                Some(joined) = in_flight.join_next() => match joined {
                    Ok((task, outcome)) => RunEvent::TaskFinished { task, outcome },
                    Err(join_err) => {
                        error!(error = %join_err, "task execution terminated abnormally");
                        in_flight.abort_all();
                        return Err(LoadgraphError::Other(anyhow::anyhow!(
                            "task execution terminated abnormally: {join_err}"
                        )));
                    }
                },
                Some(event) = event_rx.recv() => event,
            };

            step = self.core.step(event);
        }

        in_flight.abort_all();

        self.core.into_result().ok_or_else(|| {
            LoadgraphError::Other(anyhow::anyhow!("run loop exited before the core finished"))
        })
    }

    fn apply(
        &mut self,
        step: CoreStep,
        in_flight: &mut JoinSet<Execution<T>>,
        event_tx: &mpsc::Sender<RunEvent<T>>,
    ) {
        for command in step.commands {
            match command {
                CoreCommand::Dispatch(admitted) => {
                    for id in admitted {
                        self.dispatch(id, in_flight, event_tx);
                    }
                }
                CoreCommand::AbortInFlight => {
                    info!(in_flight = in_flight.len(), "aborting in-flight executions");
                    in_flight.abort_all();
                }
            }
        }

        if let Some(status) = step.finished {
            debug!(?status, percent = step.progress.percent, "publishing final progress");
        }
        self.progress.send_replace(step.progress);
    }

    fn dispatch(
        &mut self,
        id: TaskId,
        in_flight: &mut JoinSet<Execution<T>>,
        event_tx: &mpsc::Sender<RunEvent<T>>,
    ) {
        let Some(task) = self.tasks.get(&id).cloned() else {
            error!(task = %id, "admitted task has no descriptor; this is a bug");
            return;
        };

        debug!(task = %id, running = in_flight.len() + 1, "spawning execution");

        in_flight.spawn(run_task(
            task,
            self.settings,
            self.cancel.clone(),
            event_tx.clone(),
        ));
    }
}
