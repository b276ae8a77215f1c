// src/engine/core.rs

//! Pure core controller.
//!
//! [`CoreRun`] is a synchronous, deterministic state machine for one run. It
//! consumes [`RunEvent`]s and produces a [`CoreStep`]: the commands the IO
//! shell should carry out, a fresh progress snapshot, and whether the run
//! has reached a terminal state.
//!
//! The core has no channels, no Tokio types and performs no IO, so every
//! scheduling decision can be exercised directly in tests.

use tracing::{debug, info, warn};

use crate::dag::{gate, resolver, DagGraph, RunState};
use crate::engine::{RunEvent, RunResult, RunStatus};
use crate::errors::{RunError, TaskError};
use crate::progress::{self, Progress};
use crate::task::TaskId;

/// Command produced by the core, to be executed by the IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    /// Start executing these tasks, in this order.
    Dispatch(Vec<TaskId>),
    /// Stop every in-flight execution and discard its outcome.
    AbortInFlight,
}

/// Decision returned by the core after handling one event.
#[derive(Debug, Clone)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
    /// Progress after this step.
    pub progress: Progress,
    /// Set once the run reaches a terminal state.
    pub finished: Option<RunStatus>,
}

/// Controller state for one run.
#[derive(Debug)]
pub struct CoreRun<T> {
    graph: DagGraph,
    state: RunState<T>,
    max_concurrency: usize,
    /// Tasks failed with [`TaskError::Deadlock`].
    deadlocked: Vec<TaskId>,
    /// Critical tasks that failed terminally.
    critical_failures: Vec<TaskId>,
    status: Option<RunStatus>,
}

impl<T> CoreRun<T> {
    /// `max_concurrency` is clamped to at least 1.
    pub fn new(graph: DagGraph, max_concurrency: usize) -> Self {
        let state = RunState::new(&graph);
        Self {
            graph,
            state,
            max_concurrency: max_concurrency.max(1),
            deadlocked: Vec::new(),
            critical_failures: Vec::new(),
            status: None,
        }
    }

    pub fn graph(&self) -> &DagGraph {
        &self.graph
    }

    pub fn state(&self) -> &RunState<T> {
        &self.state
    }

    pub fn status(&self) -> Option<RunStatus> {
        self.status
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_some()
    }

    /// Start the run: fail tasks that can never become eligible, then admit
    /// the first batch.
    pub fn begin(&mut self) -> CoreStep {
        let unsatisfiable = self.graph.unsatisfiable();
        if !unsatisfiable.is_empty() {
            warn!(
                tasks = ?unsatisfiable,
                "tasks on a dependency cycle or depending on unknown ids; failing them up front"
            );
            for id in unsatisfiable {
                if self.state.fail(&self.graph, &id, TaskError::Deadlock) {
                    self.deadlocked.push(id);
                }
            }
        }

        self.advance(Vec::new())
    }

    /// Handle a single event and decide what happens next.
    pub fn step(&mut self, event: RunEvent<T>) -> CoreStep {
        if self.status.is_some() {
            debug!("event received after the run finished; ignoring");
            return self.snapshot(Vec::new());
        }

        match event {
            RunEvent::AttemptStarted { task, attempt } => {
                if attempt > 1 {
                    info!(task = %task, attempt, "retrying task");
                }
                self.state.record_attempt(&task, attempt);
            }
            RunEvent::AttemptFailed {
                task,
                attempt,
                error,
                retry_in,
            } => {
                debug!(task = %task, attempt, error = %error, ?retry_in, "attempt failed");
            }
            RunEvent::TaskFinished { task, outcome } => match outcome {
                Ok(value) => {
                    self.state.complete(&task, value);
                }
                Err(error) => {
                    warn!(task = %task, error = %error, "task failed terminally");
                    if self.state.fail(&self.graph, &task, error) {
                        self.note_if_critical(&task);
                    }
                }
            },
            RunEvent::CancelRequested => {
                if self.state.cancel() {
                    info!(
                        running = self.state.running_count(),
                        "cancellation requested; no further tasks will be admitted"
                    );
                } else {
                    debug!("cancellation already requested; ignoring");
                }
            }
        }

        self.advance(Vec::new())
    }

    /// Consume the finished core into a [`RunResult`].
    ///
    /// Returns `None` if the run has not reached a terminal state.
    pub fn into_result(self) -> Option<RunResult<T>> {
        let status = self.status?;
        let total = self.state.total();

        let error = if !self.critical_failures.is_empty() {
            Some(RunError::CriticalTaskFailed {
                tasks: self.critical_failures,
            })
        } else if status == RunStatus::Deadlocked {
            Some(RunError::Deadlock {
                tasks: self.deadlocked,
            })
        } else {
            None
        };

        let (completed, failed) = self.state.into_terminal();
        Some(RunResult {
            status,
            completed,
            failed,
            error,
            total,
        })
    }

    /// The controller loop body, run after every state change.
    fn advance(&mut self, mut commands: Vec<CoreCommand>) -> CoreStep {
        self.propagate_failures();

        if !self.critical_failures.is_empty() {
            self.abort_run(&mut commands);
            self.finish(RunStatus::Completed);
            return self.snapshot(commands);
        }

        if self.state.is_cancelled() {
            if self.state.running_count() == 0 {
                self.fail_all_pending(TaskError::Cancelled);
                self.finish(RunStatus::Cancelled);
            }
            return self.snapshot(commands);
        }

        if resolver::is_deadlocked(&self.state, &self.graph) {
            let stuck: Vec<TaskId> = self.state.pending().map(str::to_string).collect();
            self.fail_all_pending(TaskError::Deadlock);
            self.deadlocked.extend(stuck);
            self.finish(RunStatus::Deadlocked);
            return self.snapshot(commands);
        }

        let eligible = resolver::eligible(&self.state, &self.graph);
        let admitted = gate::admit(
            &eligible,
            &self.graph,
            self.state.running_count(),
            self.max_concurrency,
        );

        for id in &admitted {
            if self.state.start(&self.graph, id) {
                info!(task = %id, "dispatching task");
            }
        }
        if !admitted.is_empty() {
            commands.push(CoreCommand::Dispatch(admitted));
        }

        if self.state.pending_count() == 0 && self.state.running_count() == 0 {
            let status = if self.deadlocked.is_empty() {
                RunStatus::Completed
            } else {
                RunStatus::Deadlocked
            };
            self.finish(status);
        }

        self.snapshot(commands)
    }

    /// Cascade-fail pending dependents of failed tasks until nothing changes.
    fn propagate_failures(&mut self) {
        loop {
            let cascades = resolver::cascade_failures(&self.state, &self.graph);
            if cascades.is_empty() {
                break;
            }

            for (id, dependency) in cascades {
                warn!(
                    task = %id,
                    dependency = %dependency,
                    "upstream dependency failed; failing dependent without running it"
                );
                if self.state.fail(
                    &self.graph,
                    &id,
                    TaskError::UpstreamDependencyFailed { dependency },
                ) {
                    self.note_if_critical(&id);
                }
            }
        }
    }

    /// Failures that arrive after cancellation are a consequence of it and do
    /// not count as critical.
    fn note_if_critical(&mut self, id: &str) {
        if self.state.is_cancelled() {
            return;
        }
        let critical = self.graph.info(id).is_some_and(|info| info.critical);
        if critical && !self.critical_failures.iter().any(|c| c == id) {
            self.critical_failures.push(id.to_string());
        }
    }

    fn abort_run(&mut self, commands: &mut Vec<CoreCommand>) {
        let in_flight: Vec<TaskId> = self.state.running().map(|(id, _)| id.to_string()).collect();

        warn!(
            critical = ?self.critical_failures,
            abandoned = ?in_flight,
            "critical task failed; aborting run"
        );

        if !in_flight.is_empty() {
            commands.push(CoreCommand::AbortInFlight);
        }
        for id in in_flight {
            self.state.fail(&self.graph, &id, TaskError::Aborted);
        }
        self.fail_all_pending(TaskError::Aborted);
    }

    fn fail_all_pending(&mut self, error: TaskError) {
        let pending: Vec<TaskId> = self.state.pending().map(str::to_string).collect();
        for id in pending {
            self.state.fail(&self.graph, &id, error.clone());
        }
    }

    fn finish(&mut self, status: RunStatus) {
        info!(
            ?status,
            completed = self.state.completed().len(),
            failed = self.state.failed().len(),
            "run finished"
        );
        self.status = Some(status);
    }

    fn snapshot(&self, commands: Vec<CoreCommand>) -> CoreStep {
        CoreStep {
            commands,
            progress: progress::report(&self.state, &self.graph),
            finished: self.status,
        }
    }
}
