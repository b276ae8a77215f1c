// src/engine/mod.rs

//! Scheduler controller.
//!
//! The pure core state machine lives in [`core`]: it owns the [`RunState`]
//! of one run, consumes [`RunEvent`]s and returns [`CoreCommand`]s. The
//! async/IO shell in [`runtime`] spawns task executions, forwards their
//! events into the core, publishes progress and carries out the commands.
//!
//! [`RunState`]: crate::dag::RunState

use std::collections::HashMap;
use std::time::Duration;

use crate::errors::{RunError, TaskError};
use crate::task::TaskId;

/// Events flowing into the controller from executions and the caller.
#[derive(Debug, Clone)]
pub enum RunEvent<T> {
    /// An execution started attempt number `attempt` (1-based).
    AttemptStarted { task: TaskId, attempt: u32 },
    /// An attempt failed. `retry_in` is `None` when no retry will follow.
    AttemptFailed {
        task: TaskId,
        attempt: u32,
        error: TaskError,
        retry_in: Option<Duration>,
    },
    /// An execution reached its terminal outcome.
    TaskFinished {
        task: TaskId,
        outcome: Result<T, TaskError>,
    },
    /// The caller asked to cancel the run.
    CancelRequested,
}

/// Terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every task reached a terminal state, or a critical task failure
    /// aborted the run (see [`RunResult::error`]).
    Completed,
    /// The caller cancelled the run.
    Cancelled,
    /// Some tasks could never become eligible.
    Deadlocked,
}

/// Outcome of one scheduling run.
#[derive(Debug)]
pub struct RunResult<T> {
    pub status: RunStatus,
    pub completed: HashMap<TaskId, T>,
    pub failed: HashMap<TaskId, TaskError>,
    /// Run-level failure, if any. Individual task failures only appear in
    /// `failed`.
    pub error: Option<RunError>,
    /// Number of submitted tasks.
    pub total: usize,
}

impl<T> RunResult<T> {
    /// Completed with no run-level error. Non-critical task failures are
    /// still allowed.
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Completed && self.error.is_none()
    }

    /// Human-readable tally, e.g. "3 of 4 tasks loaded".
    pub fn summary(&self) -> String {
        format!("{} of {} tasks loaded", self.completed.len(), self.total)
    }

    /// Surface the run-level failure as an `Err`.
    pub fn into_result(self) -> Result<Self, RunError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

pub mod core;
pub mod runtime;

pub use self::core::{CoreCommand, CoreRun, CoreStep};
pub use self::runtime::Runtime;
