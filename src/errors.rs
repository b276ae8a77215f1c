// src/errors.rs

//! Crate-wide error types.
//!
//! - [`LoadgraphError`] covers configuration and control-surface misuse.
//! - [`TaskError`] is the terminal error recorded for a single task.
//! - [`RunError`] is the run-level failure surfaced to the caller.

use std::time::Duration;

use thiserror::Error;

use crate::task::TaskId;

#[derive(Error, Debug)]
pub enum LoadgraphError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Duplicate task id: {0}")]
    DuplicateTask(TaskId),

    #[error("Cycle detected in task graph: {0}")]
    DagCycle(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("scheduler is not idle; call reset() before starting a new run")]
    NotIdle,

    #[error("a run is in progress; cancel it and wait for it to finish first")]
    RunInProgress,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, LoadgraphError>;

/// Terminal error of a single task within one run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// The operation kept failing until the retry budget ran out.
    #[error("failed after {attempts} attempt(s): {message}")]
    Failed { attempts: u32, message: String },

    /// The last attempt did not finish within the task timeout.
    #[error("timed out after {timeout:?} on attempt {attempts}")]
    TimedOut { attempts: u32, timeout: Duration },

    #[error("upstream dependency '{dependency}' failed")]
    UpstreamDependencyFailed { dependency: TaskId },

    #[error("dependency deadlock")]
    Deadlock,

    #[error("run cancelled before the task started")]
    Cancelled,

    #[error("run aborted by a critical task failure")]
    Aborted,
}

impl TaskError {
    /// Errors produced by actually running the operation (as opposed to
    /// being synthesized by the controller).
    pub fn is_transient(&self) -> bool {
        matches!(self, TaskError::Failed { .. } | TaskError::TimedOut { .. })
    }
}

/// Failure of a whole run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    #[error("critical task(s) failed: {}", .tasks.join(", "))]
    CriticalTaskFailed { tasks: Vec<TaskId> },

    #[error("dependency deadlock among task(s): {}", .tasks.join(", "))]
    Deadlock { tasks: Vec<TaskId> },
}
