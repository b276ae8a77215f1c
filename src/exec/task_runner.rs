// src/exec/task_runner.rs

//! Execution of a single admitted task: timeout race plus retries.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::RunEvent;
use crate::errors::TaskError;
use crate::exec::BackoffPolicy;
use crate::task::{AttemptContext, Task, TaskId};

/// Engine-level settings shared by every task in a run.
#[derive(Debug, Clone, Copy)]
pub struct ExecSettings {
    pub enable_retries: bool,
    pub backoff: BackoffPolicy,
}

/// Result of one try of a task's operation.
#[derive(Debug)]
pub enum AttemptOutcome<T> {
    Success(T),
    Failure(String),
    TimedOut,
}

/// One try of a task's operation.
#[derive(Debug)]
pub struct Attempt<T> {
    pub task_id: TaskId,
    /// 1-based.
    pub attempt: u32,
    pub started_at: Instant,
    pub outcome: AttemptOutcome<T>,
}

/// Aborts the wrapped tokio task when dropped.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Run `task` until it succeeds or its retry budget is spent.
///
/// Attempt starts and failures are reported on `events`. Cancellation is
/// never forced onto a running attempt (the operation sees the token through
/// its [`AttemptContext`]), but it ends any backoff wait and prevents further
/// retries.
pub async fn run_task<T: Send + 'static>(
    task: Task<T>,
    settings: ExecSettings,
    cancel: CancellationToken,
    events: mpsc::Sender<RunEvent<T>>,
) -> (TaskId, Result<T, TaskError>) {
    let id = task.info.id.clone();
    let retries = if settings.enable_retries {
        task.info.max_retries
    } else {
        0
    };
    let max_attempts = retries.saturating_add(1);
    let mut attempt = 1;

    loop {
        let _ = events
            .send(RunEvent::AttemptStarted {
                task: id.clone(),
                attempt,
            })
            .await;

        let result = run_attempt(&task, attempt, &cancel).await;
        let elapsed = result.started_at.elapsed();

        let error = match result.outcome {
            AttemptOutcome::Success(value) => {
                info!(task = %id, attempt, ?elapsed, "task succeeded");
                return (id, Ok(value));
            }
            AttemptOutcome::Failure(message) => TaskError::Failed {
                attempts: attempt,
                message,
            },
            AttemptOutcome::TimedOut => TaskError::TimedOut {
                attempts: attempt,
                timeout: task.info.timeout,
            },
        };

        let exhausted = attempt >= max_attempts;
        let retry_in = if exhausted || cancel.is_cancelled() {
            None
        } else {
            Some(settings.backoff.delay_for(attempt))
        };

        warn!(
            task = %id,
            attempt,
            max_attempts,
            error = %error,
            ?retry_in,
            "task attempt failed"
        );

        let _ = events
            .send(RunEvent::AttemptFailed {
                task: id.clone(),
                attempt,
                error: error.clone(),
                retry_in,
            })
            .await;

        let Some(delay) = retry_in else {
            return (id, Err(error));
        };

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel.cancelled() => {
                info!(task = %id, attempt, "run cancelled during backoff; giving up on retries");
                return (id, Err(error));
            }
        }

        attempt += 1;
    }
}

/// Race one invocation of the operation against the task timeout.
///
/// The operation runs as its own tokio task so a panic fails the attempt
/// instead of the runner, and a timed-out invocation is aborted rather than
/// left running in the background.
async fn run_attempt<T: Send + 'static>(
    task: &Task<T>,
    attempt: u32,
    cancel: &CancellationToken,
) -> Attempt<T> {
    let started_at = Instant::now();
    let ctx = AttemptContext {
        attempt,
        cancel: cancel.clone(),
    };

    debug!(task = %task.info.id, attempt, timeout = ?task.info.timeout, "starting attempt");

    let handle = tokio::spawn((task.operation)(ctx));
    let _guard = AbortOnDrop(handle.abort_handle());

    let outcome = match tokio::time::timeout(task.info.timeout, handle).await {
        Ok(Ok(Ok(value))) => AttemptOutcome::Success(value),
        Ok(Ok(Err(err))) => AttemptOutcome::Failure(format!("{err:#}")),
        Ok(Err(join_err)) if join_err.is_panic() => {
            AttemptOutcome::Failure("operation panicked".to_string())
        }
        Ok(Err(_)) => AttemptOutcome::Failure("operation was aborted".to_string()),
        Err(_elapsed) => AttemptOutcome::TimedOut,
    };

    Attempt {
        task_id: task.info.id.clone(),
        attempt,
        started_at,
        outcome,
    }
}

/// Upper bound on how long [`run_task`] can take for `task`, ignoring the
/// time spent waiting for a slot.
pub fn worst_case_duration<T>(task: &Task<T>, settings: &ExecSettings) -> Duration {
    let retries = if settings.enable_retries {
        task.info.max_retries
    } else {
        0
    };

    task.info
        .timeout
        .saturating_mul(retries.saturating_add(1))
        .saturating_add(settings.backoff.total_delay(retries))
}
