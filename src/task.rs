// src/task.rs

//! Task descriptors.
//!
//! A [`Task`] pairs static metadata ([`TaskInfo`]) with the asynchronous
//! operation to execute. Tasks are built once per run through
//! [`TaskBuilder`] and never mutated afterwards; a retry re-invokes the
//! operation rather than changing the task.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::types::Priority;

/// Canonical task identifier type used throughout the crate.
pub type TaskId = String;

/// Default per-attempt timeout when none is given.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Boxed future returned by a task operation.
pub type OperationFuture<T> = Pin<Box<dyn Future<Output = anyhow::Result<T>> + Send + 'static>>;

/// The unit of work behind a task. Invoked once per attempt.
pub type TaskOperation<T> = Arc<dyn Fn(AttemptContext) -> OperationFuture<T> + Send + Sync>;

/// Handed to the operation on every attempt.
#[derive(Debug, Clone)]
pub struct AttemptContext {
    /// 1-based attempt number.
    pub attempt: u32,
    /// Fires when the caller cancels the run. Operations that can stop early
    /// should select on it; others simply run to completion or timeout.
    pub cancel: CancellationToken,
}

/// Static description of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInfo {
    pub id: TaskId,
    pub display_name: String,
    pub priority: Priority,
    /// Maximum duration of a single attempt.
    pub timeout: Duration,
    /// Additional attempts allowed after the first failure.
    pub max_retries: u32,
    /// Tasks that must complete successfully before this one may start.
    pub dependencies: Vec<TaskId>,
    /// A terminal failure of a critical task aborts the whole run.
    pub critical: bool,
}

/// A schedulable unit of work producing a `T`.
pub struct Task<T> {
    pub info: TaskInfo,
    pub operation: TaskOperation<T>,
}

impl Task<()> {
    /// Start building a task. The output type is fixed later by
    /// [`TaskBuilder::build`].
    pub fn builder(id: impl Into<TaskId>) -> TaskBuilder {
        TaskBuilder::new(id)
    }
}

impl<T> Task<T> {
    pub fn id(&self) -> &str {
        &self.info.id
    }
}

impl<T> Clone for Task<T> {
    fn clone(&self) -> Self {
        Self {
            info: self.info.clone(),
            operation: Arc::clone(&self.operation),
        }
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Task`].
#[derive(Debug, Clone)]
pub struct TaskBuilder {
    info: TaskInfo,
}

impl TaskBuilder {
    pub fn new(id: impl Into<TaskId>) -> Self {
        let id = id.into();
        Self {
            info: TaskInfo {
                display_name: id.clone(),
                id,
                priority: Priority::default(),
                timeout: DEFAULT_TIMEOUT,
                max_retries: 0,
                dependencies: Vec::new(),
                critical: false,
            },
        }
    }

    pub fn id(&self) -> &str {
        &self.info.id
    }

    /// Start from existing metadata, e.g. a task loaded from a plan file.
    pub fn from_info(info: TaskInfo) -> Self {
        Self { info }
    }

    pub fn name(mut self, display_name: impl Into<String>) -> Self {
        self.info.display_name = display_name.into();
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.info.priority = priority;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.info.timeout = timeout;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.info.max_retries = max_retries;
        self
    }

    /// Add a dependency. Repeated ids are ignored.
    pub fn after(mut self, dependency: impl Into<TaskId>) -> Self {
        let dependency = dependency.into();
        if !self.info.dependencies.contains(&dependency) {
            self.info.dependencies.push(dependency);
        }
        self
    }

    pub fn critical(mut self, critical: bool) -> Self {
        self.info.critical = critical;
        self
    }

    /// Attach the operation and finish the task.
    pub fn build<T, F, Fut>(self, operation: F) -> Task<T>
    where
        F: Fn(AttemptContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let operation: TaskOperation<T> =
            Arc::new(move |ctx: AttemptContext| -> OperationFuture<T> { Box::pin(operation(ctx)) });
        Task {
            info: self.info,
            operation,
        }
    }
}
