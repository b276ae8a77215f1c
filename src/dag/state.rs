// src/dag/state.rs

//! Per-run task state.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};

use crate::dag::DagGraph;
use crate::errors::TaskError;
use crate::task::TaskId;

/// Public, read-only view of where a task is in the current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPhase {
    /// Waiting for dependencies or a free slot.
    Pending,
    /// Admitted and executing; `attempt` is the attempt in progress.
    Running { attempt: u32 },
    Completed,
    Failed,
}

/// Mutable state of one scheduling run.
///
/// `pending`, `running` and the terminal maps partition the task set: every
/// id is in exactly one of them. Only the core controller mutates this; the
/// resolver, gate and reporter read it.
#[derive(Debug)]
pub struct RunState<T> {
    /// Keyed by submission index so iteration follows submission order.
    pending: BTreeMap<usize, TaskId>,
    /// Running task id -> attempt in progress.
    running: HashMap<TaskId, u32>,
    completed: HashMap<TaskId, T>,
    failed: HashMap<TaskId, TaskError>,
    cancelled: bool,
    total: usize,
}

impl<T> RunState<T> {
    /// All tasks of the graph start out pending.
    pub fn new(graph: &DagGraph) -> Self {
        let pending = graph
            .tasks()
            .enumerate()
            .map(|(idx, id)| (idx, id.to_string()))
            .collect();

        Self {
            pending,
            running: HashMap::new(),
            completed: HashMap::new(),
            failed: HashMap::new(),
            cancelled: false,
            total: graph.len(),
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Pending ids in submission order.
    pub fn pending(&self) -> impl Iterator<Item = &str> {
        self.pending.values().map(|s| s.as_str())
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.pending.values().any(|p| p == id)
    }

    pub fn running(&self) -> impl Iterator<Item = (&str, u32)> {
        self.running.iter().map(|(id, attempt)| (id.as_str(), *attempt))
    }

    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    pub fn is_running(&self, id: &str) -> bool {
        self.running.contains_key(id)
    }

    pub fn completed(&self) -> &HashMap<TaskId, T> {
        &self.completed
    }

    pub fn failed(&self) -> &HashMap<TaskId, TaskError> {
        &self.failed
    }

    pub fn is_completed(&self, id: &str) -> bool {
        self.completed.contains_key(id)
    }

    pub fn is_failed(&self, id: &str) -> bool {
        self.failed.contains_key(id)
    }

    /// Number of tasks in a terminal set.
    pub fn finished_count(&self) -> usize {
        self.completed.len() + self.failed.len()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn phase_of(&self, id: &str) -> Option<TaskPhase> {
        if let Some(&attempt) = self.running.get(id) {
            Some(TaskPhase::Running { attempt })
        } else if self.completed.contains_key(id) {
            Some(TaskPhase::Completed)
        } else if self.failed.contains_key(id) {
            Some(TaskPhase::Failed)
        } else if self.is_pending(id) {
            Some(TaskPhase::Pending)
        } else {
            None
        }
    }

    /// Move a task from `pending` to `running` at attempt 1.
    pub(crate) fn start(&mut self, graph: &DagGraph, id: &str) -> bool {
        let removed = graph
            .index_of(id)
            .and_then(|idx| self.pending.remove(&idx));

        match removed {
            Some(id) => {
                debug!(task = %id, "admitted; marking Running");
                self.running.insert(id, 1);
                true
            }
            None => {
                warn!(task = %id, "start requested for a task that is not pending; ignoring");
                false
            }
        }
    }

    /// Record that a running task moved on to another attempt.
    pub(crate) fn record_attempt(&mut self, id: &str, attempt: u32) {
        if let Some(current) = self.running.get_mut(id) {
            *current = attempt.max(*current);
        }
    }

    /// Move a running task to `completed`.
    pub(crate) fn complete(&mut self, id: &str, value: T) -> bool {
        match self.running.remove_entry(id) {
            Some((id, _)) => {
                debug!(task = %id, "marking Completed");
                self.completed.insert(id, value);
                true
            }
            None => {
                warn!(task = %id, "completion for a task that is not running; ignoring");
                false
            }
        }
    }

    /// Move a pending or running task to `failed`.
    pub(crate) fn fail(&mut self, graph: &DagGraph, id: &str, error: TaskError) -> bool {
        let removed = self.running.remove_entry(id).map(|(id, _)| id).or_else(|| {
            graph
                .index_of(id)
                .and_then(|idx| self.pending.remove(&idx))
        });

        match removed {
            Some(id) => {
                debug!(task = %id, error = %error, "marking Failed");
                self.failed.insert(id, error);
                true
            }
            None => {
                warn!(task = %id, "failure for a task that is already terminal; ignoring");
                false
            }
        }
    }

    /// Set the cancellation flag. Returns `false` if it was already set.
    pub(crate) fn cancel(&mut self) -> bool {
        !std::mem::replace(&mut self.cancelled, true)
    }

    /// Split the state into its terminal maps.
    pub(crate) fn into_terminal(self) -> (HashMap<TaskId, T>, HashMap<TaskId, TaskError>) {
        (self.completed, self.failed)
    }
}
