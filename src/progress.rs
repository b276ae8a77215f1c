// src/progress.rs

//! Progress reporting.
//!
//! [`report`] is a pure aggregation over [`RunState`]; the runtime publishes
//! its result on a `tokio::sync::watch` channel after every state transition,
//! and callers obtain a receiver through
//! [`Scheduler::subscribe`](crate::scheduler::Scheduler::subscribe).

use crate::dag::{DagGraph, RunState};
use crate::task::TaskId;

/// Snapshot of a run's progress.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Progress {
    /// Share of tasks in a terminal state, 0-100.
    pub percent: u8,
    /// Display name of the most important task currently running.
    pub current_activity: Option<String>,
    /// Completed ids in submission order.
    pub completed_task_ids: Vec<TaskId>,
    /// Failed ids in submission order.
    pub failed_task_ids: Vec<TaskId>,
}

impl Progress {
    pub fn is_finished(&self) -> bool {
        self.percent == 100
    }
}

/// Aggregate the run state into a [`Progress`] snapshot.
pub fn report<T>(state: &RunState<T>, graph: &DagGraph) -> Progress {
    let total = state.total();
    let done = state.finished_count();

    let completed_task_ids = graph
        .tasks()
        .filter(|id| state.is_completed(id))
        .map(str::to_string)
        .collect();
    let failed_task_ids = graph
        .tasks()
        .filter(|id| state.is_failed(id))
        .map(str::to_string)
        .collect();

    Progress {
        percent: percent(done, total),
        current_activity: current_activity(state, graph),
        completed_task_ids,
        failed_task_ids,
    }
}

/// `round(100 * done / total)`, held at 99 until every task is done; an
/// empty run is complete.
pub fn percent(done: usize, total: usize) -> u8 {
    if total == 0 || done >= total {
        return 100;
    }
    let rounded = (done * 100 + total / 2) / total;
    rounded.min(99) as u8
}

/// Highest-priority running task, earliest submitted among equals.
fn current_activity<T>(state: &RunState<T>, graph: &DagGraph) -> Option<String> {
    let (id, attempt) = state.running().min_by_key(|(id, _)| {
        let priority = graph.info(id).map(|i| i.priority).unwrap_or_default();
        (priority, graph.index_of(id).unwrap_or(usize::MAX))
    })?;

    let info = graph.info(id)?;
    if attempt > 1 {
        Some(format!(
            "{} (retry {}/{})",
            info.display_name,
            attempt - 1,
            info.max_retries
        ))
    } else {
        Some(info.display_name.clone())
    }
}
