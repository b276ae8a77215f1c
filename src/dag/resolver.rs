// src/dag/resolver.rs

//! Dependency resolution over a snapshot of [`RunState`].
//!
//! Everything here is a pure function of the graph and the state; the
//! controller applies the results.

use tracing::warn;

use crate::dag::{DagGraph, RunState};
use crate::task::TaskId;

/// Whether every dependency of `id` has completed successfully.
///
/// Unknown dependency ids are never satisfied.
pub fn deps_satisfied<T>(state: &RunState<T>, graph: &DagGraph, id: &str) -> bool {
    graph
        .dependencies_of(id)
        .iter()
        .all(|dep| state.is_completed(dep))
}

/// Pending tasks whose dependencies have all completed, in submission order.
pub fn eligible<T>(state: &RunState<T>, graph: &DagGraph) -> Vec<TaskId> {
    state
        .pending()
        .filter(|id| !state.is_running(id) && deps_satisfied(state, graph, id))
        .map(str::to_string)
        .collect()
}

/// Pending tasks that have a terminally failed dependency, paired with the
/// first such dependency.
///
/// Only direct dependencies are inspected; the controller re-applies this
/// until it returns nothing so failures reach every transitive dependent.
pub fn cascade_failures<T>(state: &RunState<T>, graph: &DagGraph) -> Vec<(TaskId, TaskId)> {
    state
        .pending()
        .filter_map(|id| {
            graph
                .dependencies_of(id)
                .iter()
                .find(|dep| state.is_failed(dep))
                .map(|dep| (id.to_string(), dep.clone()))
        })
        .collect()
}

/// Pending work exists, none of it is eligible, and nothing is running.
pub fn is_deadlocked<T>(state: &RunState<T>, graph: &DagGraph) -> bool {
    if state.pending_count() == 0 || state.running_count() > 0 {
        return false;
    }

    let stuck = eligible(state, graph).is_empty();
    if stuck {
        warn!(
            pending = state.pending_count(),
            "no eligible tasks and nothing running; dependency deadlock"
        );
    }
    stuck
}
