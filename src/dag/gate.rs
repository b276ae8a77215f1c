// src/dag/gate.rs

//! Concurrency gate: picks which eligible tasks start now.

use crate::dag::DagGraph;
use crate::task::TaskId;
use crate::types::Priority;

/// Order `eligible` by priority (High first, stable within a tier) and return
/// at most `limit - running` ids.
///
/// `eligible` is expected in submission order, which is what
/// [`crate::dag::resolver::eligible`] produces.
pub fn admit(eligible: &[TaskId], graph: &DagGraph, running: usize, limit: usize) -> Vec<TaskId> {
    let slots = limit.saturating_sub(running);
    if slots == 0 {
        return Vec::new();
    }

    let mut ordered: Vec<&TaskId> = eligible.iter().collect();
    // `sort_by_key` is stable, so submission order survives within a tier.
    ordered.sort_by_key(|id| priority_of(graph, id));

    ordered.into_iter().take(slots).cloned().collect()
}

fn priority_of(graph: &DagGraph, id: &str) -> Priority {
    graph
        .info(id)
        .map(|info| info.priority)
        .unwrap_or(Priority::Low)
}
