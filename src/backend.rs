// src/backend.rs

//! Simulated backend used by the `loadgraph` binary.
//!
//! Real callers hand the scheduler operations that query their backend. The
//! binary has no backend to talk to, so each planned task becomes an
//! operation that waits for its configured latency and fails its first
//! `fail_times` attempts.

use anyhow::bail;

use crate::config::PlannedTask;
use crate::task::{AttemptContext, Task, TaskBuilder};

/// Build the simulated operation for one planned task.
pub fn simulated_task(planned: &PlannedTask) -> Task<String> {
    let id = planned.info.id.clone();
    let latency = planned.latency;
    let fail_times = planned.fail_times;

    TaskBuilder::from_info(planned.info.clone()).build(move |ctx: AttemptContext| {
        let id = id.clone();
        async move {
            tokio::select! {
                _ = tokio::time::sleep(latency) => {}
                _ = ctx.cancel.cancelled() => bail!("request for '{id}' cancelled"),
            }

            if ctx.attempt <= fail_times {
                bail!("simulated backend error for '{id}' (attempt {})", ctx.attempt);
            }

            Ok(format!("{id} loaded on attempt {}", ctx.attempt))
        }
    })
}

/// Build simulated tasks for a whole plan, in plan order.
pub fn simulated_tasks<'a>(planned: impl IntoIterator<Item = &'a PlannedTask>) -> Vec<Task<String>> {
    planned.into_iter().map(simulated_task).collect()
}
