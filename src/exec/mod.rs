// src/exec/mod.rs

//! Execution engine.
//!
//! - [`task_runner`] runs one admitted task: it races each attempt against
//!   the task timeout and retries failures with backoff until the budget is
//!   spent.
//! - [`backoff`] computes the delay between attempts.

pub mod backoff;
pub mod task_runner;

pub use backoff::BackoffPolicy;
pub use task_runner::{run_task, Attempt, AttemptOutcome, ExecSettings};
