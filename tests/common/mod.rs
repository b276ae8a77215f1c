#![allow(dead_code)]

use std::time::Duration;

pub use loadgraph_test_utils::{builders, fake_ops, init_tracing, with_timeout};

use loadgraph::exec::BackoffPolicy;
use loadgraph::SchedulerConfig;

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

pub fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

/// Scheduler settings with a 100ms exponential backoff, so retry tests stay
/// short even with paused time.
pub fn config(max_concurrency: usize) -> SchedulerConfig {
    SchedulerConfig {
        max_concurrency,
        enable_retries: true,
        backoff: BackoffPolicy::exponential(ms(100), Duration::from_secs(5)),
    }
}
