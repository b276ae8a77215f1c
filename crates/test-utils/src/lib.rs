//! Shared helpers for the `loadgraph` integration tests.
//!
//! - [`builders`]: plan-file builders for config tests.
//! - [`fake_ops`]: instrumented task operations that record what ran.

pub mod builders;
pub mod fake_ops;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Install a test-friendly tracing subscriber once per test binary.
///
/// Output goes through the test writer, so it only shows up for failing
/// tests (or with `-- --nocapture`). Scheduler logs are on at `info`; raise
/// them with e.g. `RUST_LOG=loadgraph=debug cargo test`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("warn,loadgraph=info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Await `f`, failing the test if it takes longer than a minute.
///
/// Under paused tokio time this only trips on a genuine hang: sleeps inside
/// the run auto-advance long before the bound is reached.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    tokio::time::timeout(Duration::from_secs(60), f)
        .await
        .expect("test run did not finish within 60s")
}
