// tests/cancel_and_reset.rs

mod common;
use crate::common::fake_ops::Recorder;
use crate::common::{config, init_tracing, ms, with_timeout, TestResult};

use std::sync::Arc;

use loadgraph::{
    LoadgraphError, Progress, RunStatus, Scheduler, SchedulerStatus, Task, TaskError,
};

/// Start `tasks` on a background task so the test can poke the scheduler
/// while the run is in flight.
fn spawn_run(
    scheduler: &Arc<Scheduler>,
    tasks: Vec<Task<String>>,
) -> tokio::task::JoinHandle<loadgraph::errors::Result<loadgraph::RunResult<String>>> {
    let scheduler = Arc::clone(scheduler);
    tokio::spawn(async move { scheduler.start(tasks).await })
}

#[tokio::test(start_paused = true)]
async fn cancel_stops_admission_and_drains_running_tasks() -> TestResult {
    init_tracing();
    let rec = Recorder::new();
    let scheduler = Arc::new(Scheduler::new(config(1))?);

    let tasks = vec![
        rec.succeed(Task::builder("profile"), ms(200)),
        rec.succeed(Task::builder("sales"), ms(10)),
        rec.succeed(Task::builder("alerts").after("profile"), ms(10)),
    ];
    let handle = spawn_run(&scheduler, tasks);

    tokio::time::sleep(ms(50)).await;
    assert_eq!(scheduler.status(), SchedulerStatus::Running);
    scheduler.cancel();

    let result = with_timeout(handle).await??;

    assert_eq!(result.status, RunStatus::Cancelled);
    // The in-flight task was allowed to finish.
    assert_eq!(result.completed["profile"], "profile@1");
    assert_eq!(result.failed["sales"], TaskError::Cancelled);
    assert_eq!(result.failed["alerts"], TaskError::Cancelled);
    assert!(!rec.was_invoked("sales"));
    assert!(!rec.was_invoked("alerts"));
    assert!(result.error.is_none());
    assert_eq!(
        scheduler.status(),
        SchedulerStatus::Finished(RunStatus::Cancelled)
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn cancel_is_idempotent() -> TestResult {
    init_tracing();
    let rec = Recorder::new();
    let scheduler = Arc::new(Scheduler::new(config(1))?);

    let tasks = vec![
        rec.hang_until_cancelled(Task::builder("sales").max_retries(3)),
        rec.succeed(Task::builder("licenses"), ms(10)),
    ];
    let handle = spawn_run(&scheduler, tasks);

    tokio::time::sleep(ms(20)).await;
    scheduler.cancel();
    scheduler.cancel();
    scheduler.cancel();

    let result = with_timeout(handle).await??;

    assert_eq!(result.status, RunStatus::Cancelled);
    // The operation observed the token and bailed; no retry follows a cancel.
    assert_eq!(rec.calls("sales"), 1);
    assert!(matches!(
        result.failed["sales"],
        TaskError::Failed { attempts: 1, .. }
    ));
    assert_eq!(result.failed["licenses"], TaskError::Cancelled);
    assert!(!rec.was_invoked("licenses"));

    // Still a no-op once the run is over.
    scheduler.cancel();
    assert_eq!(
        scheduler.status(),
        SchedulerStatus::Finished(RunStatus::Cancelled)
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn cancel_cuts_backoff_short() -> TestResult {
    init_tracing();
    let rec = Recorder::new();
    let scheduler = Arc::new(Scheduler::new(config(1))?);

    // Fails at 10ms, then waits 100ms before the second attempt.
    let tasks = vec![rec.always_fail(Task::builder("employees").max_retries(5), ms(10))];
    let handle = spawn_run(&scheduler, tasks);

    tokio::time::sleep(ms(50)).await;
    scheduler.cancel();

    let result = with_timeout(handle).await??;

    assert_eq!(result.status, RunStatus::Cancelled);
    assert_eq!(rec.calls("employees"), 1);
    assert!(matches!(
        result.failed["employees"],
        TaskError::Failed { attempts: 1, .. }
    ));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn failures_after_cancel_do_not_count_as_critical() -> TestResult {
    init_tracing();
    let rec = Recorder::new();
    let scheduler = Arc::new(Scheduler::new(config(1))?);

    let tasks = vec![rec.hang_until_cancelled(Task::builder("session").critical(true))];
    let handle = spawn_run(&scheduler, tasks);

    tokio::time::sleep(ms(10)).await;
    scheduler.cancel();

    let result = with_timeout(handle).await??;

    assert_eq!(result.status, RunStatus::Cancelled);
    assert!(result.error.is_none());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn cancel_while_idle_is_ignored() -> TestResult {
    init_tracing();
    let rec = Recorder::new();
    let scheduler = Scheduler::new(config(2))?;

    scheduler.cancel();
    assert_eq!(scheduler.status(), SchedulerStatus::Idle);

    let result = with_timeout(scheduler.start(vec![rec.succeed(Task::builder("A"), ms(10))])).await?;
    assert_eq!(result.status, RunStatus::Completed);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn start_requires_an_idle_scheduler() -> TestResult {
    init_tracing();
    let rec = Recorder::new();
    let scheduler = Arc::new(Scheduler::new(config(2))?);

    let handle = spawn_run(&scheduler, vec![rec.succeed(Task::builder("A"), ms(100))]);
    tokio::time::sleep(ms(10)).await;

    // Second start while the first is running.
    let err = scheduler
        .start(vec![rec.succeed(Task::builder("B"), ms(10))])
        .await
        .unwrap_err();
    assert!(matches!(err, LoadgraphError::NotIdle));

    // Reset is refused mid-run.
    assert!(matches!(
        scheduler.reset(),
        Err(LoadgraphError::RunInProgress)
    ));

    with_timeout(handle).await??;

    // Finished but not reset.
    let err = scheduler
        .start(vec![rec.succeed(Task::builder("B"), ms(10))])
        .await
        .unwrap_err();
    assert!(matches!(err, LoadgraphError::NotIdle));
    assert!(!rec.was_invoked("B"));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn reset_allows_a_fresh_run() -> TestResult {
    init_tracing();
    let rec = Recorder::new();
    let scheduler = Arc::new(Scheduler::new(config(2))?);

    let handle = spawn_run(
        &scheduler,
        vec![rec.hang_until_cancelled(Task::builder("first"))],
    );
    tokio::time::sleep(ms(10)).await;
    scheduler.cancel();
    let first = with_timeout(handle).await??;
    assert_eq!(first.status, RunStatus::Cancelled);
    assert_eq!(scheduler.progress().percent, 100);

    scheduler.reset()?;
    assert_eq!(scheduler.status(), SchedulerStatus::Idle);
    assert_eq!(scheduler.progress(), Progress::default());

    // The cancellation of the first run does not leak into the second.
    let second = with_timeout(scheduler.start(vec![
        rec.succeed(Task::builder("second"), ms(10)),
    ]))
    .await?;
    assert_eq!(second.status, RunStatus::Completed);
    assert_eq!(second.completed["second"], "second@1");
    assert!(second.failed.is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn dropping_the_run_marks_it_cancelled() -> TestResult {
    init_tracing();
    let rec = Recorder::new();
    let scheduler = Arc::new(Scheduler::new(config(2))?);

    let handle = spawn_run(&scheduler, vec![rec.hang(Task::builder("stuck"))]);
    tokio::time::sleep(ms(10)).await;
    handle.abort();
    let _ = handle.await;

    assert_eq!(
        scheduler.status(),
        SchedulerStatus::Finished(RunStatus::Cancelled)
    );
    scheduler.reset()?;
    assert_eq!(scheduler.status(), SchedulerStatus::Idle);
    Ok(())
}
