// src/lib.rs

pub mod backend;
pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod progress;
pub mod scheduler;
pub mod task;
pub mod types;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::load_and_validate;
use crate::config::PlanFile;
use crate::dag::DagGraph;
use crate::exec::ExecSettings;

pub use crate::engine::{RunResult, RunStatus};
pub use crate::errors::{LoadgraphError, RunError, TaskError};
pub use crate::progress::Progress;
pub use crate::scheduler::{Scheduler, SchedulerStatus};
pub use crate::task::{AttemptContext, Task, TaskBuilder, TaskId, TaskInfo};
pub use crate::types::{BackoffStrategy, Priority, SchedulerConfig};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - plan loading and CLI overrides
/// - the simulated backend operations
/// - the scheduler and its progress stream
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let plan_path = args.plan.clone();
    let plan = load_and_validate(&plan_path)
        .with_context(|| format!("loading plan '{}'", plan_path.display()))?;

    let mut config = plan.scheduler;
    if let Some(n) = args.max_concurrency {
        config.max_concurrency = n;
    }
    if args.no_retries {
        config.enable_retries = false;
    }

    if args.dry_run {
        print_dry_run(&plan, &config)?;
        return Ok(());
    }

    let scheduler = Arc::new(Scheduler::new(config)?);
    let tasks = backend::simulated_tasks(&plan.tasks);

    // Ctrl-C → cooperative cancellation.
    {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            scheduler.cancel();
        });
    }

    // Print progress as it changes.
    let mut progress_rx = scheduler.subscribe();
    let printer = tokio::spawn(async move {
        let mut last = Progress::default();
        while progress_rx.changed().await.is_ok() {
            let progress = progress_rx.borrow_and_update().clone();
            if progress.percent != last.percent || progress.current_activity != last.current_activity {
                print_progress(&progress);
            }
            last = progress;
        }
    });

    info!(plan = %plan_path.display(), tasks = plan.tasks.len(), "running plan");
    let result = scheduler.start(tasks).await?;
    printer.abort();

    print_summary(&plan, &result);

    match result.into_result() {
        Ok(_) => Ok(()),
        Err(err) => Err(err).context("run failed"),
    }
}

fn print_progress(progress: &Progress) {
    match &progress.current_activity {
        Some(activity) => println!("[{:>3}%] {activity}", progress.percent),
        None => println!("[{:>3}%]", progress.percent),
    }
}

fn print_summary(plan: &PlanFile, result: &RunResult<String>) {
    println!();
    println!("status: {:?}", result.status);
    println!("{}", result.summary());

    for planned in &plan.tasks {
        let id = &planned.info.id;
        if let Some(value) = result.completed.get(id) {
            println!("  ok     {id}: {value}");
        } else if let Some(err) = result.failed.get(id) {
            println!("  failed {id}: {err}");
        }
    }
}

/// Dry-run output: settings, tasks and a valid execution order.
fn print_dry_run(plan: &PlanFile, config: &SchedulerConfig) -> Result<()> {
    println!("loadgraph dry-run");
    println!("  config.max_concurrency = {}", config.max_concurrency);
    println!("  config.enable_retries = {}", config.enable_retries);
    println!(
        "  config.backoff = {:?} (base {:?}, cap {:?})",
        config.backoff.strategy, config.backoff.base, config.backoff.max_delay
    );
    println!();

    let settings = ExecSettings {
        enable_retries: config.enable_retries,
        backoff: config.backoff,
    };

    println!("tasks ({}):", plan.tasks.len());
    for task in backend::simulated_tasks(&plan.tasks) {
        let info = &task.info;
        println!("  - {} ({})", info.id, info.display_name);
        println!("      priority: {}", info.priority);
        println!("      timeout: {:?}", info.timeout);
        println!("      max_retries: {}", info.max_retries);
        if !info.dependencies.is_empty() {
            println!("      after: {:?}", info.dependencies);
        }
        if info.critical {
            println!("      critical: true");
        }
        println!(
            "      worst case: {:?}",
            exec::task_runner::worst_case_duration(&task, &settings)
        );
    }

    let graph = DagGraph::new(plan.tasks.iter().map(|t| t.info.clone()))?;
    match graph.topological_order() {
        Ok(order) => println!("\norder: {}", order.join(" -> ")),
        Err(task) => println!("\norder: unavailable (cycle through '{task}')"),
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}
