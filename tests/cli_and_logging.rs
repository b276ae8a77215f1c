// tests/cli_and_logging.rs

mod common;
use crate::common::{init_tracing, TestResult};

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use tempfile::tempdir;

use loadgraph::cli::{CliArgs, LogLevel};
use loadgraph::config::default_plan_path;
use loadgraph::logging::build_filter;

fn args(plan: &str) -> CliArgs {
    CliArgs::try_parse_from(["loadgraph", "--plan", plan]).expect("valid args")
}

#[test]
fn cli_defaults() -> TestResult {
    let args = CliArgs::try_parse_from(["loadgraph"])?;

    assert_eq!(args.plan, default_plan_path());
    assert_eq!(args.plan, PathBuf::from("Loadgraph.toml"));
    assert_eq!(args.max_concurrency, None);
    assert!(!args.no_retries);
    assert!(!args.dry_run);
    assert!(args.log_level.is_none());
    Ok(())
}

#[test]
fn cli_overrides() -> TestResult {
    let args = CliArgs::try_parse_from([
        "loadgraph",
        "--plan",
        "demos/dashboard.toml",
        "--max-concurrency",
        "2",
        "--no-retries",
        "--log-level",
        "debug",
        "--dry-run",
    ])?;

    assert_eq!(args.plan, PathBuf::from("demos/dashboard.toml"));
    assert_eq!(args.max_concurrency, Some(2));
    assert!(args.no_retries);
    assert!(args.dry_run);
    assert!(matches!(args.log_level, Some(LogLevel::Debug)));
    Ok(())
}

#[test]
fn cli_rejects_unknown_log_level() {
    assert!(CliArgs::try_parse_from(["loadgraph", "--log-level", "loud"]).is_err());
}

#[test]
fn log_filter_prefers_the_flag() -> TestResult {
    let filter = build_filter(Some(LogLevel::Warn), Some("trace"))?;
    assert!(filter.to_string().contains("warn"));
    assert!(!filter.to_string().contains("trace"));

    let filter = build_filter(None, Some("warn,loadgraph::engine=debug"))?;
    assert!(filter.to_string().contains("loadgraph::engine=debug"));

    let filter = build_filter(None, Some("   "))?;
    assert!(filter.to_string().contains("info"));

    let filter = build_filter(None, None)?;
    assert!(filter.to_string().contains("info"));
    Ok(())
}

#[test]
fn log_filter_rejects_bad_directives() {
    let err = build_filter(None, Some("loadgraph=loud")).unwrap_err();
    assert!(err.to_string().contains("LOADGRAPH_LOG"));
}

#[tokio::test(start_paused = true)]
async fn dry_run_does_not_execute() -> TestResult {
    init_tracing();
    let plan = concat!(env!("CARGO_MANIFEST_DIR"), "/demos/dashboard.toml");
    let mut args = args(plan);
    args.dry_run = true;

    loadgraph::run(args).await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn run_succeeds_when_only_optional_tasks_fail() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let path = dir.path().join("Loadgraph.toml");
    fs::write(
        &path,
        r#"
[config]
max_concurrency = 2
backoff_base = "10ms"

[[task]]
id = "session"
critical = true
latency = "20ms"

[[task]]
id = "sales"
after = ["session"]
max_retries = 1
fail_times = 1

[[task]]
id = "alerts"
after = ["session"]
fail_times = 1
"#,
    )?;

    loadgraph::run(args(path.to_str().expect("utf-8 path"))).await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn run_fails_on_critical_failure() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let path = dir.path().join("Loadgraph.toml");
    fs::write(
        &path,
        r#"
[[task]]
id = "session"
critical = true
fail_times = 5

[[task]]
id = "products"
after = ["session"]
"#,
    )?;

    let err = loadgraph::run(args(path.to_str().expect("utf-8 path")))
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("critical task(s) failed: session"));
    Ok(())
}

#[tokio::test]
async fn run_reports_invalid_plans() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("Loadgraph.toml");
    fs::write(&path, "[[task]]\nid = \"a\"\nafter = [\"a\"]\n").expect("write plan");

    let err = loadgraph::run(args(path.to_str().expect("utf-8 path")))
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("loading plan"));
}
