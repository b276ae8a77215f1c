// src/config/model.rs

use std::time::Duration;

use serde::Deserialize;

use crate::task::TaskInfo;
use crate::types::{BackoffStrategy, Priority, SchedulerConfig};

/// Plan file as read from TOML, before validation.
///
/// ```toml
/// [config]
/// max_concurrency = 3
/// enable_retries = true
/// backoff = "exponential"
/// backoff_base = "500ms"
///
/// [[task]]
/// id = "profile"
/// name = "Loading profile"
/// priority = "high"
/// critical = true
///
/// [[task]]
/// id = "sales"
/// after = ["profile"]
/// max_retries = 2
/// timeout = "5s"
/// ```
///
/// Tasks are an array of tables so the file order is the submission order.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPlanFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub task: Vec<TaskConfig>,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    #[serde(default = "default_enable_retries")]
    pub enable_retries: bool,

    /// `"exponential"` (default) or `"linear"`.
    #[serde(default)]
    pub backoff: BackoffStrategy,

    /// Delay after the first failure, e.g. `"1s"`.
    #[serde(default = "default_backoff_base")]
    pub backoff_base: String,

    /// Cap on any single backoff delay.
    #[serde(default = "default_backoff_cap")]
    pub backoff_cap: String,
}

fn default_max_concurrency() -> usize {
    4
}

fn default_enable_retries() -> bool {
    true
}

fn default_backoff_base() -> String {
    "1s".to_string()
}

fn default_backoff_cap() -> String {
    "30s".to_string()
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            enable_retries: default_enable_retries(),
            backoff: BackoffStrategy::default(),
            backoff_base: default_backoff_base(),
            backoff_cap: default_backoff_cap(),
        }
    }
}

/// `[[task]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    pub id: String,

    /// Display name; defaults to the id.
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub priority: Priority,

    /// Per-attempt timeout, e.g. `"5s"`.
    #[serde(default = "default_timeout")]
    pub timeout: String,

    #[serde(default)]
    pub max_retries: u32,

    /// Ids this task waits for.
    #[serde(default)]
    pub after: Vec<String>,

    #[serde(default)]
    pub critical: bool,

    /// Simulated backend latency per attempt.
    #[serde(default = "default_latency")]
    pub latency: String,

    /// Number of leading attempts the simulated backend fails.
    #[serde(default)]
    pub fail_times: u32,
}

fn default_timeout() -> String {
    "30s".to_string()
}

fn default_latency() -> String {
    "100ms".to_string()
}

/// A validated plan file.
///
/// Only constructible through `TryFrom<RawPlanFile>`, which guarantees:
/// - at least one task, unique ids
/// - every `after` id exists, no self-dependencies, no cycles
/// - all duration strings parse
#[derive(Debug, Clone)]
pub struct PlanFile {
    pub scheduler: SchedulerConfig,
    /// Tasks in file order.
    pub tasks: Vec<PlannedTask>,
}

/// One validated task plus its simulated backend behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTask {
    pub info: TaskInfo,
    pub latency: Duration,
    pub fail_times: u32,
}

impl PlanFile {
    pub(crate) fn new_unchecked(scheduler: SchedulerConfig, tasks: Vec<PlannedTask>) -> Self {
        Self { scheduler, tasks }
    }

    pub fn task(&self, id: &str) -> Option<&PlannedTask> {
        self.tasks.iter().find(|t| t.info.id == id)
    }
}
