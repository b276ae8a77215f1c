use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::exec::BackoffPolicy;

/// Priority class of a task.
///
/// Only used to order eligible tasks competing for a free slot. Variants are
/// declared from most to least urgent, so the derived `Ord` sorts `High`
/// first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        };
        f.write_str(s)
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            other => Err(format!(
                "invalid priority: {other} (expected \"high\", \"medium\" or \"low\")"
            )),
        }
    }
}

/// How the retry delay grows with the attempt number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    /// `base * 2^(attempt - 1)`.
    Exponential,
    /// `base * attempt`.
    Linear,
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        BackoffStrategy::Exponential
    }
}

impl FromStr for BackoffStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "exponential" => Ok(BackoffStrategy::Exponential),
            "linear" => Ok(BackoffStrategy::Linear),
            other => Err(format!(
                "invalid backoff: {other} (expected \"exponential\" or \"linear\")"
            )),
        }
    }
}

/// Per-scheduler settings shared by every run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Upper bound on tasks in flight at once. Must be at least 1.
    pub max_concurrency: usize,
    /// When false, every task gets exactly one attempt regardless of its
    /// `max_retries`.
    pub enable_retries: bool,
    pub backoff: BackoffPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            enable_retries: true,
            backoff: BackoffPolicy::default(),
        }
    }
}
