#![allow(dead_code)]

use loadgraph::config::{ConfigSection, PlanFile, RawPlanFile, TaskConfig};
use loadgraph::errors::Result;
use loadgraph::types::BackoffStrategy;

/// Builder for `PlanFile` to simplify test setup.
///
/// Tasks keep the order they are added in, like `[[task]]` entries in a
/// plan file.
pub struct PlanBuilder {
    plan: RawPlanFile,
}

impl PlanBuilder {
    pub fn new() -> Self {
        Self {
            plan: RawPlanFile {
                config: ConfigSection::default(),
                task: Vec::new(),
            },
        }
    }

    pub fn with_task(mut self, task: TaskConfig) -> Self {
        self.plan.task.push(task);
        self
    }

    pub fn max_concurrency(mut self, n: usize) -> Self {
        self.plan.config.max_concurrency = n;
        self
    }

    pub fn enable_retries(mut self, val: bool) -> Self {
        self.plan.config.enable_retries = val;
        self
    }

    pub fn backoff(mut self, strategy: BackoffStrategy, base: &str, cap: &str) -> Self {
        self.plan.config.backoff = strategy;
        self.plan.config.backoff_base = base.to_string();
        self.plan.config.backoff_cap = cap.to_string();
        self
    }

    /// The unvalidated plan, for tests that exercise validation itself.
    pub fn raw(self) -> RawPlanFile {
        self.plan
    }

    pub fn try_build(self) -> Result<PlanFile> {
        PlanFile::try_from(self.plan)
    }

    pub fn build(self) -> PlanFile {
        self.try_build()
            .expect("Failed to build valid plan from builder")
    }
}

impl Default for PlanBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for a `[[task]]` entry.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            task: TaskConfig {
                id: id.to_string(),
                name: None,
                priority: Default::default(),
                timeout: "30s".to_string(),
                max_retries: 0,
                after: vec![],
                critical: false,
                latency: "100ms".to_string(),
                fail_times: 0,
            },
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.task.name = Some(name.to_string());
        self
    }

    pub fn priority(mut self, priority: loadgraph::Priority) -> Self {
        self.task.priority = priority;
        self
    }

    pub fn timeout(mut self, timeout: &str) -> Self {
        self.task.timeout = timeout.to_string();
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.task.max_retries = n;
        self
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn critical(mut self, val: bool) -> Self {
        self.task.critical = val;
        self
    }

    pub fn latency(mut self, latency: &str) -> Self {
        self.task.latency = latency.to_string();
        self
    }

    pub fn fail_times(mut self, n: u32) -> Self {
        self.task.fail_times = n;
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}
