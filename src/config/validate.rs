// src/config/validate.rs

use std::collections::HashSet;
use std::time::Duration;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::duration::parse_duration;
use crate::config::model::{ConfigSection, PlanFile, PlannedTask, RawPlanFile, TaskConfig};
use crate::errors::{LoadgraphError, Result};
use crate::exec::BackoffPolicy;
use crate::task::TaskInfo;
use crate::types::SchedulerConfig;

impl TryFrom<RawPlanFile> for PlanFile {
    type Error = LoadgraphError;

    fn try_from(raw: RawPlanFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_plan(&raw)?;
        let scheduler = scheduler_config(&raw.config)?;
        let tasks = raw
            .task
            .iter()
            .map(planned_task)
            .collect::<Result<Vec<_>>>()?;
        Ok(PlanFile::new_unchecked(scheduler, tasks))
    }
}

fn validate_raw_plan(plan: &RawPlanFile) -> Result<()> {
    ensure_has_tasks(plan)?;
    validate_global_config(&plan.config)?;
    validate_task_ids(plan)?;
    validate_task_dependencies(plan)?;
    validate_dag(plan)?;
    Ok(())
}

fn ensure_has_tasks(plan: &RawPlanFile) -> Result<()> {
    if plan.task.is_empty() {
        return Err(LoadgraphError::ConfigError(
            "plan must contain at least one [[task]] entry".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &ConfigSection) -> Result<()> {
    if cfg.max_concurrency == 0 {
        return Err(LoadgraphError::ConfigError(
            "[config].max_concurrency must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_task_ids(plan: &RawPlanFile) -> Result<()> {
    let mut seen = HashSet::new();
    for task in &plan.task {
        if task.id.trim().is_empty() {
            return Err(LoadgraphError::ConfigError(
                "task id must not be empty".to_string(),
            ));
        }
        if !seen.insert(task.id.as_str()) {
            return Err(LoadgraphError::DuplicateTask(task.id.clone()));
        }
    }
    Ok(())
}

fn validate_task_dependencies(plan: &RawPlanFile) -> Result<()> {
    let ids: HashSet<&str> = plan.task.iter().map(|t| t.id.as_str()).collect();

    for task in &plan.task {
        for dep in &task.after {
            if dep == &task.id {
                return Err(LoadgraphError::ConfigError(format!(
                    "task '{}' cannot depend on itself in `after`",
                    task.id
                )));
            }
            if !ids.contains(dep.as_str()) {
                return Err(LoadgraphError::ConfigError(format!(
                    "task '{}' has unknown dependency '{}' in `after`",
                    task.id, dep
                )));
            }
        }
    }
    Ok(())
}

fn validate_dag(plan: &RawPlanFile) -> Result<()> {
    // Edge direction: dep -> task
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for task in &plan.task {
        graph.add_node(task.id.as_str());
    }

    for task in &plan.task {
        for dep in &task.after {
            graph.add_edge(dep.as_str(), task.id.as_str(), ());
        }
    }

    // A topological sort will fail if there is a cycle.
    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(LoadgraphError::DagCycle(format!(
            "cycle detected in task graph involving task '{}'",
            cycle.node_id()
        ))),
    }
}

fn scheduler_config(cfg: &ConfigSection) -> Result<SchedulerConfig> {
    let base = duration_field("[config].backoff_base", &cfg.backoff_base)?;
    let max_delay = duration_field("[config].backoff_cap", &cfg.backoff_cap)?;

    Ok(SchedulerConfig {
        max_concurrency: cfg.max_concurrency,
        enable_retries: cfg.enable_retries,
        backoff: BackoffPolicy {
            strategy: cfg.backoff,
            base,
            max_delay,
        },
    })
}

fn planned_task(task: &TaskConfig) -> Result<PlannedTask> {
    let timeout = duration_field(&format!("task '{}' timeout", task.id), &task.timeout)?;
    if timeout.is_zero() {
        return Err(LoadgraphError::ConfigError(format!(
            "task '{}' timeout must be greater than zero",
            task.id
        )));
    }
    let latency = duration_field(&format!("task '{}' latency", task.id), &task.latency)?;

    let mut dependencies: Vec<String> = Vec::new();
    for dep in &task.after {
        if !dependencies.contains(dep) {
            dependencies.push(dep.clone());
        }
    }

    Ok(PlannedTask {
        info: TaskInfo {
            id: task.id.clone(),
            display_name: task.name.clone().unwrap_or_else(|| task.id.clone()),
            priority: task.priority,
            timeout,
            max_retries: task.max_retries,
            dependencies,
            critical: task.critical,
        },
        latency,
        fail_times: task.fail_times,
    })
}

fn duration_field(what: &str, value: &str) -> Result<Duration> {
    parse_duration(value).map_err(|e| LoadgraphError::ConfigError(format!("{what}: {e}")))
}
