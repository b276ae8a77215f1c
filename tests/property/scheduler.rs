use std::collections::HashSet;
use std::time::Duration;

use proptest::prelude::*;

use loadgraph::dag::DagGraph;
use loadgraph::engine::{CoreCommand, CoreRun, CoreStep, RunEvent};
use loadgraph::{Priority, RunStatus, TaskError, TaskInfo};

fn task_id(i: usize) -> String {
    format!("task_{i}")
}

fn priority_from(n: u8) -> Priority {
    match n % 3 {
        0 => Priority::High,
        1 => Priority::Medium,
        _ => Priority::Low,
    }
}

/// Raw material for one simulated run.
#[derive(Debug, Clone)]
struct Scenario {
    infos: Vec<TaskInfo>,
    failing: HashSet<String>,
    limit: usize,
    /// Which running task finishes next, taken modulo the running count.
    picks: Vec<usize>,
}

// Strategy to generate an acyclic task set.
// Task N may only depend on tasks 0..N-1.
fn acyclic_scenario(max_tasks: usize) -> impl Strategy<Value = Scenario> {
    (1..=max_tasks).prop_flat_map(|n| {
        (
            proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..3), n),
            proptest::collection::vec(any::<u8>(), n),
            proptest::collection::vec(any::<bool>(), n),
            1..=4usize,
            proptest::collection::vec(any::<usize>(), 1..16),
        )
            .prop_map(move |(raw_deps, priorities, fails, limit, picks)| {
                let mut infos = Vec::with_capacity(n);
                let mut failing = HashSet::new();

                for i in 0..n {
                    // Sanitize: only allow deps < i.
                    let mut deps: Vec<String> = Vec::new();
                    if i > 0 {
                        for d in &raw_deps[i] {
                            let dep = task_id(d % i);
                            if !deps.contains(&dep) {
                                deps.push(dep);
                            }
                        }
                    }
                    if fails[i] {
                        failing.insert(task_id(i));
                    }
                    infos.push(info(i, deps, priority_from(priorities[i])));
                }

                Scenario {
                    infos,
                    failing,
                    limit,
                    picks,
                }
            })
    })
}

// Arbitrary edges: cycles, self-loops and dangling ids are all possible.
fn arbitrary_graph(max_tasks: usize) -> impl Strategy<Value = Vec<TaskInfo>> {
    (1..=max_tasks).prop_flat_map(|n| {
        proptest::collection::vec(proptest::collection::vec(0..n + 1, 0..3), n).prop_map(
            move |raw_deps| {
                raw_deps
                    .into_iter()
                    .enumerate()
                    .map(|(i, deps)| {
                        let mut unique: Vec<String> = Vec::new();
                        for d in deps {
                            // Index n is never a task: a dangling reference.
                            let dep = task_id(d);
                            if !unique.contains(&dep) {
                                unique.push(dep);
                            }
                        }
                        info(i, unique, Priority::Medium)
                    })
                    .collect()
            },
        )
    })
}

fn info(i: usize, dependencies: Vec<String>, priority: Priority) -> TaskInfo {
    TaskInfo {
        id: task_id(i),
        display_name: format!("Task {i}"),
        priority,
        timeout: Duration::from_secs(1),
        max_retries: 0,
        dependencies,
        critical: false,
    }
}

fn dispatched(step: &CoreStep) -> Vec<String> {
    step.commands
        .iter()
        .flat_map(|cmd| match cmd {
            CoreCommand::Dispatch(ids) => ids.clone(),
            CoreCommand::AbortInFlight => Vec::new(),
        })
        .collect()
}

proptest! {
    #[test]
    fn acyclic_runs_respect_dependencies_and_limits(scenario in acyclic_scenario(12)) {
        let Scenario { infos, failing, limit, picks } = scenario;
        let total = infos.len();
        let graph = DagGraph::new(infos).expect("unique ids");
        let mut core: CoreRun<usize> = CoreRun::new(graph.clone(), limit);

        let mut running: Vec<String> = Vec::new();
        let mut ever_dispatched: HashSet<String> = HashSet::new();
        let mut last_percent = 0u8;
        let mut picks = picks.into_iter().cycle();
        let mut steps = 0;

        let mut step = core.begin();
        loop {
            for id in dispatched(&step) {
                for dep in graph.dependencies_of(&id) {
                    prop_assert!(
                        core.state().is_completed(dep),
                        "{} dispatched before dependency {} completed", id, dep
                    );
                }
                prop_assert!(ever_dispatched.insert(id.clone()), "{} dispatched twice", id);
                running.push(id);
            }

            prop_assert!(core.state().running_count() <= limit);
            prop_assert_eq!(core.state().running_count(), running.len());
            prop_assert!(step.progress.percent >= last_percent, "progress went backwards");
            last_percent = step.progress.percent;

            if step.finished.is_some() {
                break;
            }

            prop_assert!(!running.is_empty(), "run stalled with nothing in flight");
            steps += 1;
            prop_assert!(steps <= total, "more completions than tasks");

            let idx = picks.next().unwrap_or(0) % running.len();
            let id = running.remove(idx);
            let outcome = if failing.contains(&id) {
                Err(TaskError::Failed { attempts: 1, message: "injected".to_string() })
            } else {
                Ok(graph.index_of(&id).unwrap_or_default())
            };
            step = core.step(RunEvent::TaskFinished { task: id, outcome });
        }

        prop_assert_eq!(step.progress.percent, 100);
        let result = core.into_result().expect("finished");
        prop_assert_eq!(result.status, RunStatus::Completed);
        prop_assert!(result.error.is_none());
        prop_assert_eq!(result.completed.len() + result.failed.len(), total);

        for id in graph.tasks() {
            let done = result.completed.contains_key(id);
            let failed = result.failed.get(id);
            prop_assert!(done != failed.is_some(), "{} must be in exactly one outcome set", id);

            if failing.contains(id) && ever_dispatched.contains(id) {
                prop_assert!(
                    matches!(failed, Some(TaskError::Failed { .. })),
                    "{} should fail with its own error",
                    id
                );
            }
            if done {
                prop_assert!(!failing.contains(id));
            }
            if !ever_dispatched.contains(id) {
                let is_upstream =
                    matches!(failed, Some(TaskError::UpstreamDependencyFailed { .. }));
                prop_assert!(is_upstream, "{} never ran but is not an upstream failure", id);
            }
        }
    }

    #[test]
    fn every_graph_terminates(infos in arbitrary_graph(10), limit in 1..=3usize) {
        let total = infos.len();
        let graph = DagGraph::new(infos).expect("unique ids");
        let stuck: HashSet<String> = graph.unsatisfiable().into_iter().collect();
        let mut core: CoreRun<()> = CoreRun::new(graph.clone(), limit);

        let mut running: Vec<String> = Vec::new();
        let mut steps = 0;
        let mut step = core.begin();

        while step.finished.is_none() {
            for id in dispatched(&step) {
                prop_assert!(!stuck.contains(&id), "unsatisfiable task {} was dispatched", id);
                running.push(id);
            }
            prop_assert!(!running.is_empty(), "run stalled with nothing in flight");
            steps += 1;
            prop_assert!(steps <= total);

            let id = running.remove(0);
            step = core.step(RunEvent::TaskFinished { task: id, outcome: Ok(()) });
        }

        let result = core.into_result().expect("finished");
        prop_assert_eq!(result.completed.len() + result.failed.len(), total);

        if stuck.is_empty() {
            prop_assert_eq!(result.status, RunStatus::Completed);
            prop_assert_eq!(result.completed.len(), total);
        } else {
            prop_assert_eq!(result.status, RunStatus::Deadlocked);
            for id in &stuck {
                prop_assert_eq!(result.failed.get(id), Some(&TaskError::Deadlock));
            }
        }
    }
}
