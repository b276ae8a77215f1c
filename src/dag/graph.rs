// src/dag/graph.rs

use std::collections::{HashMap, HashSet};

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graphmap::DiGraphMap;

use crate::errors::{LoadgraphError, Result};
use crate::task::{TaskId, TaskInfo};

/// Internal node structure: static task info plus immediate dependents.
#[derive(Debug, Clone)]
struct DagNode {
    info: TaskInfo,
    /// Position in the submitted task list.
    index: usize,
    /// Direct dependents: tasks that list this one in their dependencies.
    dependents: Vec<TaskId>,
}

/// In-memory dependency graph for one run, keyed by task id.
///
/// Unlike a validated config, a submitted task set may reference unknown
/// ids or contain cycles. The graph keeps such edges as-is so that
/// [`DagGraph::unsatisfiable`] can report them instead of failing
/// construction.
#[derive(Debug, Clone)]
pub struct DagGraph {
    nodes: HashMap<TaskId, DagNode>,
    /// Task ids in submission order.
    order: Vec<TaskId>,
}

impl DagGraph {
    /// Build the graph from task descriptors, preserving submission order.
    ///
    /// Fails only on duplicate ids.
    pub fn new(tasks: impl IntoIterator<Item = TaskInfo>) -> Result<Self> {
        let mut nodes: HashMap<TaskId, DagNode> = HashMap::new();
        let mut order = Vec::new();

        // First pass: create nodes.
        for info in tasks {
            if nodes.contains_key(&info.id) {
                return Err(LoadgraphError::DuplicateTask(info.id));
            }
            order.push(info.id.clone());
            nodes.insert(
                info.id.clone(),
                DagNode {
                    index: order.len() - 1,
                    info,
                    dependents: Vec::new(),
                },
            );
        }

        // Second pass: populate dependents, in submission order of the
        // dependent so traversals are deterministic.
        for id in &order {
            let deps = nodes
                .get(id)
                .map(|n| n.info.dependencies.clone())
                .unwrap_or_default();

            for dep in deps {
                if let Some(dep_node) = nodes.get_mut(&dep) {
                    dep_node.dependents.push(id.clone());
                }
            }
        }

        Ok(Self { nodes, order })
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Task ids in submission order.
    pub fn tasks(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    pub fn info(&self, id: &str) -> Option<&TaskInfo> {
        self.nodes.get(id).map(|n| &n.info)
    }

    /// Submission index of a task.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.nodes.get(id).map(|n| n.index)
    }

    /// Immediate dependencies of a task.
    pub fn dependencies_of(&self, id: &str) -> &[TaskId] {
        self.nodes
            .get(id)
            .map(|n| n.info.dependencies.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a task.
    pub fn dependents_of(&self, id: &str) -> &[TaskId] {
        self.nodes
            .get(id)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// Tasks that can never become eligible, in submission order.
    ///
    /// A task is unsatisfiable if it sits on a dependency cycle, depends on an
    /// id that is not part of the task set, or depends (transitively) on such
    /// a task.
    pub fn unsatisfiable(&self) -> Vec<TaskId> {
        let graph = self.petgraph();
        let mut roots: Vec<&str> = Vec::new();

        for component in tarjan_scc(&graph) {
            if component.len() > 1 {
                roots.extend(component);
            } else if let Some(&node) = component.first() {
                if graph.contains_edge(node, node) {
                    roots.push(node);
                }
            }
        }

        for id in &self.order {
            if self
                .dependencies_of(id)
                .iter()
                .any(|dep| !self.nodes.contains_key(dep))
            {
                roots.push(id.as_str());
            }
        }

        let mut blocked: HashSet<&str> = HashSet::new();
        let mut stack = roots;
        while let Some(id) = stack.pop() {
            if !blocked.insert(id) {
                continue;
            }
            stack.extend(self.dependents_of(id).iter().map(|s| s.as_str()));
        }

        self.order
            .iter()
            .filter(|id| blocked.contains(id.as_str()))
            .cloned()
            .collect()
    }

    /// A dependency-respecting execution order.
    ///
    /// Returns the id of a task on a cycle if no such order exists. Unknown
    /// dependency ids are ignored.
    pub fn topological_order(&self) -> std::result::Result<Vec<TaskId>, TaskId> {
        let graph = self.petgraph();
        toposort(&graph, None)
            .map(|nodes| nodes.into_iter().map(str::to_string).collect())
            .map_err(|cycle| cycle.node_id().to_string())
    }

    /// Edge direction: dependency -> dependent.
    fn petgraph(&self) -> DiGraphMap<&str, ()> {
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

        for id in &self.order {
            graph.add_node(id.as_str());
        }

        for id in &self.order {
            for dep in self.dependencies_of(id) {
                if self.nodes.contains_key(dep) {
                    graph.add_edge(dep.as_str(), id.as_str(), ());
                }
            }
        }

        graph
    }
}
