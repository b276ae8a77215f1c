// src/dag/mod.rs

//! Dependency graph and the pure scheduling decisions made over it.
//!
//! - [`graph`] holds the adjacency map for one run and the submission-time
//!   cycle / unknown-dependency analysis.
//! - [`state`] is the per-run [`RunState`] owned by the controller.
//! - [`resolver`] decides which pending tasks are eligible and which must be
//!   cascade-failed.
//! - [`gate`] applies priority ordering and the concurrency limit.

pub mod gate;
pub mod graph;
pub mod resolver;
pub mod state;

pub use graph::DagGraph;
pub use state::{RunState, TaskPhase};
