// src/config/mod.rs

//! Plan file configuration.
//!
//! - [`model`] holds the serde types for the TOML plan and the validated
//!   [`PlanFile`].
//! - [`validate`] turns a [`RawPlanFile`] into a [`PlanFile`].
//! - [`loader`] reads plans from disk.

pub mod duration;
pub mod loader;
pub mod model;
pub mod validate;

pub use duration::parse_duration;
pub use loader::{default_plan_path, load_and_validate, load_from_path, parse_str};
pub use model::{ConfigSection, PlanFile, PlannedTask, RawPlanFile, TaskConfig};
