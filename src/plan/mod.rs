//! Config validation, execution planning and in-process execution
//!
//! This module handles:
//! - Loading configuration documents and their base spec
//! - Selecting stage candidates and merging argument overrides
//! - Running the resulting plan against registered implementations

pub mod config;
pub mod planner;
pub mod registry;
pub mod runner;

pub use config::{load_config, Config};
pub use planner::{validate, ConfigPlanner, PlanStep, PlanValidation};
pub use registry::{NativeRegistry, Signature};
pub use runner::{PlanRunner, RunEvent, RunStatus};
