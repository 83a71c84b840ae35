//! End-to-end tests for specloom
//!
//! Each test builds a throwaway project (spec, config and an `apps/` source
//! tree) in a temporary directory and drives the library or the binary
//! against it.

pub mod cli;
pub mod fixtures;
pub mod helpers;
pub mod integrity;
pub mod planning;

pub use fixtures::*;
pub use helpers::*;
