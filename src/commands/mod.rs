//! Command handlers for the `specloom` binary.
//!
//! Each handler prints its outcome to stdout and returns whether the command
//! succeeded; the binary maps `false` to exit code 1.

pub mod integrity;
pub mod plan;
pub mod validate;
pub mod version;
