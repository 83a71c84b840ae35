//! Error taxonomy for loading, validating, probing, planning and running.
//!
//! Integrity discrepancies are not errors; they are collected into an
//! [`IntegrityReport`](crate::integrity::IntegrityReport). Everything else
//! that stops an operation surfaces as one of the types below.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// A specification or configuration document could not be read or parsed.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("document not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unsupported document format '{extension}' for {}: expected .yaml, .yml or .json", path.display())]
    UnsupportedFormat { path: PathBuf, extension: String },

    #[error("malformed YAML in {origin}: {source}")]
    Yaml {
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("malformed JSON in {origin}: {source}")]
    Json {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("document root of {0} must be a mapping")]
    NotAMapping(String),
}

/// The first structural, referential or naming failure found in a spec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("meta.name '{value}' must not contain hyphens (-). Use underscores instead: '{suggestion}'")]
    InvalidName { value: String, suggestion: String },

    #[error("{entity} '{id}' is missing required field '{field}'")]
    MissingField {
        entity: &'static str,
        id: String,
        field: &'static str,
    },

    #[error("{entity} '{id}': invalid {field}: {reason}")]
    InvalidValue {
        entity: &'static str,
        id: String,
        field: String,
        reason: String,
    },

    #[error("duplicate {category} id '{id}'")]
    DuplicateId { category: &'static str, id: String },

    #[error("{owner} references unknown {category} '{id}' in {field}")]
    DanglingReference {
        owner: String,
        field: &'static str,
        category: &'static str,
        id: String,
    },

    #[error("datatype '{datatype}' is used as a contract type by transform '{transform}' but declares no example_refs or generator_refs")]
    MissingContractCoverage { datatype: String, transform: String },

    #[error("example '{example}' does not match datatype '{datatype}': {reason}")]
    ExampleShape {
        example: String,
        datatype: String,
        reason: String,
    },

    #[error("Circular dependency detected: {}", .path.join(" -> "))]
    Cycle { path: Vec<String> },

    #[error("stage '{stage}' expects input_type '{expected}' but the previous stage '{previous}' produces '{found}'")]
    TypeChain {
        stage: String,
        previous: String,
        expected: String,
        found: String,
    },
}

/// Loading a specification either fails to read it or rejects its content.
#[derive(Debug, Error)]
pub enum SpecError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// The implementation tree could not be inspected at all.
#[derive(Debug, Error)]
pub enum IntegrityProbeError {
    #[error("failed to read implementation source {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("implementation probe failed for '{locator}': {reason}")]
    Probe { locator: String, reason: String },
}

/// Every problem found while checking a configuration against its spec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", .problems.join("\n"))]
pub struct ConfigValidationError {
    pub problems: Vec<String>,
}

impl ConfigValidationError {
    pub fn new(problems: Vec<String>) -> Self {
        Self { problems }
    }
}

/// Failure while producing an execution plan.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("base spec rejected: {0}")]
    Spec(#[from] SpecError),

    #[error("invalid config: {0}")]
    Config(#[from] ConfigValidationError),

    #[error(transparent)]
    Probe(#[from] IntegrityProbeError),
}

/// A transform raised during execution.
#[derive(Debug, Error)]
#[error("Error executing transform '{transform_id}': {source}")]
pub struct ExecutionError {
    pub transform_id: String,
    #[source]
    pub source: anyhow::Error,
}

/// Running a configuration fails before execution (planning) or during it.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("unknown generator '{0}'")]
    UnknownGenerator(String),

    #[error("no callable registered for '{0}'")]
    Unregistered(String),
}
