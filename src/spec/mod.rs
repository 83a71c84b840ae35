//! Specification loading: document → IR → validation

pub mod builder;
pub mod document;
pub mod graph;
pub mod ir;
pub mod locator;
pub mod raw;
pub mod shape;
pub mod validate;

use std::path::Path;
use tracing::debug;

use crate::error::SpecError;
use document::{parse_document, read_document, DocumentFormat};

pub use graph::ExecutionGraph;
pub use ir::SpecIr;
pub use locator::Locator;
pub use validate::{validate, warnings};

/// Load and fully validate a specification document.
///
/// Every call re-reads the file; nothing is cached between loads.
pub fn load(path: &Path) -> Result<SpecIr, SpecError> {
    let ir = load_unvalidated(path)?;
    validate(&ir)?;
    Ok(ir)
}

/// Load a specification with shape checks only, skipping the referential
/// and naming rules. Used where every problem should be reported rather
/// than the first.
pub fn load_unvalidated(path: &Path) -> Result<SpecIr, SpecError> {
    debug!(path = %path.display(), "loading spec");
    let document = read_document(path)?;
    Ok(builder::build(document, Some(path.to_path_buf()))?)
}

/// Load and validate a specification from text.
pub fn load_str(content: &str, format: DocumentFormat) -> Result<SpecIr, SpecError> {
    let document = parse_document(content, format, "<inline>")?;
    let ir = builder::build(document, None)?;
    validate(&ir)?;
    Ok(ir)
}
