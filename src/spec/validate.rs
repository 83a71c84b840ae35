//! Fail-fast referential and naming validation of a built spec.
//!
//! Rules run in a fixed order and the first failure wins:
//! naming, ID uniqueness and references, contract coverage, example shapes,
//! then the execution graph.

use std::collections::HashSet;
use tracing::{debug, warn};

use super::graph::ExecutionGraph;
use super::ir::{DataTypeKind, SelectionMode, SpecIr, StageOrigin};
use super::shape::check_value;
use crate::error::ValidationError;
use crate::validation::{ensure_unique, validate_meta_name};

/// Validate a spec, stopping at the first failure.
pub fn validate(ir: &SpecIr) -> Result<(), ValidationError> {
    validate_meta_name(&ir.meta.name)?;
    validate_unique_ids(ir)?;
    validate_references(ir)?;
    validate_contract_coverage(ir)?;
    validate_examples(ir)?;
    validate_graph(ir)?;
    debug!(spec = %ir.meta.name, "spec validated");
    Ok(())
}

fn validate_unique_ids(ir: &SpecIr) -> Result<(), ValidationError> {
    ensure_unique("check", ir.checks.iter().map(|c| c.id.as_str()))?;
    ensure_unique("example", ir.examples.iter().map(|e| e.id.as_str()))?;
    ensure_unique("generator", ir.generators.iter().map(|g| g.id.as_str()))?;
    ensure_unique("datatype", ir.datatypes.iter().map(|d| d.id.as_str()))?;
    ensure_unique("transform", ir.transforms.iter().map(|t| t.id.as_str()))?;
    ensure_unique("stage", ir.dag_stages.iter().map(|s| s.stage_id.as_str()))?;
    Ok(())
}

struct Known<'a> {
    checks: HashSet<&'a str>,
    examples: HashSet<&'a str>,
    generators: HashSet<&'a str>,
    datatypes: HashSet<&'a str>,
    transforms: HashSet<&'a str>,
}

impl<'a> Known<'a> {
    fn new(ir: &'a SpecIr) -> Self {
        Self {
            checks: ir.checks.iter().map(|c| c.id.as_str()).collect(),
            examples: ir.examples.iter().map(|e| e.id.as_str()).collect(),
            generators: ir.generators.iter().map(|g| g.id.as_str()).collect(),
            datatypes: ir.datatypes.iter().map(|d| d.id.as_str()).collect(),
            transforms: ir.transforms.iter().map(|t| t.id.as_str()).collect(),
        }
    }
}

fn require(
    known: &HashSet<&str>,
    owner: impl FnOnce() -> String,
    field: &'static str,
    category: &'static str,
    id: &str,
) -> Result<(), ValidationError> {
    if known.contains(id) {
        return Ok(());
    }
    Err(ValidationError::DanglingReference {
        owner: owner(),
        field,
        category,
        id: id.to_string(),
    })
}

fn validate_references(ir: &SpecIr) -> Result<(), ValidationError> {
    let known = Known::new(ir);

    for dt in &ir.datatypes {
        let owner = || format!("datatype '{}'", dt.id);
        for id in &dt.check_ids {
            require(&known.checks, owner, "check_ids", "check", id)?;
        }
        for id in &dt.example_refs {
            require(&known.examples, owner, "example_refs", "example", id)?;
        }
        for id in &dt.generator_refs {
            require(&known.generators, owner, "generator_refs", "generator", id)?;
        }
        if let DataTypeKind::Alias(expr) = &dt.kind {
            for id in expr.datatype_refs() {
                require(&known.datatypes, owner, "type_alias", "datatype", id)?;
            }
        }
        if let DataTypeKind::Record(record) = &dt.kind {
            for field in &record.fields {
                for id in field.ty.datatype_refs() {
                    require(&known.datatypes, owner, "fields", "datatype", id)?;
                }
            }
        }
    }

    for check in &ir.checks {
        if let Some(id) = &check.input_type_ref {
            require(&known.datatypes, || format!("check '{}'", check.id), "input_type_ref", "datatype", id)?;
        }
    }

    for example in &ir.examples {
        if let Some(id) = &example.datatype_ref {
            require(&known.datatypes, || format!("example '{}'", example.id), "datatype_ref", "datatype", id)?;
        }
    }

    for generator in &ir.generators {
        let owner = || format!("generator '{}'", generator.id);
        for param in &generator.parameters {
            for id in param.ty.datatype_refs() {
                require(&known.datatypes, owner, "parameters", "datatype", id)?;
            }
        }
        if let Some(id) = &generator.return_type_ref {
            require(&known.datatypes, owner, "return_type_ref", "datatype", id)?;
        }
    }

    for transform in &ir.transforms {
        let owner = || format!("transform '{}'", transform.id);
        for param in &transform.parameters {
            for id in param.ty.datatype_refs() {
                require(&known.datatypes, owner, "parameters", "datatype", id)?;
            }
        }
        if let Some(ret) = &transform.return_type {
            for id in ret.datatype_refs() {
                require(&known.datatypes, owner, "return type", "datatype", id)?;
            }
        }
    }

    for edge in &ir.dag_edges {
        let owner = || format!("dag edge '{}'", edge.from);
        require(&known.transforms, owner, "from", "transform", &edge.from)?;
        if let Some(to) = &edge.to {
            require(&known.transforms, owner, "to", "transform", to)?;
        }
    }

    for stage in &ir.dag_stages {
        let owner = || format!("stage '{}'", stage.stage_id);
        for id in &stage.candidates {
            require(&known.transforms, owner, "candidates", "transform", id)?;
        }
        match &stage.default_transform_id {
            Some(id) => {
                require(&known.transforms, owner, "default_transform_id", "transform", id)?;
                if !stage.candidates.iter().any(|c| c == id) {
                    return Err(ValidationError::InvalidValue {
                        entity: "stage",
                        id: stage.stage_id.clone(),
                        field: "default_transform_id".to_string(),
                        reason: format!("'{id}' is not one of the stage candidates"),
                    });
                }
            }
            None if stage.selection_mode == SelectionMode::Single => {
                return Err(ValidationError::MissingField {
                    entity: "stage",
                    id: stage.stage_id.clone(),
                    field: "default_transform_id",
                });
            }
            None => {}
        }
    }
    Ok(())
}

fn validate_contract_coverage(ir: &SpecIr) -> Result<(), ValidationError> {
    for (datatype_id, transform_id) in ir.contract_types() {
        let Some(dt) = ir.datatype(datatype_id) else {
            continue;
        };
        if dt.example_refs.is_empty() && dt.generator_refs.is_empty() {
            return Err(ValidationError::MissingContractCoverage {
                datatype: datatype_id.to_string(),
                transform: transform_id.to_string(),
            });
        }
    }
    Ok(())
}

fn validate_examples(ir: &SpecIr) -> Result<(), ValidationError> {
    for example in &ir.examples {
        for owner in ir.owners_of_example(example) {
            check_value(ir, owner, &example.input).map_err(|reason| ValidationError::ExampleShape {
                example: example.id.clone(),
                datatype: owner.id.clone(),
                reason,
            })?;
        }
    }
    Ok(())
}

fn validate_graph(ir: &SpecIr) -> Result<(), ValidationError> {
    ExecutionGraph::derive(ir).ensure_acyclic()?;

    match ir.stage_origin {
        StageOrigin::Declared => {
            for pair in ir.dag_stages.windows(2) {
                let (previous, stage) = (&pair[0], &pair[1]);
                if let (Some(found), Some(expected)) = (&previous.output_type, &stage.input_type) {
                    if found != expected {
                        return Err(ValidationError::TypeChain {
                            stage: stage.stage_id.clone(),
                            previous: previous.stage_id.clone(),
                            expected: expected.clone(),
                            found: found.clone(),
                        });
                    }
                }
            }
        }
        StageOrigin::LegacyEdges => {
            for edge in &ir.dag_edges {
                let (Some(from), Some(to)) = (
                    ir.transform(&edge.from),
                    edge.to.as_deref().and_then(|id| ir.transform(id)),
                ) else {
                    continue;
                };
                if let (Some(found), Some(expected)) = (from.output_datatype(), to.input_datatype()) {
                    if found != expected {
                        return Err(ValidationError::TypeChain {
                            stage: to.id.clone(),
                            previous: from.id.clone(),
                            expected: expected.to_string(),
                            found: found.to_string(),
                        });
                    }
                }
            }
        }
    }
    Ok(())
}

/// Non-fatal advice about a valid spec.
pub fn warnings(ir: &SpecIr) -> Vec<String> {
    let contract: HashSet<&str> = ir.contract_types().into_iter().map(|(dt, _)| dt).collect();
    let mut found = Vec::new();
    for dt in &ir.datatypes {
        let checkless = matches!(
            dt.kind,
            DataTypeKind::Record(_) | DataTypeKind::Tabular(_) | DataTypeKind::Schema(_)
        );
        if checkless && dt.check_ids.is_empty() {
            found.push(format!("datatype '{}' declares no check_ids", dt.id));
        }
        if !contract.contains(dt.id.as_str()) && dt.example_refs.is_empty() && dt.generator_refs.is_empty() {
            found.push(format!("datatype '{}' has no examples or generators", dt.id));
        }
    }
    for stage in &ir.dag_stages {
        if stage.candidates.is_empty() {
            found.push(format!("stage '{}' has no candidates", stage.stage_id));
        }
    }
    for message in &found {
        warn!("{message}");
    }
    found
}
