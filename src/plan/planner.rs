//! Config validation and execution planning.
//!
//! A config is checked against the stages of its base spec, producing an
//! ordered list of [`PlanStep`]s. With a probe, each selected transform is
//! also resolved and its arguments checked against the implementation.
//! Every problem is collected before anything is reported.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::config::{load_config, Config, Selected};
use crate::error::{ConfigValidationError, PlanError, SpecError};
use crate::integrity::probe::{resolution_cache, CapabilityProbe};
use crate::spec::document::resolve_relative;
use crate::spec::ir::{DagStage, SelectionMode, Transform};
use crate::spec::{self, ExecutionGraph, SpecIr};

/// One transform invocation in the execution plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanStep {
    pub stage_id: String,
    #[serde(serialize_with = "as_display")]
    pub mode: SelectionMode,
    pub transform_id: String,
    /// Config-supplied arguments; spec and native defaults are applied at run time.
    pub params: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanValidation {
    pub valid: bool,
    pub execution_plan: Vec<PlanStep>,
}

fn as_display<S: Serializer>(mode: &SelectionMode, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(mode)
}

/// A config together with the spec it is based on.
#[derive(Debug)]
pub struct ConfigPlanner {
    config: Config,
    ir: SpecIr,
    spec_path: PathBuf,
}

impl ConfigPlanner {
    /// Load a config file and the spec named by its `meta.base_spec`.
    pub fn from_path(config_path: &Path) -> Result<Self, PlanError> {
        let config = load_config(config_path)?;
        if config.meta.base_spec.trim().is_empty() {
            return Err(ConfigValidationError::new(vec![
                "meta.base_spec is required".to_string()
            ])
            .into());
        }
        let spec_path = resolve_relative(config_path, &config.meta.base_spec);
        debug!(config = %config_path.display(), spec = %spec_path.display(), "loading base spec");
        let ir = spec::load(&spec_path)?;
        Ok(Self {
            config,
            ir,
            spec_path,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn ir(&self) -> &SpecIr {
        &self.ir
    }

    pub fn spec_path(&self) -> &Path {
        &self.spec_path
    }

    pub fn validate(&self, probe: Option<&dyn CapabilityProbe>) -> Result<PlanValidation, PlanError> {
        validate(&self.config, &self.ir, probe)
    }
}

/// Check `config` against `ir` and build the execution plan, stages in
/// the execution graph's topological order.
///
/// With `probe`, every planned transform must resolve and accept its
/// arguments.
pub fn validate(
    config: &Config,
    ir: &SpecIr,
    probe: Option<&dyn CapabilityProbe>,
) -> Result<PlanValidation, PlanError> {
    let mut problems = Vec::new();

    for selection in &config.execution.stages {
        if ir.stage(&selection.stage_id).is_none() {
            problems.push(format!("Unknown stage_id: {}", selection.stage_id));
        }
    }

    let stages = ExecutionGraph::derive(ir)
        .order_stages(&ir.dag_stages)
        .map_err(SpecError::from)?;
    let mut plan = Vec::new();
    for stage in stages {
        let selected: &[Selected] = config
            .stage(&stage.stage_id)
            .map(|s| s.selected.as_slice())
            .unwrap_or_default();
        for transform_id in stage_selection(stage, selected, &mut problems) {
            let Some(transform) = ir.transform(&transform_id) else {
                problems.push(format!("Transform '{transform_id}' not found in spec transforms"));
                continue;
            };
            let mut params = config.overrides_for(&transform_id);
            if let Some(choice) = selected.iter().find(|s| s.transform_id == transform_id) {
                params.extend(choice.params.clone());
            }
            if let Some(probe) = probe {
                check_implementation(transform, &params, probe, &mut problems)?;
            }
            plan.push(PlanStep {
                stage_id: stage.stage_id.clone(),
                mode: stage.selection_mode,
                transform_id,
                params,
            });
        }
    }

    if !problems.is_empty() {
        return Err(ConfigValidationError::new(problems).into());
    }
    debug!(steps = plan.len(), "config validated");
    Ok(PlanValidation {
        valid: true,
        execution_plan: plan,
    })
}

/// Transforms a stage runs, in candidate order for multi stages.
fn stage_selection(stage: &DagStage, selected: &[Selected], problems: &mut Vec<String>) -> Vec<String> {
    let id = &stage.stage_id;
    let mut valid = true;
    for choice in selected {
        if !stage.candidates.contains(&choice.transform_id) {
            problems.push(format!(
                "Stage '{id}': transform '{}' is not in candidates: [{}]",
                choice.transform_id,
                stage.candidates.join(", ")
            ));
            valid = false;
        }
    }

    match stage.selection_mode {
        SelectionMode::Single => {
            if selected.len() > 1 {
                problems.push(format!(
                    "Stage '{id}' has selection_mode='single', but config specifies {} selections",
                    selected.len()
                ));
                return Vec::new();
            }
            if let Some(choice) = selected.first() {
                return if valid { vec![choice.transform_id.clone()] } else { Vec::new() };
            }
            match &stage.default_transform_id {
                Some(default) => vec![default.clone()],
                None => {
                    problems.push(format!(
                        "Stage '{id}' has no selection and no default_transform_id"
                    ));
                    Vec::new()
                }
            }
        }
        SelectionMode::Multi => {
            if let Some(max) = stage.max_select {
                if selected.len() > max {
                    problems.push(format!(
                        "Stage '{id}' allows at most {max} selections, but got {}",
                        selected.len()
                    ));
                    return Vec::new();
                }
            }
            if !valid {
                return Vec::new();
            }
            if selected.is_empty() {
                return stage.candidates.clone();
            }
            stage
                .candidates
                .iter()
                .filter(|c| selected.iter().any(|s| &s.transform_id == *c))
                .cloned()
                .collect()
        }
    }
}

fn check_implementation(
    transform: &Transform,
    params: &Map<String, Value>,
    probe: &dyn CapabilityProbe,
    problems: &mut Vec<String>,
) -> Result<(), PlanError> {
    let id = &transform.id;
    let Some(invocable) = resolution_cache().resolve(probe, &transform.locator)? else {
        problems.push(format!(
            "Transform '{id}': cannot resolve implementation '{}'",
            transform.locator
        ));
        return Ok(());
    };

    for (name, value) in params {
        if !invocable.accepts_keyword(name) {
            problems.push(format!("Transform '{id}': unknown parameter '{name}'"));
            continue;
        }
        if let Some(declared) = transform.parameter(name) {
            if !declared.accepts(value) {
                problems.push(format!(
                    "Transform '{id}': parameter '{name}' expected type {}, got {}",
                    declared.ty,
                    json_type(value)
                ));
            }
        }
    }

    for param in invocable.named_params().skip(1) {
        let name = param.name.as_str();
        let resolvable = params.contains_key(name)
            || transform.declared_default(name).is_some()
            || param.has_default
            || invocable.native_defaults.contains_key(name);
        if !resolvable {
            problems.push(format!("Transform '{id}': missing required parameter '{name}'"));
        }
    }
    Ok(())
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}
