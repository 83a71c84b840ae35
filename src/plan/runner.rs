//! Sequential execution of a validated plan.

use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use super::config::Config;
use super::planner::{validate, PlanStep};
use super::registry::NativeRegistry;
use crate::error::{ExecutionError, RunError};
use crate::integrity::probe::{resolution_cache, CapabilityProbe, Invocable};
use crate::spec::ir::SelectionMode;
use crate::spec::{Locator, SpecIr};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Started,
    Completed,
    Failed(String),
}

/// One entry of the run log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunEvent {
    pub stage_id: String,
    pub transform_id: String,
    pub status: RunStatus,
}

impl fmt::Display for RunEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}: ", self.stage_id, self.transform_id)?;
        match &self.status {
            RunStatus::Started => f.write_str("started"),
            RunStatus::Completed => f.write_str("completed"),
            RunStatus::Failed(reason) => write!(f, "failed ({reason})"),
        }
    }
}

/// Runs a config's plan against in-process implementations.
pub struct PlanRunner<'a> {
    ir: &'a SpecIr,
    config: &'a Config,
    registry: &'a NativeRegistry,
    log: Vec<RunEvent>,
}

impl<'a> PlanRunner<'a> {
    pub fn new(ir: &'a SpecIr, config: &'a Config, registry: &'a NativeRegistry) -> Self {
        Self {
            ir,
            config,
            registry,
            log: Vec::new(),
        }
    }

    /// Events recorded by the most recent [`run`](Self::run).
    pub fn log(&self) -> &[RunEvent] {
        &self.log
    }

    /// Validate the config with implementation checks, then execute every
    /// step in order. Returns the final payload.
    ///
    /// Steps of a multi stage all receive the stage input; the stage output
    /// maps each transform id to its result.
    pub fn run(&mut self, initial_payload: Value) -> Result<Value, RunError> {
        self.log.clear();
        resolution_cache().clear_scope(&self.registry.scope());
        let plan = validate(self.config, self.ir, Some(self.registry))?;
        info!(steps = plan.execution_plan.len(), "running plan");

        let mut payload = initial_payload;
        let steps = plan.execution_plan;
        let mut index = 0;
        while index < steps.len() {
            let stage_id = &steps[index].stage_id;
            let end = steps[index..]
                .iter()
                .position(|s| &s.stage_id != stage_id)
                .map_or(steps.len(), |offset| index + offset);
            let group = &steps[index..end];

            payload = match group[0].mode {
                SelectionMode::Single => self.execute(&group[0], payload)?,
                SelectionMode::Multi => {
                    let mut outputs = Map::new();
                    for step in group {
                        let result = self.execute(step, payload.clone())?;
                        outputs.insert(step.transform_id.clone(), result);
                    }
                    Value::Object(outputs)
                }
            };
            index = end;
        }
        Ok(payload)
    }

    fn execute(&mut self, step: &PlanStep, payload: Value) -> Result<Value, RunError> {
        let transform = self
            .ir
            .transform(&step.transform_id)
            .ok_or_else(|| RunError::Unregistered(step.transform_id.clone()))?;
        let invocable = self.lookup(&transform.locator)?;

        let mut args = Map::new();
        let mut named = invocable.named_params();
        if let Some(first) = named.next() {
            args.insert(first.name.clone(), payload);
        }
        for param in named {
            if let Some(value) = step
                .params
                .get(&param.name)
                .or_else(|| transform.declared_default(&param.name))
            {
                args.insert(param.name.clone(), value.clone());
            }
        }
        // Extra overrides reach `**kwargs`-style implementations untouched.
        for (name, value) in &step.params {
            args.entry(name.clone()).or_insert_with(|| value.clone());
        }

        self.record(step, RunStatus::Started);
        match invocable.invoke(args) {
            Ok(result) => {
                self.record(step, RunStatus::Completed);
                Ok(result)
            }
            Err(source) => {
                self.record(step, RunStatus::Failed(source.to_string()));
                Err(ExecutionError {
                    transform_id: step.transform_id.clone(),
                    source,
                }
                .into())
            }
        }
    }

    /// Invoke a generator. Arguments come from `overrides` merged over the
    /// config's top-level overrides for `generator_id`, then the parameter
    /// defaults declared in the spec; anything else falls back to the
    /// implementation's own default.
    pub fn generate(&self, generator_id: &str, overrides: &Map<String, Value>) -> Result<Value, RunError> {
        let generator = self
            .ir
            .generator(generator_id)
            .ok_or_else(|| RunError::UnknownGenerator(generator_id.to_string()))?;
        let invocable = self.lookup(&generator.locator)?;

        let mut args = self.config.overrides_for(generator_id);
        args.extend(overrides.clone());
        for param in invocable.named_params() {
            if args.contains_key(&param.name) {
                continue;
            }
            let declared = generator
                .parameters
                .iter()
                .find(|p| p.name == param.name)
                .and_then(|p| p.default.as_ref());
            if let Some(value) = declared {
                args.insert(param.name.clone(), value.clone());
            }
        }

        invocable.invoke(args).map_err(|source| {
            warn!(generator = generator_id, error = %source, "generator failed");
            ExecutionError {
                transform_id: generator_id.to_string(),
                source,
            }
            .into()
        })
    }

    fn lookup(&self, locator: &Locator) -> Result<Arc<Invocable>, RunError> {
        resolution_cache()
            .resolve(self.registry, locator)
            .map_err(|e| RunError::Plan(e.into()))?
            .ok_or_else(|| RunError::Unregistered(locator.to_string()))
    }

    fn record(&mut self, step: &PlanStep, status: RunStatus) {
        let event = RunEvent {
            stage_id: step.stage_id.clone(),
            transform_id: step.transform_id.clone(),
            status,
        };
        match &event.status {
            RunStatus::Failed(_) => warn!("{event}"),
            _ => info!("{event}"),
        }
        self.log.push(event);
    }
}
