//! Configuration documents: which candidates to run and with what arguments.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

use crate::error::LoadError;
use crate::spec::document::{parse_document, read_document, DocumentFormat};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub version: String,
    pub meta: ConfigMeta,
    pub execution: Execution,
    /// Argument overrides keyed by transform or generator id.
    pub overrides: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigMeta {
    pub config_name: String,
    pub description: String,
    /// Path of the spec this config runs, relative to the config file.
    pub base_spec: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Execution {
    pub stages: Vec<StageSelection>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageSelection {
    pub stage_id: String,
    pub selected: Vec<Selected>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Selected {
    pub transform_id: String,
    pub params: Map<String, Value>,
}

impl Config {
    pub fn stage(&self, stage_id: &str) -> Option<&StageSelection> {
        self.execution.stages.iter().find(|s| s.stage_id == stage_id)
    }

    /// Top-level overrides for a transform or generator; non-mapping
    /// entries count as none.
    pub fn overrides_for(&self, id: &str) -> Map<String, Value> {
        match self.overrides.get(id) {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        }
    }
}

/// Read a configuration document from a YAML or JSON file.
pub fn load_config(path: &Path) -> Result<Config, LoadError> {
    let document = read_document(path)?;
    from_document(document, &path.display().to_string())
}

/// Parse a configuration from text.
pub fn parse_config(content: &str, format: DocumentFormat) -> Result<Config, LoadError> {
    from_document(parse_document(content, format, "<inline>")?, "<inline>")
}

fn from_document(document: Value, origin: &str) -> Result<Config, LoadError> {
    serde_json::from_value(document).map_err(|source| LoadError::Json {
        origin: origin.to_string(),
        source,
    })
}
