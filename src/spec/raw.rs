//! Serde shapes of the on-disk specification document.
//!
//! These mirror the document loosely: every field is optional or defaulted
//! so the builder can report missing fields by entity ID instead of failing
//! inside serde with a positional message.

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// Keep an explicit `null` as `Some(Value::Null)`; a missing key stays `None`.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawSpec {
    pub version: Option<Value>,
    pub meta: RawMeta,
    pub checks: Vec<RawCheck>,
    pub examples: Vec<RawExample>,
    /// Either a list of generators or a mapping keyed by generator ID.
    pub generators: Value,
    pub datatypes: Vec<RawDataType>,
    pub transforms: Vec<RawTransform>,
    pub dag: Vec<RawEdge>,
    pub dag_stages: Vec<RawStage>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawMeta {
    pub name: Option<String>,
    pub description: Option<String>,
    pub version: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawCheck {
    pub id: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "impl")]
    pub impl_: Option<String>,
    pub file_path: Option<String>,
    #[serde(alias = "input_datatype_ref")]
    pub input_type_ref: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawExample {
    pub id: Option<String>,
    pub description: Option<String>,
    #[serde(alias = "datatype_id")]
    pub datatype_ref: Option<String>,
    pub input: Value,
    pub expected: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawParameter {
    pub name: Option<String>,
    pub datatype_ref: Option<String>,
    pub native: Option<String>,
    pub literal: Vec<Value>,
    pub union: Vec<Value>,
    pub optional: bool,
    #[serde(deserialize_with = "present")]
    pub default: Option<Value>,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawGenerator {
    pub id: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "impl")]
    pub impl_: Option<String>,
    pub file_path: Option<String>,
    pub parameters: Vec<RawParameter>,
    #[serde(alias = "return_datatype_ref")]
    pub return_type_ref: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawTransform {
    pub id: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "impl")]
    pub impl_: Option<String>,
    pub file_path: Option<String>,
    pub parameters: Vec<RawParameter>,
    #[serde(alias = "return_type_ref")]
    pub return_datatype_ref: Option<String>,
    pub return_native: Option<String>,
    pub default_args: Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawDataType {
    pub id: Option<String>,
    pub description: Option<String>,
    pub check_ids: Vec<String>,
    #[serde(alias = "example_ids")]
    pub example_refs: Vec<String>,
    pub generator_refs: Vec<String>,
    pub dataframe_schema: Option<RawTabular>,
    pub pandas_multiindex: Option<RawMultiIndex>,
    #[serde(rename = "enum")]
    pub enumeration: Option<RawEnum>,
    pub pydantic_model: Option<RawRecord>,
    /// JSON-Schema-like object description.
    pub schema: Option<Value>,
    pub type_alias: Option<RawTypeAlias>,
    pub generic: Option<RawGeneric>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawTabular {
    pub index: Option<RawColumn>,
    pub multi_index: Vec<RawColumn>,
    pub columns: Vec<RawColumn>,
    pub strict: bool,
    pub coerce: Option<bool>,
    pub ordered: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawMultiIndex {
    pub levels: Vec<RawColumn>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawColumn {
    pub name: Option<String>,
    #[serde(alias = "type")]
    pub dtype: Option<String>,
    pub nullable: bool,
    pub unique: bool,
    #[serde(rename = "enum")]
    pub allowed: Vec<Value>,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawEnum {
    pub base_type: Option<String>,
    pub members: Vec<RawEnumMember>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawEnumMember {
    pub name: Option<String>,
    pub value: Value,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawRecord {
    pub fields: Vec<RawField>,
    pub additional_properties: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawField {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub ty: Value,
    pub required: Option<bool>,
    pub optional: bool,
    #[serde(deserialize_with = "present")]
    pub default: Option<Value>,
    pub description: Option<String>,
    pub ge: Option<f64>,
    pub gt: Option<f64>,
    pub le: Option<f64>,
    pub lt: Option<f64>,
    #[serde(rename = "enum")]
    pub choices: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawTypeAlias {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub target: Option<Value>,
    pub elements: Vec<Value>,
    pub key_type: Option<Value>,
    pub value_type: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawGeneric {
    pub container: Option<String>,
    pub element_type: Option<Value>,
    pub key_type: Option<Value>,
    pub value_type: Option<Value>,
    pub elements: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawEdge {
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawStage {
    pub stage_id: Option<String>,
    pub description: Option<String>,
    pub selection_mode: Option<String>,
    pub max_select: Option<usize>,
    pub input_type: Option<String>,
    pub output_type: Option<String>,
    pub candidates: Vec<String>,
    pub default_transform_id: Option<String>,
}
