//! Canonical, immutable representation of a specification document.
//!
//! Built once by [`crate::spec::builder`]; everything downstream (validator,
//! integrity checker, planner, runner) reads it by shared reference.

use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;

use super::locator::Locator;

/// A built specification.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecIr {
    pub version: String,
    pub meta: Meta,
    pub checks: Vec<Check>,
    pub examples: Vec<Example>,
    pub generators: Vec<Generator>,
    pub datatypes: Vec<DataType>,
    pub transforms: Vec<Transform>,
    /// Legacy `dag` edges, kept for cycle detection.
    pub dag_edges: Vec<DagEdge>,
    pub dag_stages: Vec<DagStage>,
    pub stage_origin: StageOrigin,
    /// Document the IR was built from, when it came from disk.
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Meta {
    pub name: String,
    pub description: String,
    pub version: Option<String>,
}

/// A validation predicate over payloads.
#[derive(Debug, Clone, PartialEq)]
pub struct Check {
    pub id: String,
    pub description: String,
    pub locator: Locator,
    pub file_path: Option<String>,
    pub input_type_ref: Option<String>,
}

/// A literal fixture.
#[derive(Debug, Clone, PartialEq)]
pub struct Example {
    pub id: String,
    pub description: String,
    pub datatype_ref: Option<String>,
    pub input: Value,
    pub expected: Value,
}

/// A data factory.
#[derive(Debug, Clone, PartialEq)]
pub struct Generator {
    pub id: String,
    pub description: String,
    pub locator: Locator,
    pub file_path: Option<String>,
    pub parameters: Vec<Parameter>,
    pub return_type_ref: Option<String>,
}

/// A transformation step.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    pub id: String,
    pub description: String,
    pub locator: Locator,
    pub file_path: Option<String>,
    pub parameters: Vec<Parameter>,
    pub return_type: Option<ParamType>,
    pub default_args: Map<String, Value>,
}

impl Transform {
    /// Default declared by the spec for `name`: the parameter's own default,
    /// then `default_args`.
    pub fn declared_default(&self, name: &str) -> Option<&Value> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .and_then(|p| p.default.as_ref())
            .or_else(|| self.default_args.get(name))
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Datatype ID of the first parameter, which receives the running payload.
    pub fn input_datatype(&self) -> Option<&str> {
        self.parameters.first().and_then(|p| p.ty.datatype_ref())
    }

    pub fn output_datatype(&self) -> Option<&str> {
        self.return_type.as_ref().and_then(ParamType::datatype_ref)
    }
}

/// A declared function parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub ty: ParamType,
    pub optional: bool,
    /// `Some(Value::Null)` is an explicit `default: null`.
    pub default: Option<Value>,
    pub description: String,
}

impl Parameter {
    /// Whether `value` is acceptable for this parameter's declared type.
    ///
    /// Datatype references are not checked here; their shape belongs to the
    /// example validator.
    pub fn accepts(&self, value: &Value) -> bool {
        if value.is_null() && self.optional {
            return true;
        }
        self.ty.accepts(value)
    }
}

/// Exactly one type specification per parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamType {
    DataType(String),
    Native(NativeType),
    Literal(Vec<Value>),
    Union(Vec<TypeExpr>),
}

impl ParamType {
    pub fn datatype_ref(&self) -> Option<&str> {
        match self {
            ParamType::DataType(id) => Some(id),
            _ => None,
        }
    }

    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamType::DataType(_) => true,
            ParamType::Native(native) => native.accepts(value),
            ParamType::Literal(choices) => choices.contains(value),
            ParamType::Union(options) => options.iter().any(|t| t.accepts_shallow(value)),
        }
    }

    /// Every datatype ID mentioned anywhere in the type.
    pub fn datatype_refs(&self) -> Vec<&str> {
        match self {
            ParamType::DataType(id) => vec![id.as_str()],
            ParamType::Native(_) | ParamType::Literal(_) => Vec::new(),
            ParamType::Union(options) => options.iter().flat_map(TypeExpr::datatype_refs).collect(),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::DataType(id) => write!(f, "{id}"),
            ParamType::Native(native) => write!(f, "{native}"),
            ParamType::Literal(choices) => write!(f, "Literal{}", Value::Array(choices.clone())),
            ParamType::Union(options) => {
                let parts: Vec<String> = options.iter().map(ToString::to_string).collect();
                write!(f, "{}", parts.join(" | "))
            }
        }
    }
}

/// Host-language native types a parameter or field may declare.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NativeType {
    Int,
    Float,
    Str,
    Bool,
    Bytes,
    List,
    Dict,
    Set,
    Tuple,
    NoneType,
    Any,
    /// Anything outside `builtins`/`typing`, e.g. `pandas:DataFrame`.
    External(String),
}

impl NativeType {
    /// Parse `builtins:int`, `typing:Any`, a bare `int`, or a foreign `pkg:Type`.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let name = raw
            .strip_prefix("builtins:")
            .or_else(|| raw.strip_prefix("typing:"))
            .unwrap_or(raw);
        match name {
            "int" | "integer" => NativeType::Int,
            "float" | "number" => NativeType::Float,
            "str" | "string" => NativeType::Str,
            "bool" | "boolean" => NativeType::Bool,
            "bytes" => NativeType::Bytes,
            "list" | "List" | "array" => NativeType::List,
            "dict" | "Dict" | "object" => NativeType::Dict,
            "set" | "Set" => NativeType::Set,
            "tuple" | "Tuple" => NativeType::Tuple,
            "None" | "NoneType" | "null" => NativeType::NoneType,
            "Any" => NativeType::Any,
            _ => NativeType::External(raw.to_string()),
        }
    }

    /// JSON-level acceptance; ints are accepted where floats are declared.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            NativeType::Int => value.is_i64() || value.is_u64(),
            NativeType::Float => value.is_number(),
            NativeType::Str | NativeType::Bytes => value.is_string(),
            NativeType::Bool => value.is_boolean(),
            NativeType::List | NativeType::Set | NativeType::Tuple => value.is_array(),
            NativeType::Dict => value.is_object(),
            NativeType::NoneType => value.is_null(),
            NativeType::Any | NativeType::External(_) => true,
        }
    }
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NativeType::Int => "int",
            NativeType::Float => "float",
            NativeType::Str => "str",
            NativeType::Bool => "bool",
            NativeType::Bytes => "bytes",
            NativeType::List => "list",
            NativeType::Dict => "dict",
            NativeType::Set => "set",
            NativeType::Tuple => "tuple",
            NativeType::NoneType => "None",
            NativeType::Any => "Any",
            NativeType::External(name) => name,
        };
        f.write_str(name)
    }
}

/// Type expressions used by aliases, record fields and union members.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    Native(NativeType),
    Ref(String),
    List(Box<TypeExpr>),
    Set(Box<TypeExpr>),
    Tuple(Vec<TypeExpr>),
    Dict(Box<TypeExpr>, Box<TypeExpr>),
    Literal(Vec<Value>),
    Union(Vec<TypeExpr>),
    Optional(Box<TypeExpr>),
}

impl TypeExpr {
    pub fn datatype_refs(&self) -> Vec<&str> {
        match self {
            TypeExpr::Native(_) | TypeExpr::Literal(_) => Vec::new(),
            TypeExpr::Ref(id) => vec![id.as_str()],
            TypeExpr::List(inner) | TypeExpr::Set(inner) | TypeExpr::Optional(inner) => {
                inner.datatype_refs()
            }
            TypeExpr::Tuple(items) | TypeExpr::Union(items) => {
                items.iter().flat_map(TypeExpr::datatype_refs).collect()
            }
            TypeExpr::Dict(key, value) => {
                let mut refs = key.datatype_refs();
                refs.extend(value.datatype_refs());
                refs
            }
        }
    }

    /// Acceptance without resolving datatype references.
    pub fn accepts_shallow(&self, value: &Value) -> bool {
        match self {
            TypeExpr::Native(native) => native.accepts(value),
            TypeExpr::Ref(_) => true,
            TypeExpr::List(inner) | TypeExpr::Set(inner) => value
                .as_array()
                .is_some_and(|items| items.iter().all(|v| inner.accepts_shallow(v))),
            TypeExpr::Tuple(items) => value.as_array().is_some_and(|values| {
                values.len() == items.len()
                    && items.iter().zip(values).all(|(t, v)| t.accepts_shallow(v))
            }),
            TypeExpr::Dict(_, inner) => value
                .as_object()
                .is_some_and(|map| map.values().all(|v| inner.accepts_shallow(v))),
            TypeExpr::Literal(choices) => choices.contains(value),
            TypeExpr::Union(options) => options.iter().any(|t| t.accepts_shallow(value)),
            TypeExpr::Optional(inner) => value.is_null() || inner.accepts_shallow(value),
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Native(native) => write!(f, "{native}"),
            TypeExpr::Ref(id) => write!(f, "{id}"),
            TypeExpr::List(inner) => write!(f, "list[{inner}]"),
            TypeExpr::Set(inner) => write!(f, "set[{inner}]"),
            TypeExpr::Tuple(items) => {
                let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "tuple[{}]", parts.join(", "))
            }
            TypeExpr::Dict(key, value) => write!(f, "dict[{key}, {value}]"),
            TypeExpr::Literal(choices) => write!(f, "Literal{}", Value::Array(choices.clone())),
            TypeExpr::Union(options) => {
                let parts: Vec<String> = options.iter().map(ToString::to_string).collect();
                write!(f, "{}", parts.join(" | "))
            }
            TypeExpr::Optional(inner) => write!(f, "{inner} | None"),
        }
    }
}

/// A named data contract.
#[derive(Debug, Clone, PartialEq)]
pub struct DataType {
    pub id: String,
    pub description: String,
    pub kind: DataTypeKind,
    pub check_ids: Vec<String>,
    pub example_refs: Vec<String>,
    pub generator_refs: Vec<String>,
    /// Where the implementation tree is expected to define this type, for
    /// kinds that have a source-level counterpart.
    pub definition: Option<DefinitionKind>,
}

/// Submodule of `apps.<app>.datatypes` holding a datatype's definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefinitionKind {
    Enums,
    Models,
    TypeAliases,
}

impl DefinitionKind {
    pub fn module(&self) -> &'static str {
        match self {
            DefinitionKind::Enums => "enums",
            DefinitionKind::Models => "models",
            DefinitionKind::TypeAliases => "type_aliases",
        }
    }
}

/// The closed set of datatype shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum DataTypeKind {
    Tabular(TabularSchema),
    Enumeration(EnumSpec),
    Record(RecordSpec),
    Alias(TypeExpr),
    /// A JSON Schema document, validated as written.
    Schema(Value),
}

impl DataTypeKind {
    pub fn name(&self) -> &'static str {
        match self {
            DataTypeKind::Tabular(_) => "tabular",
            DataTypeKind::Enumeration(_) => "enumeration",
            DataTypeKind::Record(_) => "record",
            DataTypeKind::Alias(_) => "alias",
            DataTypeKind::Schema(_) => "schema",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TabularSchema {
    pub index: Option<Column>,
    /// Levels of a multi-level index, outermost first.
    pub index_levels: Vec<Column>,
    pub columns: Vec<Column>,
    /// Reject columns that are not declared.
    pub strict: bool,
    pub coerce: bool,
    pub ordered: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub dtype: String,
    pub nullable: bool,
    pub unique: bool,
    /// Allowed values, empty when unrestricted.
    pub allowed: Vec<Value>,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumBase {
    Int,
    Str,
    Float,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumSpec {
    pub base_type: EnumBase,
    pub members: Vec<EnumMember>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumMember {
    pub name: String,
    pub value: Value,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSpec {
    pub fields: Vec<RecordField>,
    /// Whether undeclared keys are tolerated.
    pub additional_properties: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordField {
    pub name: String,
    pub ty: TypeExpr,
    pub required: bool,
    pub default: Option<Value>,
    pub range: NumericRange,
    pub choices: Vec<Value>,
    pub description: String,
}

/// Inclusive (`ge`/`le`) and exclusive (`gt`/`lt`) numeric bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NumericRange {
    pub ge: Option<f64>,
    pub gt: Option<f64>,
    pub le: Option<f64>,
    pub lt: Option<f64>,
}

impl NumericRange {
    pub fn is_empty(&self) -> bool {
        self.ge.is_none() && self.gt.is_none() && self.le.is_none() && self.lt.is_none()
    }

    /// Describe the first violated bound, if any.
    pub fn violation(&self, n: f64) -> Option<String> {
        if let Some(b) = self.ge.filter(|b| n < *b) {
            return Some(format!("{n} is less than {b}"));
        }
        if let Some(b) = self.gt.filter(|b| n <= *b) {
            return Some(format!("{n} is not greater than {b}"));
        }
        if let Some(b) = self.le.filter(|b| n > *b) {
            return Some(format!("{n} is greater than {b}"));
        }
        if let Some(b) = self.lt.filter(|b| n >= *b) {
            return Some(format!("{n} is not less than {b}"));
        }
        None
    }
}

/// Legacy graph edge; `to: None` marks a terminal transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DagEdge {
    pub from: String,
    pub to: Option<String>,
}

/// Where `dag_stages` came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StageOrigin {
    #[default]
    Declared,
    /// One stage per transform, synthesized from legacy `dag` edges.
    LegacyEdges,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    /// Exactly one transform runs.
    Single,
    /// One or more transforms run on the same stage input.
    Multi,
}

impl fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionMode::Single => f.write_str("single"),
            SelectionMode::Multi => f.write_str("multi"),
        }
    }
}

/// A stage of the execution pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct DagStage {
    pub stage_id: String,
    pub description: String,
    pub selection_mode: SelectionMode,
    /// Upper bound on selections in multi mode.
    pub max_select: Option<usize>,
    pub input_type: Option<String>,
    pub output_type: Option<String>,
    pub candidates: Vec<String>,
    pub default_transform_id: Option<String>,
}

impl SpecIr {
    pub fn check(&self, id: &str) -> Option<&Check> {
        self.checks.iter().find(|c| c.id == id)
    }

    pub fn example(&self, id: &str) -> Option<&Example> {
        self.examples.iter().find(|e| e.id == id)
    }

    pub fn generator(&self, id: &str) -> Option<&Generator> {
        self.generators.iter().find(|g| g.id == id)
    }

    pub fn datatype(&self, id: &str) -> Option<&DataType> {
        self.datatypes.iter().find(|d| d.id == id)
    }

    pub fn transform(&self, id: &str) -> Option<&Transform> {
        self.transforms.iter().find(|t| t.id == id)
    }

    pub fn stage(&self, id: &str) -> Option<&DagStage> {
        self.dag_stages.iter().find(|s| s.stage_id == id)
    }

    /// Name of the application package in the implementation tree.
    ///
    /// `meta.name` when set, otherwise inferred from the first locator: the
    /// segment after `apps.`, or the first segment.
    pub fn app_package(&self) -> String {
        if !self.meta.name.is_empty() {
            return self.meta.name.clone();
        }
        let locators = self
            .checks
            .iter()
            .map(|c| &c.locator)
            .chain(self.transforms.iter().map(|t| &t.locator))
            .chain(self.generators.iter().map(|g| &g.locator));
        for locator in locators {
            let mut segments = locator.module().split('.');
            match segments.next() {
                Some("apps") => {
                    if let Some(app) = segments.next() {
                        return app.to_string();
                    }
                }
                Some(first) => return first.to_string(),
                None => {}
            }
        }
        String::new()
    }

    /// `(datatype, transform)` pairs where the datatype is a parameter or
    /// return contract of the transform, in declaration order.
    pub fn contract_types(&self) -> Vec<(&str, &str)> {
        let mut pairs = Vec::new();
        for transform in &self.transforms {
            for param in &transform.parameters {
                for id in param.ty.datatype_refs() {
                    pairs.push((id, transform.id.as_str()));
                }
            }
            if let Some(ret) = &transform.return_type {
                for id in ret.datatype_refs() {
                    pairs.push((id, transform.id.as_str()));
                }
            }
        }
        pairs
    }

    /// Datatypes whose `example_refs` list `example_id`, plus the example's
    /// own `datatype_ref`.
    pub fn owners_of_example(&self, example: &Example) -> Vec<&DataType> {
        let mut owners: Vec<&DataType> = self
            .datatypes
            .iter()
            .filter(|d| d.example_refs.iter().any(|r| r == &example.id))
            .collect();
        if let Some(dt) = example.datatype_ref.as_deref().and_then(|id| self.datatype(id)) {
            if !owners.iter().any(|o| o.id == dt.id) {
                owners.push(dt);
            }
        }
        owners
    }
}
