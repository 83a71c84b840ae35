//! Convert a raw document into the canonical [`SpecIr`].
//!
//! The builder only enforces shape: required fields, one type per parameter
//! and datatype, well-formed locators, known selection modes and dtypes.
//! Cross-entity rules (references, coverage, graph) belong to
//! [`super::validate`].

use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::debug;

use super::ir::{
    Check, Column, DagEdge, DagStage, DataType, DataTypeKind, DefinitionKind, EnumBase, EnumMember, EnumSpec,
    Example, Generator, Meta, NativeType, NumericRange, ParamType, Parameter, RecordField,
    RecordSpec, SelectionMode, SpecIr, StageOrigin, TabularSchema, Transform, TypeExpr,
};
use super::graph::ExecutionGraph;
use super::locator::Locator;
use super::shape::compile_schema;
use super::raw::{
    RawCheck, RawColumn, RawDataType, RawEdge, RawEnum, RawExample, RawGenerator, RawGeneric,
    RawParameter, RawRecord, RawSpec, RawStage, RawTabular, RawTransform, RawTypeAlias,
};
use crate::error::ValidationError;
use crate::validation::validate_id;

/// Column and index dtypes accepted in tabular schemas.
pub const VALID_DTYPES: &[&str] = &[
    "int", "int8", "int16", "int32", "int64", "uint8", "uint16", "uint32", "uint64", "float",
    "float16", "float32", "float64", "str", "string", "bool", "boolean", "datetime",
    "datetime64", "datetime64[ns]", "timedelta", "timedelta64", "timedelta64[ns]", "object",
    "category",
];

type BuildResult<T> = Result<T, ValidationError>;

/// Build an IR from a parsed document.
pub fn build(document: Value, source: Option<PathBuf>) -> BuildResult<SpecIr> {
    let raw: RawSpec =
        serde_json::from_value(document).map_err(|e| ValidationError::InvalidValue {
            entity: "document",
            id: source
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<inline>".to_string()),
            field: "structure".to_string(),
            reason: e.to_string(),
        })?;

    let version = raw
        .version
        .as_ref()
        .map(scalar_to_string)
        .unwrap_or_else(|| "1".to_string());
    let meta = Meta {
        name: raw.meta.name.unwrap_or_default(),
        description: raw.meta.description.unwrap_or_default(),
        version: raw.meta.version.as_ref().map(scalar_to_string),
    };

    let checks = raw
        .checks
        .into_iter()
        .enumerate()
        .map(|(i, c)| build_check(i, c))
        .collect::<BuildResult<Vec<_>>>()?;
    let examples = raw
        .examples
        .into_iter()
        .enumerate()
        .map(|(i, e)| build_example(i, e))
        .collect::<BuildResult<Vec<_>>>()?;
    let generators = raw_generators(raw.generators)?
        .into_iter()
        .enumerate()
        .map(|(i, g)| build_generator(i, g))
        .collect::<BuildResult<Vec<_>>>()?;
    let datatypes = raw
        .datatypes
        .into_iter()
        .enumerate()
        .map(|(i, d)| build_datatype(i, d))
        .collect::<BuildResult<Vec<_>>>()?;
    let transforms = raw
        .transforms
        .into_iter()
        .enumerate()
        .map(|(i, t)| build_transform(i, t))
        .collect::<BuildResult<Vec<_>>>()?;
    let dag_edges = raw
        .dag
        .into_iter()
        .enumerate()
        .map(|(i, e)| build_edge(i, e))
        .collect::<BuildResult<Vec<_>>>()?;
    let mut dag_stages = raw
        .dag_stages
        .into_iter()
        .enumerate()
        .map(|(i, s)| build_stage(i, s))
        .collect::<BuildResult<Vec<_>>>()?;

    let mut stage_origin = StageOrigin::Declared;
    if dag_stages.is_empty() && !dag_edges.is_empty() {
        dag_stages = stages_from_edges(&dag_edges, &transforms);
        stage_origin = StageOrigin::LegacyEdges;
        debug!(count = dag_stages.len(), "synthesized stages from legacy dag edges");
    }
    collect_stage_candidates(&mut dag_stages, &transforms);

    let mut ir = SpecIr {
        version,
        meta,
        checks,
        examples,
        generators,
        datatypes,
        transforms,
        dag_edges,
        dag_stages,
        stage_origin,
        source,
    };
    qualify_locators(&mut ir);
    Ok(ir)
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn entity_id(id: Option<String>, index: usize) -> String {
    id.unwrap_or_else(|| format!("#{index}"))
}

fn require_id(entity: &'static str, id: Option<String>, index: usize) -> BuildResult<String> {
    match id {
        Some(id) => {
            validate_id(entity, &id)?;
            Ok(id)
        }
        None => Err(ValidationError::MissingField {
            entity,
            id: entity_id(None, index),
            field: "id",
        }),
    }
}

fn require_locator(entity: &'static str, id: &str, raw: Option<String>) -> BuildResult<Locator> {
    let raw = raw.ok_or_else(|| ValidationError::MissingField {
        entity,
        id: id.to_string(),
        field: "impl",
    })?;
    Locator::parse(&raw).map_err(|reason| ValidationError::InvalidValue {
        entity,
        id: id.to_string(),
        field: "impl".to_string(),
        reason,
    })
}

fn build_check(index: usize, raw: RawCheck) -> BuildResult<Check> {
    let id = require_id("check", raw.id, index)?;
    let locator = require_locator("check", &id, raw.impl_)?;
    Ok(Check {
        description: raw.description.unwrap_or_default(),
        locator,
        file_path: raw.file_path,
        input_type_ref: raw.input_type_ref,
        id,
    })
}

fn build_example(index: usize, raw: RawExample) -> BuildResult<Example> {
    let id = require_id("example", raw.id, index)?;
    Ok(Example {
        id,
        description: raw.description.unwrap_or_default(),
        datatype_ref: raw.datatype_ref,
        input: raw.input,
        expected: raw.expected,
    })
}

/// Generators may be a list, or a mapping whose keys default the IDs.
fn raw_generators(value: Value) -> BuildResult<Vec<RawGenerator>> {
    let invalid = |reason: String| ValidationError::InvalidValue {
        entity: "document",
        id: "generators".to_string(),
        field: "generators".to_string(),
        reason,
    };
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(_) => serde_json::from_value(value).map_err(|e| invalid(e.to_string())),
        Value::Object(map) => map
            .into_iter()
            .map(|(key, body)| {
                let mut generator: RawGenerator =
                    serde_json::from_value(body).map_err(|e| invalid(e.to_string()))?;
                generator.id.get_or_insert(key);
                Ok(generator)
            })
            .collect(),
        other => Err(invalid(format!("expected a list or mapping, got {other}"))),
    }
}

fn build_generator(index: usize, raw: RawGenerator) -> BuildResult<Generator> {
    let id = require_id("generator", raw.id, index)?;
    let locator = require_locator("generator", &id, raw.impl_)?;
    let parameters = build_parameters("generator", &id, raw.parameters)?;
    Ok(Generator {
        description: raw.description.unwrap_or_default(),
        locator,
        file_path: raw.file_path,
        parameters,
        return_type_ref: raw.return_type_ref,
        id,
    })
}

fn build_transform(index: usize, raw: RawTransform) -> BuildResult<Transform> {
    let id = require_id("transform", raw.id, index)?;
    let locator = require_locator("transform", &id, raw.impl_)?;
    let parameters = build_parameters("transform", &id, raw.parameters)?;
    let return_type = match (raw.return_datatype_ref, raw.return_native) {
        (Some(_), Some(_)) => {
            return Err(ValidationError::InvalidValue {
                entity: "transform",
                id,
                field: "return type".to_string(),
                reason: "declare either return_datatype_ref or return_native, not both"
                    .to_string(),
            })
        }
        (Some(dt), None) => Some(ParamType::DataType(dt)),
        (None, Some(native)) => Some(ParamType::Native(NativeType::parse(&native))),
        (None, None) => None,
    };
    Ok(Transform {
        description: raw.description.unwrap_or_default(),
        locator,
        file_path: raw.file_path,
        parameters,
        return_type,
        default_args: raw.default_args,
        id,
    })
}

fn build_parameters(
    entity: &'static str,
    owner: &str,
    raws: Vec<RawParameter>,
) -> BuildResult<Vec<Parameter>> {
    let mut seen = HashSet::new();
    let mut params = Vec::with_capacity(raws.len());
    for (i, raw) in raws.into_iter().enumerate() {
        let param = build_parameter(entity, owner, i, raw)?;
        if !seen.insert(param.name.clone()) {
            return Err(ValidationError::InvalidValue {
                entity,
                id: owner.to_string(),
                field: "parameters".to_string(),
                reason: format!("parameter '{}' is declared twice", param.name),
            });
        }
        params.push(param);
    }
    Ok(params)
}

fn build_parameter(
    entity: &'static str,
    owner: &str,
    index: usize,
    raw: RawParameter,
) -> BuildResult<Parameter> {
    let name = raw.name.ok_or_else(|| ValidationError::InvalidValue {
        entity,
        id: owner.to_string(),
        field: format!("parameters[{index}]"),
        reason: "missing name".to_string(),
    })?;
    let invalid = |reason: String| ValidationError::InvalidValue {
        entity,
        id: owner.to_string(),
        field: format!("parameters.{name}"),
        reason,
    };

    let mut types = Vec::new();
    if let Some(dt) = raw.datatype_ref {
        types.push(ParamType::DataType(dt));
    }
    if let Some(native) = raw.native {
        types.push(ParamType::Native(NativeType::parse(&native)));
    }
    if !raw.literal.is_empty() {
        types.push(ParamType::Literal(raw.literal));
    }
    if !raw.union.is_empty() {
        let options = raw
            .union
            .iter()
            .map(type_expr)
            .collect::<Result<Vec<_>, _>>()
            .map_err(&invalid)?;
        types.push(ParamType::Union(options));
    }
    let ty = match types.len() {
        1 => types.remove(0),
        0 => {
            return Err(invalid(
                "must declare one of datatype_ref, native, literal or union".to_string(),
            ))
        }
        _ => {
            return Err(invalid(
                "declares more than one of datatype_ref, native, literal or union".to_string(),
            ))
        }
    };

    let param = Parameter {
        name: name.clone(),
        ty,
        optional: raw.optional,
        default: raw.default,
        description: raw.description.unwrap_or_default(),
    };
    if let Some(default) = &param.default {
        check_default(&param, default).map_err(invalid)?;
    }
    Ok(param)
}

/// A declared default must fit the declared native or literal type.
fn check_default(param: &Parameter, default: &Value) -> Result<(), String> {
    match &param.ty {
        ParamType::DataType(_) => Ok(()),
        _ if default.is_null() => {
            if param.optional {
                Ok(())
            } else {
                Err("default is null but the parameter is not optional".to_string())
            }
        }
        ParamType::Literal(choices) if !choices.contains(default) => Err(format!(
            "default {default} is not one of {}",
            Value::Array(choices.clone())
        )),
        ty if !ty.accepts(default) => Err(format!("default {default} is not a valid {ty}")),
        _ => Ok(()),
    }
}

/// Parse a type expression: `"builtins:int"`, `"int"`, a datatype ID, or a
/// mapping with `native`, `datatype_ref`, `literal`, `union` or `generic`.
pub fn type_expr(value: &Value) -> Result<TypeExpr, String> {
    let expr = match value {
        Value::String(s) => type_expr_from_str(s),
        Value::Object(map) => type_expr_from_map(map)?,
        other => return Err(format!("unsupported type expression {other}")),
    };
    Ok(expr)
}

fn type_expr_from_str(s: &str) -> TypeExpr {
    if s.contains(':') {
        return TypeExpr::Native(NativeType::parse(s));
    }
    match NativeType::parse(s) {
        NativeType::External(_) => TypeExpr::Ref(s.to_string()),
        native => TypeExpr::Native(native),
    }
}

fn type_expr_from_map(map: &Map<String, Value>) -> Result<TypeExpr, String> {
    let expr = if let Some(Value::String(dt)) = map.get("datatype_ref") {
        TypeExpr::Ref(dt.clone())
    } else if let Some(Value::String(native)) = map.get("native") {
        TypeExpr::Native(NativeType::parse(native))
    } else if let Some(Value::Array(choices)) = map.get("literal") {
        TypeExpr::Literal(choices.clone())
    } else if let Some(Value::Array(options)) = map.get("union") {
        TypeExpr::Union(options.iter().map(type_expr).collect::<Result<_, _>>()?)
    } else if let Some(generic) = map.get("generic") {
        let raw: RawGeneric = serde_json::from_value(generic.clone()).map_err(|e| e.to_string())?;
        generic_expr(&raw)?
    } else {
        let keys: Vec<&String> = map.keys().collect();
        return Err(format!("type expression has no recognised key among {keys:?}"));
    };
    if map.get("optional").and_then(Value::as_bool).unwrap_or(false) {
        return Ok(TypeExpr::Optional(Box::new(expr)));
    }
    Ok(expr)
}

fn required_expr(value: Option<&Value>, what: &str) -> Result<TypeExpr, String> {
    value
        .map(type_expr)
        .transpose()?
        .ok_or_else(|| format!("missing {what}"))
}

fn generic_expr(raw: &RawGeneric) -> Result<TypeExpr, String> {
    match raw.container.as_deref() {
        Some("list") => Ok(TypeExpr::List(Box::new(required_expr(
            raw.element_type.as_ref(),
            "element_type",
        )?))),
        Some("set") => Ok(TypeExpr::Set(Box::new(required_expr(
            raw.element_type.as_ref(),
            "element_type",
        )?))),
        Some("dict") => Ok(TypeExpr::Dict(
            Box::new(required_expr(raw.key_type.as_ref(), "key_type")?),
            Box::new(required_expr(raw.value_type.as_ref(), "value_type")?),
        )),
        Some("tuple") => Ok(TypeExpr::Tuple(
            raw.elements.iter().map(type_expr).collect::<Result<_, _>>()?,
        )),
        Some(other) => Err(format!("unknown generic container '{other}'")),
        None => Err("generic is missing container".to_string()),
    }
}

fn alias_expr(raw: &RawTypeAlias) -> Result<TypeExpr, String> {
    match raw.kind.as_deref().unwrap_or("simple") {
        "simple" => required_expr(raw.target.as_ref(), "target"),
        "tuple" => Ok(TypeExpr::Tuple(
            raw.elements.iter().map(type_expr).collect::<Result<_, _>>()?,
        )),
        "dict" => Ok(TypeExpr::Dict(
            Box::new(required_expr(raw.key_type.as_ref(), "key_type")?),
            Box::new(required_expr(raw.value_type.as_ref(), "value_type")?),
        )),
        other => Err(format!("unknown type_alias type '{other}'")),
    }
}

fn build_datatype(index: usize, raw: RawDataType) -> BuildResult<DataType> {
    let id = require_id("datatype", raw.id, index)?;
    let invalid = |field: &str, reason: String| ValidationError::InvalidValue {
        entity: "datatype",
        id: id.clone(),
        field: field.to_string(),
        reason,
    };

    let mut kinds: Vec<(&str, DataTypeKind)> = Vec::new();
    if let Some(frame) = raw.dataframe_schema {
        kinds.push((
            "dataframe_schema",
            DataTypeKind::Tabular(tabular(frame).map_err(|r| invalid("dataframe_schema", r))?),
        ));
    }
    if let Some(multi) = raw.pandas_multiindex {
        let levels = multi
            .levels
            .into_iter()
            .map(column)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|r| invalid("pandas_multiindex", r))?;
        kinds.push((
            "pandas_multiindex",
            DataTypeKind::Tabular(TabularSchema {
                index_levels: levels,
                coerce: true,
                ..Default::default()
            }),
        ));
    }
    if let Some(enumeration) = raw.enumeration {
        kinds.push((
            "enum",
            DataTypeKind::Enumeration(enum_spec(enumeration).map_err(|r| invalid("enum", r))?),
        ));
    }
    if let Some(model) = raw.pydantic_model {
        kinds.push((
            "pydantic_model",
            DataTypeKind::Record(record(model).map_err(|r| invalid("pydantic_model", r))?),
        ));
    }
    if let Some(schema) = raw.schema {
        kinds.push((
            "schema",
            json_schema_kind(schema).map_err(|r| invalid("schema", r))?,
        ));
    }
    if let Some(alias) = raw.type_alias {
        kinds.push((
            "type_alias",
            DataTypeKind::Alias(alias_expr(&alias).map_err(|r| invalid("type_alias", r))?),
        ));
    }
    if let Some(generic) = raw.generic {
        kinds.push((
            "generic",
            DataTypeKind::Alias(generic_expr(&generic).map_err(|r| invalid("generic", r))?),
        ));
    }

    let definition = match kinds.first().map(|(name, _)| *name) {
        Some("enum") => Some(DefinitionKind::Enums),
        Some("pydantic_model") => Some(DefinitionKind::Models),
        Some("type_alias") => Some(DefinitionKind::TypeAliases),
        _ => None,
    };
    let kind = match kinds.len() {
        1 => kinds.remove(0).1,
        0 => {
            return Err(invalid(
                "type definition",
                "must define one of dataframe_schema, enum, pydantic_model, schema, type_alias or generic"
                    .to_string(),
            ))
        }
        _ => {
            let names: Vec<&str> = kinds.iter().map(|(name, _)| *name).collect();
            return Err(invalid(
                "type definition",
                format!("must define exactly one type, got {}", names.join(", ")),
            ));
        }
    };

    Ok(DataType {
        description: raw.description.unwrap_or_default(),
        kind,
        check_ids: raw.check_ids,
        example_refs: raw.example_refs,
        generator_refs: raw.generator_refs,
        definition,
        id,
    })
}

fn column(raw: RawColumn) -> Result<Column, String> {
    let name = raw.name.ok_or_else(|| "column is missing name".to_string())?;
    let dtype = raw.dtype.unwrap_or_default();
    if dtype.is_empty() {
        return Err(format!("column '{name}' is missing dtype"));
    }
    if !VALID_DTYPES.contains(&dtype.as_str()) {
        return Err(format!("column '{name}' has unknown dtype '{dtype}'"));
    }
    Ok(Column {
        name,
        dtype,
        nullable: raw.nullable,
        unique: raw.unique,
        allowed: raw.allowed,
        description: raw.description.unwrap_or_default(),
    })
}

fn tabular(raw: RawTabular) -> Result<TabularSchema, String> {
    let mut names = HashSet::new();
    let columns = raw
        .columns
        .into_iter()
        .map(column)
        .collect::<Result<Vec<_>, _>>()?;
    for col in &columns {
        if !names.insert(col.name.clone()) {
            return Err(format!("column '{}' is declared twice", col.name));
        }
    }
    Ok(TabularSchema {
        index: raw.index.map(column).transpose()?,
        index_levels: raw
            .multi_index
            .into_iter()
            .map(column)
            .collect::<Result<_, _>>()?,
        columns,
        strict: raw.strict,
        coerce: raw.coerce.unwrap_or(true),
        ordered: raw.ordered,
    })
}

fn enum_spec(raw: RawEnum) -> Result<EnumSpec, String> {
    let base_type = match raw.base_type.as_deref().unwrap_or("str") {
        "int" => EnumBase::Int,
        "str" => EnumBase::Str,
        "float" => EnumBase::Float,
        other => return Err(format!("unknown base_type '{other}'")),
    };
    let mut names = HashSet::new();
    let mut members = Vec::with_capacity(raw.members.len());
    for member in raw.members {
        let name = member
            .name
            .ok_or_else(|| "enum member is missing name".to_string())?;
        if !names.insert(name.clone()) {
            return Err(format!("member '{name}' is declared twice"));
        }
        let fits = match base_type {
            EnumBase::Int => member.value.is_i64() || member.value.is_u64(),
            EnumBase::Float => member.value.is_number(),
            EnumBase::Str => member.value.is_string(),
        };
        if !fits {
            return Err(format!(
                "member '{name}' value {} does not match base_type",
                member.value
            ));
        }
        members.push(EnumMember {
            name,
            value: member.value,
            description: member.description.unwrap_or_default(),
        });
    }
    Ok(EnumSpec { base_type, members })
}

fn record(raw: RawRecord) -> Result<RecordSpec, String> {
    let mut fields = Vec::with_capacity(raw.fields.len());
    for field in raw.fields {
        let name = field
            .name
            .ok_or_else(|| "field is missing name".to_string())?;
        let mut ty = type_expr(&field.ty).map_err(|e| format!("field '{name}': {e}"))?;
        if field.optional && !matches!(ty, TypeExpr::Optional(_)) {
            ty = TypeExpr::Optional(Box::new(ty));
        }
        let required = field
            .required
            .unwrap_or(!field.optional && field.default.is_none());
        fields.push(RecordField {
            name,
            ty,
            required,
            default: field.default,
            range: NumericRange {
                ge: field.ge,
                gt: field.gt,
                le: field.le,
                lt: field.lt,
            },
            choices: field.choices,
            description: field.description.unwrap_or_default(),
        });
    }
    Ok(RecordSpec {
        fields,
        additional_properties: raw.additional_properties,
    })
}

/// Schemas are kept as written and validated with `jsonschema`; they only
/// have to compile here.
fn json_schema_kind(schema: Value) -> Result<DataTypeKind, String> {
    if !schema.is_object() {
        return Err("schema must be a mapping".to_string());
    }
    compile_schema(&schema)?;
    Ok(DataTypeKind::Schema(schema))
}

fn build_edge(index: usize, raw: RawEdge) -> BuildResult<DagEdge> {
    let from = raw.from.ok_or_else(|| ValidationError::MissingField {
        entity: "dag edge",
        id: format!("#{index}"),
        field: "from",
    })?;
    Ok(DagEdge { from, to: raw.to })
}

fn build_stage(index: usize, raw: RawStage) -> BuildResult<DagStage> {
    let stage_id = require_id("stage", raw.stage_id, index)?;
    let selection_mode = match raw.selection_mode.as_deref().unwrap_or("single") {
        "single" | "exclusive" => SelectionMode::Single,
        "multi" | "multiple" => SelectionMode::Multi,
        other => {
            return Err(ValidationError::InvalidValue {
                entity: "stage",
                id: stage_id,
                field: "selection_mode".to_string(),
                reason: format!("unknown mode '{other}' (expected single or multi)"),
            })
        }
    };
    if raw.max_select == Some(0) {
        return Err(ValidationError::InvalidValue {
            entity: "stage",
            id: stage_id,
            field: "max_select".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    Ok(DagStage {
        stage_id,
        description: raw.description.unwrap_or_default(),
        selection_mode,
        max_select: raw.max_select,
        input_type: raw.input_type.filter(|s| !s.is_empty()),
        output_type: raw.output_type.filter(|s| !s.is_empty()),
        candidates: raw.candidates,
        default_transform_id: raw.default_transform_id,
    })
}

/// Order transforms named by legacy edges topologically, ties broken by
/// first appearance. A cyclic edge list keeps appearance order so the graph
/// check can report the cycle.
fn order_edge_transforms(edges: &[DagEdge]) -> Vec<String> {
    let graph = ExecutionGraph::from_edges(edges);
    graph
        .topological_order()
        .unwrap_or_else(|_| graph.nodes().to_vec())
}

fn stages_from_edges(edges: &[DagEdge], transforms: &[Transform]) -> Vec<DagStage> {
    order_edge_transforms(edges)
        .into_iter()
        .filter_map(|id| transforms.iter().find(|t| t.id == id))
        .enumerate()
        .map(|(i, transform)| DagStage {
            stage_id: format!("stage_{}_{}", i + 1, transform.id),
            description: transform.description.clone(),
            selection_mode: SelectionMode::Single,
            max_select: None,
            input_type: transform.parameters.first().map(|p| p.ty.to_string()),
            output_type: transform.return_type.as_ref().map(ToString::to_string),
            candidates: vec![transform.id.clone()],
            default_transform_id: Some(transform.id.clone()),
        })
        .collect()
}

/// Fill empty candidate lists with transforms whose first parameter and
/// return type match the stage's declared types, then default single stages
/// with exactly one candidate.
fn collect_stage_candidates(stages: &mut [DagStage], transforms: &[Transform]) {
    for stage in stages.iter_mut() {
        if stage.candidates.is_empty() {
            if let (Some(input), Some(output)) = (&stage.input_type, &stage.output_type) {
                stage.candidates = transforms
                    .iter()
                    .filter(|t| {
                        t.parameters.first().map(|p| p.ty.to_string()).as_ref() == Some(input)
                            && t.return_type.as_ref().map(ToString::to_string).as_ref()
                                == Some(output)
                    })
                    .map(|t| t.id.clone())
                    .collect();
                debug!(stage = %stage.stage_id, candidates = ?stage.candidates, "collected stage candidates");
            }
        }
        if stage.selection_mode == SelectionMode::Single
            && stage.default_transform_id.is_none()
            && stage.candidates.len() == 1
        {
            stage.default_transform_id = stage.candidates.first().cloned();
        }
    }
}

fn qualify_locators(ir: &mut SpecIr) {
    let app = ir.app_package();
    for check in &mut ir.checks {
        check.locator = check.locator.qualify(&app, check.file_path.as_deref());
    }
    for generator in &mut ir.generators {
        generator.locator = generator.locator.qualify(&app, generator.file_path.as_deref());
    }
    for transform in &mut ir.transforms {
        transform.locator = transform.locator.qualify(&app, transform.file_path.as_deref());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal() -> Value {
        json!({
            "version": "1",
            "meta": {"name": "demo", "description": "demo pipeline"},
            "checks": [
                {"id": "check_len", "impl": "apps.checks.validators:check_len", "file_path": "checks/validators.py"}
            ],
            "examples": [
                {"id": "ex_text", "input": {"text": "hi"}, "expected": {}}
            ],
            "datatypes": [
                {
                    "id": "Text",
                    "check_ids": ["check_len"],
                    "example_refs": ["ex_text"],
                    "schema": {
                        "type": "object",
                        "properties": {"text": {"type": "string"}},
                        "required": ["text"]
                    }
                }
            ],
            "transforms": [
                {
                    "id": "shout",
                    "impl": "apps.demo.transforms.ops:shout",
                    "parameters": [
                        {"name": "data", "datatype_ref": "Text"},
                        {"name": "times", "native": "builtins:int", "default": 2}
                    ],
                    "return_datatype_ref": "Text"
                }
            ],
            "dag_stages": [
                {"stage_id": "s1", "input_type": "Text", "output_type": "Text", "candidates": []}
            ]
        })
    }

    #[test]
    fn test_build_minimal() {
        let ir = build(minimal(), None).unwrap();
        assert_eq!(ir.meta.name, "demo");
        assert_eq!(
            ir.checks[0].locator.to_string(),
            "apps.demo.checks.validators:check_len"
        );
        assert!(matches!(ir.datatypes[0].kind, DataTypeKind::Schema(_)));
        assert_eq!(ir.dag_stages[0].candidates, vec!["shout".to_string()]);
        assert_eq!(ir.dag_stages[0].default_transform_id.as_deref(), Some("shout"));
    }

    #[test]
    fn test_missing_impl_is_reported() {
        let mut doc = minimal();
        doc["checks"][0].as_object_mut().unwrap().remove("impl");
        let err = build(doc, None).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingField {
                entity: "check",
                id: "check_len".to_string(),
                field: "impl"
            }
        );
    }

    #[test]
    fn test_parameter_requires_single_type() {
        let mut doc = minimal();
        doc["transforms"][0]["parameters"][1]["datatype_ref"] = json!("Text");
        let err = build(doc, None).unwrap_err();
        assert!(err.to_string().contains("more than one"));
    }

    #[test]
    fn test_default_type_mismatch() {
        let mut doc = minimal();
        doc["transforms"][0]["parameters"][1]["default"] = json!("two");
        let err = build(doc, None).unwrap_err();
        assert!(err.to_string().contains("parameters.times"));
    }

    #[test]
    fn test_null_default_requires_optional() {
        let mut doc = minimal();
        doc["transforms"][0]["parameters"][1]["default"] = Value::Null;
        assert!(build(doc.clone(), None).is_err());
        doc["transforms"][0]["parameters"][1]["optional"] = json!(true);
        let ir = build(doc, None).unwrap();
        assert_eq!(ir.transforms[0].parameters[1].default, Some(Value::Null));
    }

    #[test]
    fn test_generators_as_mapping() {
        let mut doc = minimal();
        doc["generators"] = json!({
            "gen_text": {"impl": "apps.demo.generators.g:gen_text"}
        });
        let ir = build(doc, None).unwrap();
        assert_eq!(ir.generators[0].id, "gen_text");
    }

    #[test]
    fn test_datatype_requires_exactly_one_kind() {
        let mut doc = minimal();
        doc["datatypes"][0]["type_alias"] = json!({"type": "simple", "target": "builtins:str"});
        let err = build(doc, None).unwrap_err();
        assert!(err.to_string().contains("exactly one type"));
    }

    #[test]
    fn test_schema_must_compile() {
        let mut doc = minimal();
        doc["datatypes"][0]["schema"] = json!({"type": 12});
        let err = build(doc, None).unwrap_err();
        assert!(err.to_string().contains("invalid JSON Schema"), "{err}");

        let mut doc = minimal();
        doc["datatypes"][0]["schema"] = json!("object");
        let err = build(doc, None).unwrap_err();
        assert!(err.to_string().contains("schema must be a mapping"));
    }

    #[test]
    fn test_unknown_dtype_rejected() {
        let mut doc = minimal();
        doc["datatypes"][0].as_object_mut().unwrap().remove("schema");
        doc["datatypes"][0]["dataframe_schema"] = json!({
            "columns": [{"name": "a", "dtype": "decimal"}]
        });
        let err = build(doc, None).unwrap_err();
        assert!(err.to_string().contains("unknown dtype 'decimal'"));
    }

    #[test]
    fn test_legacy_dag_becomes_stages() {
        let mut doc = minimal();
        doc.as_object_mut().unwrap().remove("dag_stages");
        doc["dag"] = json!([{"from": "shout", "to": null}]);
        let ir = build(doc, None).unwrap();
        assert_eq!(ir.dag_stages.len(), 1);
        assert_eq!(ir.dag_stages[0].stage_id, "stage_1_shout");
        assert_eq!(ir.dag_stages[0].input_type.as_deref(), Some("Text"));
        assert_eq!(ir.dag_stages[0].default_transform_id.as_deref(), Some("shout"));
    }

    #[test]
    fn test_order_edge_transforms() {
        let edges = vec![
            DagEdge { from: "b".into(), to: Some("c".into()) },
            DagEdge { from: "a".into(), to: Some("b".into()) },
            DagEdge { from: "c".into(), to: None },
        ];
        assert_eq!(order_edge_transforms(&edges), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_type_expr_forms() {
        assert_eq!(
            type_expr(&json!("builtins:int")).unwrap(),
            TypeExpr::Native(NativeType::Int)
        );
        assert_eq!(type_expr(&json!("Row")).unwrap(), TypeExpr::Ref("Row".into()));
        assert_eq!(
            type_expr(&json!({"generic": {"container": "list", "element_type": {"datatype_ref": "Row"}}}))
                .unwrap(),
            TypeExpr::List(Box::new(TypeExpr::Ref("Row".into())))
        );
    }
}
