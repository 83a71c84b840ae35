//! Structural validation of literal payloads against datatype shapes.
//!
//! Used for examples at load time and again by the integrity checker.
//! Failures are returned as a single human-readable reason naming the
//! offending field path.

use jsonschema::{Draft, Validator};
use serde_json::{Map, Value};
use std::collections::HashSet;

use super::ir::{
    Column, DataType, DataTypeKind, EnumSpec, RecordSpec, SpecIr, TabularSchema, TypeExpr,
};

/// Datatype references deeper than this are treated as a recursive alias.
const MAX_DEPTH: usize = 32;

/// Check `value` against the shape of `datatype`.
pub fn check_value(ir: &SpecIr, datatype: &DataType, value: &Value) -> Result<(), String> {
    Checker { ir }.datatype(datatype, value, "$", 0)
}

struct Checker<'a> {
    ir: &'a SpecIr,
}

impl Checker<'_> {
    fn datatype(&self, dt: &DataType, value: &Value, path: &str, depth: usize) -> Result<(), String> {
        if depth > MAX_DEPTH {
            return Err(format!("{path}: datatype '{}' nests too deeply", dt.id));
        }
        match &dt.kind {
            DataTypeKind::Tabular(schema) => tabular(schema, value, path),
            DataTypeKind::Enumeration(spec) => enumeration(spec, value, path),
            DataTypeKind::Record(spec) => self.record(spec, value, path, depth),
            DataTypeKind::Alias(expr) => self.expr(expr, value, path, depth),
            DataTypeKind::Schema(schema) => json_schema(schema, value, path),
        }
    }

    fn record(&self, spec: &RecordSpec, value: &Value, path: &str, depth: usize) -> Result<(), String> {
        let Some(map) = value.as_object() else {
            return Err(format!("{path}: expected an object, got {}", kind_of(value)));
        };
        for field in &spec.fields {
            let field_path = format!("{path}.{}", field.name);
            let Some(item) = map.get(&field.name) else {
                if field.required {
                    return Err(format!("{field_path}: required field is missing"));
                }
                continue;
            };
            if item.is_null() && !field.required {
                continue;
            }
            self.expr(&field.ty, item, &field_path, depth)?;
            if !field.choices.is_empty() && !field.choices.contains(item) {
                return Err(format!(
                    "{field_path}: {item} is not one of {}",
                    Value::Array(field.choices.clone())
                ));
            }
            if let Some(reason) = item.as_f64().and_then(|n| field.range.violation(n)) {
                return Err(format!("{field_path}: {reason}"));
            }
        }
        if !spec.additional_properties {
            let declared: HashSet<&str> = spec.fields.iter().map(|f| f.name.as_str()).collect();
            if let Some(extra) = map.keys().find(|k| !declared.contains(k.as_str())) {
                return Err(format!("{path}: undeclared field '{extra}'"));
            }
        }
        Ok(())
    }

    fn expr(&self, expr: &TypeExpr, value: &Value, path: &str, depth: usize) -> Result<(), String> {
        match expr {
            TypeExpr::Native(native) => {
                if native.accepts(value) {
                    Ok(())
                } else {
                    Err(format!("{path}: expected {native}, got {}", kind_of(value)))
                }
            }
            TypeExpr::Ref(id) => match self.ir.datatype(id) {
                Some(dt) => self.datatype(dt, value, path, depth + 1),
                None => Err(format!("{path}: unknown datatype '{id}'")),
            },
            TypeExpr::List(inner) | TypeExpr::Set(inner) => {
                let Some(items) = value.as_array() else {
                    return Err(format!("{path}: expected {expr}, got {}", kind_of(value)));
                };
                items
                    .iter()
                    .enumerate()
                    .try_for_each(|(i, item)| self.expr(inner, item, &format!("{path}[{i}]"), depth))
            }
            TypeExpr::Tuple(types) => {
                let Some(items) = value.as_array() else {
                    return Err(format!("{path}: expected {expr}, got {}", kind_of(value)));
                };
                if items.len() != types.len() {
                    return Err(format!(
                        "{path}: expected {} elements, got {}",
                        types.len(),
                        items.len()
                    ));
                }
                types
                    .iter()
                    .zip(items)
                    .enumerate()
                    .try_for_each(|(i, (t, item))| self.expr(t, item, &format!("{path}[{i}]"), depth))
            }
            TypeExpr::Dict(_, inner) => {
                let Some(map) = value.as_object() else {
                    return Err(format!("{path}: expected {expr}, got {}", kind_of(value)));
                };
                map.iter()
                    .try_for_each(|(k, item)| self.expr(inner, item, &format!("{path}.{k}"), depth))
            }
            TypeExpr::Literal(choices) => {
                if choices.contains(value) {
                    Ok(())
                } else {
                    Err(format!("{path}: {value} is not one of {}", Value::Array(choices.clone())))
                }
            }
            TypeExpr::Union(options) => {
                if options.iter().any(|t| self.expr(t, value, path, depth).is_ok()) {
                    Ok(())
                } else {
                    Err(format!("{path}: {value} matches none of {expr}"))
                }
            }
            TypeExpr::Optional(inner) => {
                if value.is_null() {
                    Ok(())
                } else {
                    self.expr(inner, value, path, depth)
                }
            }
        }
    }
}

/// Compile a JSON Schema document (draft 2020-12 unless `$schema` says
/// otherwise).
pub fn compile_schema(schema: &Value) -> Result<Validator, String> {
    let built = if schema.get("$schema").is_none() {
        jsonschema::options()
            .with_draft(Draft::Draft202012)
            .build(schema)
    } else {
        jsonschema::options().build(schema)
    };
    built.map_err(|e| format!("invalid JSON Schema: {e}"))
}

/// Every violation, each prefixed with the instance location.
fn json_schema(schema: &Value, value: &Value, path: &str) -> Result<(), String> {
    let validator = compile_schema(schema)?;
    let problems: Vec<String> = validator
        .iter_errors(value)
        .map(|err| format!("{}: {err}", pointer_path(path, &err.instance_path.to_string())))
        .collect();
    if problems.is_empty() {
        Ok(())
    } else {
        Err(problems.join("; "))
    }
}

/// `/items/0/name` under `$` becomes `$.items[0].name`.
fn pointer_path(base: &str, pointer: &str) -> String {
    let mut path = base.to_string();
    for segment in pointer.split('/').skip(1) {
        let segment = segment.replace("~1", "/").replace("~0", "~");
        if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
            path.push_str(&format!("[{segment}]"));
        } else {
            path.push('.');
            path.push_str(&segment);
        }
    }
    path
}

fn enumeration(spec: &EnumSpec, value: &Value, path: &str) -> Result<(), String> {
    let matches = spec
        .members
        .iter()
        .any(|m| &m.value == value || value.as_str() == Some(m.name.as_str()));
    if matches {
        return Ok(());
    }
    let allowed: Vec<String> = spec.members.iter().map(|m| m.value.to_string()).collect();
    Err(format!("{path}: {value} is not a member ({})", allowed.join(", ")))
}

/// Accepts columnar (`{column: [values]}`) or row (`[{column: value}]`) data.
fn tabular(schema: &TabularSchema, value: &Value, path: &str) -> Result<(), String> {
    let columns = match value {
        Value::Object(map) => map.clone(),
        Value::Array(rows) => rows_to_columns(rows, path)?,
        other => {
            return Err(format!(
                "{path}: expected columnar object or list of rows, got {}",
                kind_of(other)
            ))
        }
    };

    let mut length = None;
    for column in &schema.columns {
        let col_path = format!("{path}.{}", column.name);
        let Some(cells) = columns.get(&column.name) else {
            return Err(format!("{col_path}: column is missing"));
        };
        let Some(cells) = cells.as_array() else {
            return Err(format!("{col_path}: expected a list of values"));
        };
        match length {
            None => length = Some(cells.len()),
            Some(n) if n != cells.len() => {
                return Err(format!(
                    "{col_path}: has {} values, expected {n}",
                    cells.len()
                ))
            }
            Some(_) => {}
        }
        check_cells(column, cells, &col_path)?;
    }

    if let Some(index) = &schema.index {
        if let Some(Value::Array(cells)) = columns.get("index") {
            check_cells(index, cells, &format!("{path}.index"))?;
        }
    }

    if schema.strict {
        let allowed: HashSet<&str> = schema
            .columns
            .iter()
            .map(|c| c.name.as_str())
            .chain(schema.index.iter().map(|_| "index"))
            .chain(schema.index_levels.iter().map(|l| l.name.as_str()))
            .collect();
        if let Some(extra) = columns.keys().find(|k| !allowed.contains(k.as_str())) {
            return Err(format!("{path}: undeclared column '{extra}'"));
        }
    }
    Ok(())
}

fn rows_to_columns(rows: &[Value], path: &str) -> Result<Map<String, Value>, String> {
    let mut columns: Map<String, Value> = Map::new();
    for (i, row) in rows.iter().enumerate() {
        let Some(row) = row.as_object() else {
            return Err(format!("{path}[{i}]: expected a row object"));
        };
        for (name, cell) in row {
            if let Value::Array(cells) = columns
                .entry(name.clone())
                .or_insert_with(|| Value::Array(vec![Value::Null; i]))
            {
                cells.push(cell.clone());
            }
        }
        for cells in columns.values_mut() {
            if let Value::Array(cells) = cells {
                cells.resize(i + 1, Value::Null);
            }
        }
    }
    Ok(columns)
}

fn check_cells(column: &Column, cells: &[Value], path: &str) -> Result<(), String> {
    let mut seen = HashSet::new();
    for (i, cell) in cells.iter().enumerate() {
        if cell.is_null() {
            if !column.nullable {
                return Err(format!("{path}[{i}]: null in non-nullable column"));
            }
            continue;
        }
        if !dtype_accepts(&column.dtype, cell) {
            return Err(format!("{path}[{i}]: {cell} is not {}", column.dtype));
        }
        if !column.allowed.is_empty() && !column.allowed.contains(cell) {
            return Err(format!("{path}[{i}]: {cell} is not an allowed value"));
        }
        if column.unique && !seen.insert(cell.to_string()) {
            return Err(format!("{path}[{i}]: duplicate value {cell} in unique column"));
        }
    }
    Ok(())
}

fn dtype_accepts(dtype: &str, cell: &Value) -> bool {
    match dtype {
        d if d.starts_with("uint") => cell.is_u64(),
        d if d.starts_with("int") => cell.is_i64() || cell.is_u64(),
        d if d.starts_with("float") => cell.is_number(),
        "str" | "string" => cell.is_string(),
        "bool" | "boolean" => cell.is_boolean(),
        d if d.starts_with("datetime") || d.starts_with("timedelta") => {
            cell.is_string() || cell.is_number()
        }
        "category" => !cell.is_object() && !cell.is_array(),
        _ => true,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
