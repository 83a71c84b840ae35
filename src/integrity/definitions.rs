//! Datatype definitions in the implementation tree.
//!
//! Enumerations, records and aliases have source-level counterparts under
//! `<apps package>.<app>.datatypes.{enums,models,type_aliases}`. Their presence and
//! declared members are compared against the spec.

use serde_json::{Number, Value};
use std::collections::{BTreeSet, HashMap};

use super::report::{Category, IntegrityReport};
use super::signature::format_names;
use super::source::{ClassMember, SourceTreeProbe};
use crate::error::IntegrityProbeError;
use crate::spec::ir::{DataType, DataTypeKind, DefinitionKind, EnumSpec, RecordSpec};
use crate::spec::locator::apps_package;
use crate::spec::SpecIr;

/// Source-level lookups needed for definition checks.
pub trait DefinitionProbe: Sync {
    fn module_exists(&self, module: &str) -> Result<bool, IntegrityProbeError>;

    /// Body members of class `name` defined in `module`.
    fn class_members(
        &self,
        module: &str,
        name: &str,
    ) -> Result<Option<Vec<ClassMember>>, IntegrityProbeError>;

    fn has_binding(&self, module: &str, name: &str) -> Result<bool, IntegrityProbeError>;
}

impl DefinitionProbe for SourceTreeProbe {
    fn module_exists(&self, module: &str) -> Result<bool, IntegrityProbeError> {
        Ok(self.module(module)?.is_some())
    }

    fn class_members(
        &self,
        module: &str,
        name: &str,
    ) -> Result<Option<Vec<ClassMember>>, IntegrityProbeError> {
        SourceTreeProbe::class_members(self, module, name)
    }

    fn has_binding(&self, module: &str, name: &str) -> Result<bool, IntegrityProbeError> {
        SourceTreeProbe::has_binding(self, module, name)
    }
}

/// Append `datatype_definitions` entries for every datatype with a
/// source-level counterpart. Modules are named from `apps_dir`.
pub fn check_definitions(
    ir: &SpecIr,
    apps_dir: &str,
    probe: &dyn DefinitionProbe,
    report: &mut IntegrityReport,
) -> Result<(), IntegrityProbeError> {
    let app = match apps_package(apps_dir) {
        prefix if prefix.is_empty() => ir.app_package(),
        prefix => format!("{prefix}.{}", ir.app_package()),
    };
    let mut modules: HashMap<DefinitionKind, bool> = HashMap::new();

    for datatype in &ir.datatypes {
        let Some(kind) = datatype.definition else {
            continue;
        };
        let module = format!("{app}.datatypes.{}", kind.module());
        let exists = match modules.get(&kind) {
            Some(exists) => *exists,
            None => {
                let exists = probe.module_exists(&module)?;
                if !exists {
                    report.push(
                        Category::DatatypeDefinitions,
                        format!("Failed to import datatype module '{module}': module not found"),
                    );
                }
                modules.insert(kind, exists);
                exists
            }
        };
        if !exists {
            continue;
        }

        for message in definition_problems(datatype, kind, &module, probe)? {
            report.push(Category::DatatypeDefinitions, message);
        }
    }
    Ok(())
}

fn definition_problems(
    datatype: &DataType,
    kind: DefinitionKind,
    module: &str,
    probe: &dyn DefinitionProbe,
) -> Result<Vec<String>, IntegrityProbeError> {
    let id = &datatype.id;
    match (kind, &datatype.kind) {
        (DefinitionKind::Enums, DataTypeKind::Enumeration(spec)) => {
            Ok(match probe.class_members(module, id)? {
                Some(members) => enum_problems(id, spec, &members),
                None => vec![format!("DataType '{id}' enum class not found in enums module")],
            })
        }
        (DefinitionKind::Models, DataTypeKind::Record(spec)) => {
            Ok(match probe.class_members(module, id)? {
                Some(members) => model_problems(id, spec, &members),
                None => vec![format!("DataType '{id}' model class not found in models module")],
            })
        }
        (DefinitionKind::TypeAliases, _) => Ok(if probe.has_binding(module, id)? {
            Vec::new()
        } else {
            vec![format!("DataType '{id}' type alias not found in type_aliases module")]
        }),
        _ => Ok(Vec::new()),
    }
}

fn enum_problems(id: &str, spec: &EnumSpec, members: &[ClassMember]) -> Vec<String> {
    let expected: Vec<(&str, &Value)> = spec.members.iter().map(|m| (m.name.as_str(), &m.value)).collect();
    let names_match = expected.len() == members.len()
        && expected.iter().zip(members).all(|((name, _), actual)| *name == actual.name);
    let values_match = expected.iter().zip(members).all(|((_, value), actual)| {
        match actual.value.as_deref().and_then(python_literal) {
            Some(actual) => values_equal(value, &actual),
            // Computed values (`auto()` and friends) aren't compared.
            None => true,
        }
    });
    if names_match && values_match {
        return Vec::new();
    }

    let render_expected: Vec<String> = expected.iter().map(|(n, v)| format!("('{n}', {v})")).collect();
    let render_actual: Vec<String> = members
        .iter()
        .map(|m| format!("('{}', {})", m.name, m.value.as_deref().unwrap_or("?")))
        .collect();
    vec![format!(
        "DataType '{id}' enum members mismatch:\n    Expected: [{}]\n    Actual:   [{}]",
        render_expected.join(", "),
        render_actual.join(", ")
    )]
}

fn model_problems(id: &str, spec: &RecordSpec, members: &[ClassMember]) -> Vec<String> {
    let mut problems = Vec::new();
    let expected: BTreeSet<&str> = spec.fields.iter().map(|f| f.name.as_str()).collect();
    let actual: BTreeSet<&str> = members.iter().map(|m| m.name.as_str()).collect();

    let missing: Vec<&str> = expected.difference(&actual).copied().collect();
    if !missing.is_empty() {
        problems.push(format!("DataType '{id}' missing fields: {}", format_names(missing)));
    }
    let extra: Vec<&str> = actual.difference(&expected).copied().collect();
    if !extra.is_empty() {
        problems.push(format!(
            "DataType '{id}' has extra fields not in spec: {}",
            format_names(extra)
        ));
    }

    for field in &spec.fields {
        let Some(member) = members.iter().find(|m| m.name == field.name) else {
            continue;
        };
        let name = &field.name;
        if member.annotation.is_none() {
            problems.push(format!("DataType '{id}' field '{name}' missing type annotation"));
        }
        let actual_default = member.value.as_deref().map(field_default);
        match (&field.default, actual_default) {
            (Some(expected), None) => problems.push(format!(
                "DataType '{id}' field '{name}' expected default {expected}, but is required"
            )),
            (Some(expected), Some(Some(actual))) if !values_equal(expected, &actual) => {
                problems.push(format!(
                    "DataType '{id}' field '{name}' default mismatch:\n    Expected: {expected}\n    Actual:   {actual}"
                ))
            }
            (None, None) if !field.required => {
                problems.push(format!("DataType '{id}' field '{name}' expected to be optional"))
            }
            (None, Some(_)) if field.required => {
                problems.push(format!("DataType '{id}' field '{name}' should be required"))
            }
            _ => {}
        }
    }
    problems
}

/// Literal default of a field assignment; `Field(default, ...)` unwraps to
/// its first argument. `None` inside means the default isn't a literal.
fn field_default(text: &str) -> Option<Value> {
    let text = text.trim();
    if let Some(args) = text.strip_prefix("Field(").and_then(|t| t.strip_suffix(')')) {
        let first = args.split(',').next().unwrap_or_default().trim();
        if first.is_empty() || first.contains('=') {
            return None;
        }
        return python_literal(first);
    }
    python_literal(text)
}

/// Evaluate a Python scalar literal.
pub fn python_literal(text: &str) -> Option<Value> {
    let text = text.trim();
    match text {
        "None" => return Some(Value::Null),
        "True" => return Some(Value::Bool(true)),
        "False" => return Some(Value::Bool(false)),
        _ => {}
    }
    for quote in ['"', '\''] {
        if let Some(inner) = text.strip_prefix(quote).and_then(|t| t.strip_suffix(quote)) {
            if !inner.contains(quote) {
                return Some(Value::String(inner.to_string()));
            }
        }
    }
    if let Ok(i) = text.parse::<i64>() {
        return Some(Value::from(i));
    }
    text.parse::<f64>().ok().and_then(Number::from_f64).map(Value::Number)
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn member(name: &str, annotation: Option<&str>, value: Option<&str>) -> ClassMember {
        ClassMember {
            name: name.to_string(),
            annotation: annotation.map(str::to_string),
            value: value.map(str::to_string),
        }
    }

    #[test]
    fn test_python_literal() {
        assert_eq!(python_literal("'red'"), Some(json!("red")));
        assert_eq!(python_literal("\"red\""), Some(json!("red")));
        assert_eq!(python_literal("3"), Some(json!(3)));
        assert_eq!(python_literal("2.5"), Some(json!(2.5)));
        assert_eq!(python_literal("None"), Some(Value::Null));
        assert_eq!(python_literal("auto()"), None);
    }

    #[test]
    fn test_field_default_unwraps_field_call() {
        assert_eq!(field_default("Field(5, ge=0)"), Some(json!(5)));
        assert_eq!(field_default("Field(default_factory=list)"), None);
        assert_eq!(field_default("False"), Some(json!(false)));
    }

    #[test]
    fn test_model_problems() {
        let ir = crate::spec::builder::build(
            json!({
                "meta": {"name": "demo"},
                "datatypes": [{
                    "id": "Point",
                    "pydantic_model": {"fields": [
                        {"name": "x", "type": {"native": "builtins:float"}, "required": true},
                        {"name": "label", "type": {"native": "builtins:str"}, "required": false},
                        {"name": "scale", "type": {"native": "builtins:int"}, "required": false, "default": 1}
                    ]}
                }]
            }),
            None,
        )
        .unwrap();
        let DataTypeKind::Record(spec) = &ir.datatypes[0].kind else {
            panic!("expected record");
        };

        let good = [
            member("x", Some("float"), None),
            member("label", Some("str | None"), Some("None")),
            member("scale", Some("int"), Some("1")),
        ];
        assert!(model_problems("Point", spec, &good).is_empty());

        let bad = [
            member("x", Some("float"), Some("0.0")),
            member("scale", Some("int"), Some("2")),
            member("extra", Some("int"), None),
        ];
        let problems = model_problems("Point", spec, &bad);
        assert_eq!(problems[0], "DataType 'Point' missing fields: ['label']");
        assert_eq!(problems[1], "DataType 'Point' has extra fields not in spec: ['extra']");
        assert!(problems.iter().any(|p| p == "DataType 'Point' field 'x' should be required"));
        assert!(problems.iter().any(|p| p.contains("field 'scale' default mismatch")));
    }
}
