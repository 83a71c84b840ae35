//! Declared-versus-actual parameter comparison.

use std::collections::BTreeSet;
use std::fmt;

use super::probe::{ParamKind, ParamShape};

/// One way an implementation's parameters disagree with the declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureDiscrepancy {
    /// Declared but absent from the implementation.
    Missing(String),
    /// Present in the implementation but not declared.
    Unexpected { name: String, has_default: bool },
    /// Parameters present on both sides appear in a different order.
    Order { declared: Vec<String>, actual: Vec<String> },
    /// One side gives the parameter a default and the other doesn't.
    Default { name: String, declared_default: bool },
}

impl fmt::Display for SignatureDiscrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureDiscrepancy::Missing(name) => write!(f, "missing parameter '{name}'"),
            SignatureDiscrepancy::Unexpected { name, has_default: true } => {
                write!(f, "undeclared parameter '{name}' (has default)")
            }
            SignatureDiscrepancy::Unexpected { name, .. } => {
                write!(f, "undeclared parameter '{name}'")
            }
            SignatureDiscrepancy::Order { declared, actual } => write!(
                f,
                "parameter order differs: declared ({}), actual ({})",
                declared.join(", "),
                actual.join(", ")
            ),
            SignatureDiscrepancy::Default { name, declared_default: true } => {
                write!(f, "parameter '{name}' is declared with a default but required by the implementation")
            }
            SignatureDiscrepancy::Default { name, .. } => {
                write!(f, "parameter '{name}' is declared required but has a default in the implementation")
            }
        }
    }
}

/// Compare a declared parameter list against an implementation's, both in
/// call order.
///
/// Reports names missing on either side, then an order difference among
/// the names both sides share, then default-presence differences.
/// Variadic parameters are never reported themselves. A `**kwargs`
/// parameter absorbs every declared name the implementation doesn't list.
pub fn compare_signatures(declared: &[ParamShape], actual: &[ParamShape]) -> Vec<SignatureDiscrepancy> {
    let absorbs_keywords = actual.iter().any(|p| p.kind == ParamKind::VarKwargs);
    let named: Vec<&ParamShape> = actual.iter().filter(|p| !p.is_variadic()).collect();
    let actual_names: BTreeSet<&str> = named.iter().map(|p| p.name.as_str()).collect();
    let declared_names: BTreeSet<&str> = declared.iter().map(|p| p.name.as_str()).collect();

    let mut out = Vec::new();
    if !absorbs_keywords {
        for param in declared.iter().filter(|p| !actual_names.contains(p.name.as_str())) {
            out.push(SignatureDiscrepancy::Missing(param.name.clone()));
        }
    }
    for param in named.iter().filter(|p| !declared_names.contains(p.name.as_str())) {
        out.push(SignatureDiscrepancy::Unexpected {
            name: param.name.clone(),
            has_default: param.has_default,
        });
    }

    let shared_declared: Vec<String> = declared
        .iter()
        .filter(|p| actual_names.contains(p.name.as_str()))
        .map(|p| p.name.clone())
        .collect();
    let shared_actual: Vec<String> = named
        .iter()
        .filter(|p| declared_names.contains(p.name.as_str()))
        .map(|p| p.name.clone())
        .collect();
    if shared_declared != shared_actual {
        out.push(SignatureDiscrepancy::Order {
            declared: shared_declared,
            actual: shared_actual,
        });
    }

    for param in declared {
        if let Some(shape) = named.iter().find(|p| p.name == param.name) {
            if shape.has_default != param.has_default {
                out.push(SignatureDiscrepancy::Default {
                    name: param.name.clone(),
                    declared_default: param.has_default,
                });
            }
        }
    }
    out
}

/// Sorted parameter names as `['a', 'b']`.
pub fn format_names<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    let sorted: BTreeSet<&str> = names.into_iter().collect();
    let quoted: Vec<String> = sorted.iter().map(|n| format!("'{n}'")).collect();
    format!("[{}]", quoted.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(list: &[(&str, bool)]) -> Vec<ParamShape> {
        list.iter()
            .map(|(name, has_default)| ParamShape::positional(*name, *has_default))
            .collect()
    }

    fn declared() -> Vec<ParamShape> {
        params(&[("input_data", false), ("uppercase", true)])
    }

    #[test]
    fn test_matching_signature() {
        let actual = vec![
            ParamShape::positional("input_data", false),
            ParamShape::positional("uppercase", true),
        ];
        assert!(compare_signatures(&declared(), &actual).is_empty());
    }

    #[test]
    fn test_extra_parameter_is_reported() {
        let actual = vec![
            ParamShape::positional("input_data", false),
            ParamShape::positional("uppercase", true),
            ParamShape::positional("extra_param", false),
        ];
        let diffs = compare_signatures(&declared(), &actual);
        assert_eq!(
            diffs,
            vec![SignatureDiscrepancy::Unexpected {
                name: "extra_param".to_string(),
                has_default: false
            }]
        );
        assert_eq!(diffs[0].to_string(), "undeclared parameter 'extra_param'");
    }

    #[test]
    fn test_missing_parameter() {
        let actual = vec![ParamShape::positional("input_data", false)];
        let diffs = compare_signatures(&declared(), &actual);
        assert_eq!(diffs, vec![SignatureDiscrepancy::Missing("uppercase".to_string())]);
    }

    #[test]
    fn test_kwargs_absorbs_declared_names() {
        let actual = vec![
            ParamShape::positional("input_data", false),
            ParamShape {
                name: "options".to_string(),
                has_default: false,
                kind: ParamKind::VarKwargs,
            },
        ];
        assert!(compare_signatures(&declared(), &actual).is_empty());
    }

    #[test]
    fn test_reordered_parameters() {
        let actual = params(&[("uppercase", true), ("input_data", false)]);
        let diffs = compare_signatures(&declared(), &actual);
        assert_eq!(
            diffs,
            vec![SignatureDiscrepancy::Order {
                declared: vec!["input_data".to_string(), "uppercase".to_string()],
                actual: vec!["uppercase".to_string(), "input_data".to_string()],
            }]
        );
        assert_eq!(
            diffs[0].to_string(),
            "parameter order differs: declared (input_data, uppercase), actual (uppercase, input_data)"
        );
    }

    #[test]
    fn test_default_presence_differs() {
        let actual = params(&[("input_data", true), ("uppercase", false)]);
        let diffs = compare_signatures(&declared(), &actual);
        assert_eq!(
            diffs,
            vec![
                SignatureDiscrepancy::Default {
                    name: "input_data".to_string(),
                    declared_default: false
                },
                SignatureDiscrepancy::Default {
                    name: "uppercase".to_string(),
                    declared_default: true
                },
            ]
        );
        assert!(diffs[1].to_string().contains("required by the implementation"));
    }

    #[test]
    fn test_order_ignores_names_on_one_side_only() {
        let actual = params(&[("input_data", false), ("extra", true), ("uppercase", true)]);
        let diffs = compare_signatures(&declared(), &actual);
        assert_eq!(diffs.len(), 1);
        assert!(matches!(diffs[0], SignatureDiscrepancy::Unexpected { .. }));
    }

    #[test]
    fn test_format_names_sorted() {
        assert_eq!(format_names(["b", "a"]), "['a', 'b']");
        assert_eq!(format_names([]), "[]");
    }
}
