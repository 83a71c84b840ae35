//! Naming and identifier rules shared by the builder, validator and locators.
//!
//! Project names become package path segments in the implementation tree,
//! so they must be valid identifiers. Hyphens are the common mistake and get
//! a dedicated error with an underscore rewrite.

use std::collections::HashSet;

use crate::error::ValidationError;

/// Maximum allowed length for entity IDs.
pub const MAX_ID_LENGTH: usize = 128;

/// Rewrites a hyphenated name into the underscore form that would be accepted.
pub fn suggest_identifier(name: &str) -> String {
    name.replace('-', "_")
}

/// Validates `meta.name`.
///
/// An empty name is accepted. Any hyphen is rejected and the error carries
/// the hyphen-to-underscore rewrite as a suggestion.
///
/// ```
/// use specloom::validation::validate_meta_name;
///
/// assert!(validate_meta_name("text_pipeline").is_ok());
/// assert!(validate_meta_name("").is_ok());
/// assert!(validate_meta_name("text-pipeline").is_err());
/// ```
pub fn validate_meta_name(name: &str) -> Result<(), ValidationError> {
    if name.contains('-') {
        return Err(ValidationError::InvalidName {
            value: name.to_string(),
            suggestion: suggest_identifier(name),
        });
    }
    Ok(())
}

/// Returns true when `s` is a non-empty identifier (letters, digits and
/// underscores, not starting with a digit).
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Validates an entity ID: non-empty, bounded, no whitespace.
pub fn validate_id(entity: &'static str, id: &str) -> Result<(), ValidationError> {
    if id.trim().is_empty() {
        return Err(ValidationError::MissingField {
            entity,
            id: id.to_string(),
            field: "id",
        });
    }

    if id.len() > MAX_ID_LENGTH {
        return Err(ValidationError::InvalidValue {
            entity,
            id: id.to_string(),
            field: "id".to_string(),
            reason: format!("{} characters (max {MAX_ID_LENGTH})", id.len()),
        });
    }

    if id.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidValue {
            entity,
            id: id.to_string(),
            field: "id".to_string(),
            reason: "must not contain whitespace".to_string(),
        });
    }

    Ok(())
}

/// Returns the first ID that appears more than once, in iteration order.
pub fn first_duplicate<'a, I>(ids: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    ids.into_iter().find(|id| !seen.insert(*id))
}

/// Ensures IDs in one category are unique.
pub fn ensure_unique<'a, I>(category: &'static str, ids: I) -> Result<(), ValidationError>
where
    I: IntoIterator<Item = &'a str>,
{
    match first_duplicate(ids) {
        Some(id) => Err(ValidationError::DuplicateId {
            category,
            id: id.to_string(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hyphenated_name_rejected_with_suggestion() {
        let err = validate_meta_name("my-cool-project").unwrap_err();
        match &err {
            ValidationError::InvalidName { value, suggestion } => {
                assert_eq!(value, "my-cool-project");
                assert_eq!(suggestion, "my_cool_project");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("'my_cool_project'"));
    }

    #[test]
    fn test_underscore_and_empty_names_accepted() {
        assert!(validate_meta_name("my_project").is_ok());
        assert!(validate_meta_name("").is_ok());
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("apps"));
        assert!(is_identifier("_private"));
        assert!(is_identifier("v2_checks"));
        assert!(!is_identifier("2fast"));
        assert!(!is_identifier("with-dash"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn test_validate_id() {
        assert!(validate_id("check", "check_positive").is_ok());
        assert!(validate_id("check", "").is_err());
        assert!(validate_id("check", "has space").is_err());
        assert!(validate_id("check", &"a".repeat(MAX_ID_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_first_duplicate() {
        assert_eq!(first_duplicate(["a", "b", "a", "b"]), Some("a"));
        assert_eq!(first_duplicate(["a", "b", "c"]), None);
        let err = ensure_unique("transform", ["t", "t"]).unwrap_err();
        assert_eq!(err.to_string(), "duplicate transform id 't'");
    }
}
