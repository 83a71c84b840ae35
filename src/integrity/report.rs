//! Integrity findings grouped by category.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Report categories, in rendering order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    CheckFunctions,
    CheckLocations,
    TransformFunctions,
    TransformLocations,
    TransformSignatures,
    GeneratorFunctions,
    GeneratorLocations,
    GeneratorSignatures,
    ExampleSchemas,
    DatatypeDefinitions,
}

impl Category {
    pub const ALL: [Category; 10] = [
        Category::CheckFunctions,
        Category::CheckLocations,
        Category::TransformFunctions,
        Category::TransformLocations,
        Category::TransformSignatures,
        Category::GeneratorFunctions,
        Category::GeneratorLocations,
        Category::GeneratorSignatures,
        Category::ExampleSchemas,
        Category::DatatypeDefinitions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::CheckFunctions => "check_functions",
            Category::CheckLocations => "check_locations",
            Category::TransformFunctions => "transform_functions",
            Category::TransformLocations => "transform_locations",
            Category::TransformSignatures => "transform_signatures",
            Category::GeneratorFunctions => "generator_functions",
            Category::GeneratorLocations => "generator_locations",
            Category::GeneratorSignatures => "generator_signatures",
            Category::ExampleSchemas => "example_schemas",
            Category::DatatypeDefinitions => "datatype_definitions",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every category is always present, possibly empty. Entries keep the order
/// they were pushed in, which the checker pins to declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct IntegrityReport {
    entries: BTreeMap<Category, Vec<String>>,
}

impl Default for IntegrityReport {
    fn default() -> Self {
        Self {
            entries: Category::ALL.iter().map(|c| (*c, Vec::new())).collect(),
        }
    }
}

impl IntegrityReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, category: Category, message: impl Into<String>) {
        self.entries.entry(category).or_default().push(message.into());
    }

    pub fn entries(&self, category: Category) -> &[String] {
        self.entries.get(&category).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn categories(&self) -> impl Iterator<Item = (Category, &[String])> {
        self.entries.iter().map(|(c, e)| (*c, e.as_slice()))
    }

    pub fn total(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.total() == 0
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// SHA-256 over the canonical JSON rendering, hex encoded.
    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl fmt::Display for IntegrityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (category, entries) in self.categories() {
            if entries.is_empty() {
                continue;
            }
            writeln!(f, "{category} ({}):", entries.len())?;
            for entry in entries {
                let mut lines = entry.lines();
                if let Some(first) = lines.next() {
                    writeln!(f, "  - {first}")?;
                }
                for line in lines {
                    writeln!(f, "    {line}")?;
                }
            }
        }
        Ok(())
    }
}
