//! Test helper functions for E2E tests

use anyhow::{Context, Result};
use specloom::spec::{self, SpecIr};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use super::fixtures::{CHECKS_PY, CONFIG_YAML, GENERATORS_PY, PROCESSORS_PY, SPEC_YAML};

/// Write `content` to `root/rel`, creating parent directories.
pub fn write_file(root: &Path, rel: &str, content: &str) -> Result<PathBuf> {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

/// Creates a project with the text pipeline spec, config and a complete
/// implementation tree.
///
/// Returns a TempDir that must be kept in scope for the lifetime of the test
pub fn create_project() -> Result<TempDir> {
    let temp = TempDir::new().context("Failed to create temp directory")?;
    let root = temp.path();
    write_file(root, "spec.yaml", SPEC_YAML)?;
    write_file(root, "config.yaml", CONFIG_YAML)?;
    write_file(root, "apps/__init__.py", "")?;
    write_file(root, "apps/test_pipeline/__init__.py", "")?;
    write_file(root, "apps/test_pipeline/checks/__init__.py", "")?;
    write_file(root, "apps/test_pipeline/checks/text_checks.py", CHECKS_PY)?;
    write_file(root, "apps/test_pipeline/transforms/__init__.py", "")?;
    write_file(root, "apps/test_pipeline/transforms/processors.py", PROCESSORS_PY)?;
    write_file(root, "apps/test_pipeline/generators/__init__.py", "")?;
    write_file(root, "apps/test_pipeline/generators/text_gen.py", GENERATORS_PY)?;
    Ok(temp)
}

/// Load and validate the project's spec.
pub fn load_project_spec(root: &Path) -> SpecIr {
    spec::load(&root.join("spec.yaml")).expect("fixture spec should be valid")
}

/// Rewrite the project's spec through a text replacement.
pub fn edit_spec(root: &Path, from: &str, to: &str) -> Result<()> {
    let path = root.join("spec.yaml");
    let content = fs::read_to_string(&path)?;
    anyhow::ensure!(content.contains(from), "spec does not contain {from:?}");
    fs::write(&path, content.replace(from, to))?;
    Ok(())
}
