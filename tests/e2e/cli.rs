//! Tests that drive the built `specloom` binary

use serde_json::Value;
use std::path::Path;
use std::process::{Command, Output};

use super::helpers::{create_project, edit_spec};

fn specloom(cwd: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_specloom"))
        .args(args)
        .current_dir(cwd)
        .env("NO_COLOR", "1")
        .env_remove("SPECLOOM_LOG")
        .output()
        .expect("failed to run specloom")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_validate_accepts_fixture_spec() {
    let project = create_project().unwrap();
    let output = specloom(project.path(), &["validate", "spec.yaml"]);

    assert!(output.status.success(), "{}", stdout(&output));
    assert!(stdout(&output).contains("Spec 'test_pipeline' is valid"));
}

#[test]
fn test_validate_rejects_hyphenated_name() {
    let project = create_project().unwrap();
    edit_spec(project.path(), "name: test_pipeline", "name: test-pipeline").unwrap();
    let output = specloom(project.path(), &["validate", "spec.yaml"]);

    assert_eq!(output.status.code(), Some(1));
    let out = stdout(&output);
    assert!(out.contains("must not contain hyphens"), "{out}");
    assert!(out.contains("'test_pipeline'"), "{out}");
}

#[test]
fn test_validate_integrity_json() {
    let project = create_project().unwrap();
    let root = project.path().to_string_lossy().into_owned();
    let output = specloom(
        project.path(),
        &["validate-integrity", "spec.yaml", "--json", "--project-root", &root],
    );

    assert!(output.status.success(), "{}", stdout(&output));
    let report: Value = serde_json::from_str(&stdout(&output)).unwrap();
    let categories = report.as_object().unwrap();
    assert!(categories.contains_key("transform_functions"));
    assert!(categories.values().all(|v| v.as_array().is_some_and(|a| a.is_empty())));
}

#[test]
fn test_plan_prints_execution_plan() {
    let project = create_project().unwrap();
    let output = specloom(
        project.path(),
        &["plan", "config.yaml", "--check-implementations"],
    );

    assert!(output.status.success(), "{}", stdout(&output));
    let out = stdout(&output);
    assert!(out.contains("Execution plan:"));
    assert!(out.contains("process_text"));
}

#[test]
fn test_version() {
    let project = create_project().unwrap();
    let output = specloom(project.path(), &["version"]);
    assert!(output.status.success());
    assert!(stdout(&output).starts_with("specloom "));
}
