//! Integrity checks against an on-disk implementation tree

use serial_test::serial;
use specloom::integrity::{self, Category};
use specloom::spec;

use super::fixtures::PROCESSORS_PY;
use super::helpers::{create_project, edit_spec, load_project_spec, write_file};

#[test]
#[serial]
fn test_complete_tree_has_no_findings() {
    let project = create_project().unwrap();
    let ir = load_project_spec(project.path());
    let report = integrity::check(&ir, project.path()).unwrap();
    assert!(report.is_clean(), "unexpected findings:\n{report}");
}

#[test]
#[serial]
fn test_repeated_runs_are_identical() {
    let project = create_project().unwrap();
    write_file(
        project.path(),
        "apps/test_pipeline/generators/text_gen.py",
        "def something_else():\n    pass\n",
    )
    .unwrap();
    let ir = load_project_spec(project.path());

    let first = integrity::check(&ir, project.path()).unwrap();
    let second = integrity::check(&ir, project.path()).unwrap();
    assert!(!first.is_clean());
    assert_eq!(first.to_json(), second.to_json());
    assert_eq!(first.fingerprint(), second.fingerprint());
}

#[test]
#[serial]
fn test_removed_function_is_one_functions_entry() {
    let project = create_project().unwrap();
    let ir = load_project_spec(project.path());
    write_file(
        project.path(),
        "apps/test_pipeline/transforms/processors.py",
        "def unrelated(x):\n    return x\n",
    )
    .unwrap();

    let report = integrity::check(&ir, project.path()).unwrap();
    assert_eq!(report.total(), 1, "{report}");
    let entries = report.entries(Category::TransformFunctions);
    assert_eq!(entries.len(), 1);
    assert!(entries[0].contains("process_text"));
}

#[test]
#[serial]
fn test_edits_between_runs_are_observed() {
    let project = create_project().unwrap();
    let ir = load_project_spec(project.path());
    assert!(integrity::check(&ir, project.path()).unwrap().is_clean());

    write_file(
        project.path(),
        "apps/test_pipeline/transforms/processors.py",
        "def unrelated(x):\n    return x\n",
    )
    .unwrap();
    let report = integrity::check(&ir, project.path()).unwrap();
    assert_eq!(report.entries(Category::TransformFunctions).len(), 1);
}

#[test]
#[serial]
fn test_added_parameter_is_one_signature_entry() {
    let project = create_project().unwrap();
    let ir = load_project_spec(project.path());
    write_file(
        project.path(),
        "apps/test_pipeline/transforms/processors.py",
        &PROCESSORS_PY.replace(
            "uppercase: bool = False)",
            "uppercase: bool = False, extra_param: int = 0)",
        ),
    )
    .unwrap();

    let report = integrity::check(&ir, project.path()).unwrap();
    assert_eq!(report.total(), 1, "{report}");
    let entries = report.entries(Category::TransformSignatures);
    assert_eq!(entries.len(), 1);
    assert!(entries[0].contains("process_text"));
    assert!(entries[0].contains("extra_param"));
}

#[test]
#[serial]
fn test_swapped_parameters_are_one_signature_entry() {
    let project = create_project().unwrap();
    let ir = load_project_spec(project.path());
    write_file(
        project.path(),
        "apps/test_pipeline/transforms/processors.py",
        &PROCESSORS_PY.replace(
            "input_data: dict, uppercase: bool = False)",
            "uppercase: bool, input_data: dict)",
        ),
    )
    .unwrap();

    let report = integrity::check(&ir, project.path()).unwrap();
    let entries = report.entries(Category::TransformSignatures);
    assert_eq!(entries.len(), 1, "{report}");
    assert!(entries[0].contains("parameter order differs"));
    assert!(entries[0].contains("'uppercase' is declared with a default"));
}

#[test]
#[serial]
fn test_moved_function_behind_reexport_is_location_entry() {
    let project = create_project().unwrap();
    let ir = load_project_spec(project.path());
    write_file(
        project.path(),
        "apps/test_pipeline/transforms/text_ops.py",
        PROCESSORS_PY,
    )
    .unwrap();
    write_file(
        project.path(),
        "apps/test_pipeline/transforms/processors.py",
        "from .text_ops import process_text\n",
    )
    .unwrap();

    let report = integrity::check(&ir, project.path()).unwrap();
    assert!(report.entries(Category::TransformFunctions).is_empty());
    let locations = report.entries(Category::TransformLocations);
    assert_eq!(locations.len(), 1, "{report}");
    assert!(locations[0].contains("text_ops.py"));
}

#[test]
#[serial]
fn test_invalid_example_is_reported_not_raised() {
    let project = create_project().unwrap();
    edit_spec(project.path(), "      text: hello\n", "      txt: hello\n").unwrap();

    // Fails the strict load...
    assert!(spec::load(&project.path().join("spec.yaml")).is_err());

    // ...but integrity reports it as a finding.
    let ir = spec::load_unvalidated(&project.path().join("spec.yaml")).unwrap();
    let report = integrity::check(&ir, project.path()).unwrap();
    let examples = report.entries(Category::ExampleSchemas);
    assert_eq!(examples.len(), 1, "{report}");
    assert!(examples[0].contains("example_hello"));
    assert!(examples[0].contains("TextInput"));
}
