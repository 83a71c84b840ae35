//! Config planning and in-process execution

use serde_json::{json, Map, Value};
use serial_test::serial;
use specloom::error::{PlanError, RunError};
use specloom::integrity::SourceTreeProbe;
use specloom::plan::{ConfigPlanner, NativeRegistry, PlanRunner, Signature};
use specloom::spec::{self, document::DocumentFormat};

use super::helpers::{create_project, write_file};

fn text_registry() -> NativeRegistry {
    let mut registry = NativeRegistry::new();
    registry
        .register(
            "apps.test_pipeline.transforms.processors:process_text",
            Signature::new()
                .required("input_data")
                .optional("uppercase", json!(false)),
            |args: &Map<String, Value>| {
                let text = args["input_data"]["text"]
                    .as_str()
                    .ok_or_else(|| anyhow::anyhow!("input_data.text must be a string"))?;
                let text = if args["uppercase"] == json!(true) {
                    text.to_uppercase()
                } else {
                    text.to_string()
                };
                Ok(json!({"length": text.chars().count(), "processed": true}))
            },
        )
        .unwrap();
    registry
}

#[test]
#[serial]
fn test_process_text_end_to_end() {
    let project = create_project().unwrap();
    let planner = ConfigPlanner::from_path(&project.path().join("config.yaml")).unwrap();
    let registry = text_registry();

    let mut runner = PlanRunner::new(planner.ir(), planner.config(), &registry);
    let result = runner.run(json!({"text": "hello"})).unwrap();
    assert_eq!(result, json!({"length": 5, "processed": true}));
    assert_eq!(runner.log().len(), 2);
}

#[test]
#[serial]
fn test_plan_against_source_tree() {
    let project = create_project().unwrap();
    let planner = ConfigPlanner::from_path(&project.path().join("config.yaml")).unwrap();
    let probe = SourceTreeProbe::new(project.path(), "apps");

    let plan = planner.validate(Some(&probe)).unwrap();
    assert!(plan.valid);
    assert_eq!(plan.execution_plan.len(), 1);
    assert_eq!(plan.execution_plan[0].stage_id, "stage_1_process_text");
    assert_eq!(plan.execution_plan[0].transform_id, "process_text");
}

#[test]
#[serial]
fn test_unknown_override_fails_before_execution() {
    let project = create_project().unwrap();
    write_file(
        project.path(),
        "config.yaml",
        "meta:\n  base_spec: spec.yaml\noverrides:\n  process_text:\n    shout: true\n",
    )
    .unwrap();
    let planner = ConfigPlanner::from_path(&project.path().join("config.yaml")).unwrap();
    let registry = text_registry();

    let mut runner = PlanRunner::new(planner.ir(), planner.config(), &registry);
    let err = runner.run(json!({"text": "hello"})).unwrap_err();
    match err {
        RunError::Plan(PlanError::Config(e)) => {
            assert_eq!(e.problems, vec!["Transform 'process_text': unknown parameter 'shout'"]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(runner.log().is_empty());
}

#[test]
#[serial]
fn test_missing_base_spec_is_load_error() {
    let project = create_project().unwrap();
    write_file(project.path(), "config.yaml", "meta:\n  base_spec: nowhere.yaml\n").unwrap();
    let err = ConfigPlanner::from_path(&project.path().join("config.yaml")).unwrap_err();
    assert!(err.to_string().contains("nowhere.yaml"));
}

const LABEL_SPEC: &str = r#"
meta:
  name: labels
generators:
  - id: make_label
    impl: apps.labels.generators.names:make_label
    parameters:
      - name: prefix
        native: "builtins:str"
        default: test
"#;

fn label_registry() -> NativeRegistry {
    let mut registry = NativeRegistry::new();
    registry
        .register(
            "apps.labels.generators.names:make_label",
            Signature::new().optional("prefix", json!("native")),
            |args: &Map<String, Value>| Ok(json!(format!("{}_label", args["prefix"].as_str().unwrap_or("?")))),
        )
        .unwrap();
    registry
}

#[test]
#[serial]
fn test_generator_argument_precedence() {
    let registry = label_registry();
    let config = Default::default();

    let with_default = spec::load_str(LABEL_SPEC, DocumentFormat::Yaml).unwrap();
    let runner = PlanRunner::new(&with_default, &config, &registry);

    let mut overrides = Map::new();
    overrides.insert("prefix".to_string(), json!("custom"));
    assert_eq!(runner.generate("make_label", &overrides).unwrap(), json!("custom_label"));
    assert_eq!(runner.generate("make_label", &Map::new()).unwrap(), json!("test_label"));

    let without_default = spec::load_str(
        &LABEL_SPEC.replace("        default: test\n", ""),
        DocumentFormat::Yaml,
    )
    .unwrap();
    let runner = PlanRunner::new(&without_default, &config, &registry);
    assert_eq!(runner.generate("make_label", &Map::new()).unwrap(), json!("native_label"));
}
