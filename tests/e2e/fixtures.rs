//! Fixture documents and implementation sources

/// Text pipeline spec: one transform wired through a legacy `dag` edge.
pub const SPEC_YAML: &str = r#"version: "1"
meta:
  name: test_pipeline
  description: Text processing pipeline
checks:
  - id: check_text_length
    impl: apps.checks:check_text_length
    file_path: checks/text_checks.py
  - id: check_result_positive
    impl: apps.test_pipeline.checks.text_checks:check_result_positive
    file_path: checks/text_checks.py
examples:
  - id: example_hello
    datatype_ref: TextInput
    input:
      text: hello
    expected:
      length: 5
      processed: true
  - id: example_result
    input:
      length: 5
      processed: true
generators:
  - id: generate_text_input
    impl: apps.test_pipeline.generators.text_gen:generate_text_input
    file_path: generators/text_gen.py
    parameters:
      - name: uppercase
        native: "builtins:bool"
        default: false
    return_type_ref: TextInput
datatypes:
  - id: TextInput
    check_ids: [check_text_length]
    example_refs: [example_hello]
    generator_refs: [generate_text_input]
    schema:
      type: object
      properties:
        text:
          type: string
      required: [text]
  - id: TextResult
    check_ids: [check_result_positive]
    example_refs: [example_result]
    schema:
      type: object
      properties:
        length:
          type: integer
        processed:
          type: boolean
      required: [length, processed]
transforms:
  - id: process_text
    impl: apps.test_pipeline.transforms.processors:process_text
    file_path: transforms/processors.py
    parameters:
      - name: input_data
        datatype_ref: TextInput
      - name: uppercase
        native: "builtins:bool"
        default: false
    return_datatype_ref: TextResult
    default_args:
      uppercase: false
dag:
  - from: process_text
    to: null
"#;

/// Config running every stage with its defaults.
pub const CONFIG_YAML: &str = r#"version: "1"
meta:
  config_name: default_run
  description: Run the text pipeline with defaults
  base_spec: spec.yaml
execution:
  stages: []
"#;

pub const CHECKS_PY: &str = r#"def check_text_length(payload: dict) -> bool:
    return len(payload.get("text", "")) > 0


def check_result_positive(payload: dict) -> bool:
    return payload.get("length", 0) > 0
"#;

pub const PROCESSORS_PY: &str = r#"def process_text(input_data: dict, uppercase: bool = False) -> dict:
    text = input_data["text"]
    if uppercase:
        text = text.upper()
    return {"length": len(text), "processed": True}
"#;

pub const GENERATORS_PY: &str = r#"def generate_text_input(uppercase: bool = False) -> dict:
    return {"text": "HELLO" if uppercase else "hello"}
"#;
