//! Test: Structural Errors - bad graphs are rejected before anything runs

use mlpipe::core::{config::PipelineConfig, InputValue, Pipeline, PipelineError, StepKind};

fn build(yaml: &str) -> Result<Pipeline, PipelineError> {
    PipelineConfig::from_yaml(yaml)?.to_pipeline()
}

#[test]
fn test_cycle_is_rejected() {
    let yaml = r#"
name: "Test: Cycle"
steps:
  - name: x
    kind: process
    inputs: { a: { step: y, output: out } }
    outputs: [out]
  - name: y
    kind: process
    inputs: { a: { step: x, output: out } }
    outputs: [out]
"#;
    let err = build(yaml).unwrap_err();
    assert_eq!(err, PipelineError::CyclicDependency { step: "x".to_string() });
    assert_eq!(err.exit_code(), 5);
}

#[test]
fn test_cycle_with_acyclic_prefix_names_a_cycle_member() {
    let yaml = r#"
name: "Test: Cycle Downstream"
steps:
  - name: p
    kind: process
    outputs: [out]
  - name: q
    kind: process
    inputs:
      a: { step: p, output: out }
      b: { step: r, output: out }
    outputs: [out]
  - name: r
    kind: process
    inputs: { a: { step: q, output: out } }
    outputs: [out]
"#;
    match build(yaml).unwrap_err() {
        PipelineError::CyclicDependency { step } => assert!(step == "q" || step == "r"),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_duplicate_step_is_rejected() {
    let mut builder = Pipeline::builder("dup");
    builder
        .declare("train", StepKind::Train, Vec::new(), Vec::<String>::new())
        .unwrap();
    let err = builder
        .declare("train", StepKind::Process, Vec::new(), Vec::<String>::new())
        .unwrap_err();
    assert_eq!(err, PipelineError::DuplicateStep("train".to_string()));
    assert_eq!(err.exit_code(), 4);
}

#[test]
fn test_unknown_step_and_output_are_rejected() {
    let mut builder = Pipeline::builder("refs");
    builder
        .declare(
            "train",
            StepKind::Train,
            vec![("data".to_string(), InputValue::deferred("ghost", "out"))],
            Vec::<String>::new(),
        )
        .unwrap();
    assert!(matches!(
        builder.build().unwrap_err(),
        PipelineError::UnknownStep { source_step, .. } if source_step == "ghost"
    ));

    let yaml = r#"
name: "Test: Unknown Output"
steps:
  - name: prep
    kind: process
    outputs: [train_data]
  - name: train
    kind: train
    inputs: { data: { step: prep, output: test_data } }
"#;
    assert!(matches!(
        build(yaml).unwrap_err(),
        PipelineError::UnknownOutput { output, .. } if output == "test_data"
    ));
}

#[test]
fn test_invalid_names_are_rejected() {
    let yaml = r#"
name: "Test: Names"
steps:
  - name: "1-bad step"
    kind: process
"#;
    assert!(matches!(build(yaml).unwrap_err(), PipelineError::InvalidName(_)));
}

#[test]
fn test_malformed_yaml_is_a_definition_error() {
    let err = build("name: [unterminated").unwrap_err();
    assert!(matches!(err, PipelineError::Definition(_)));
    assert_eq!(err.exit_code(), 1);
}

#[test]
fn test_order_is_deterministic() {
    let yaml = r#"
name: "Test: Determinism"
steps:
  - { name: d, kind: process, inputs: { x: { step: b, output: out } } }
  - { name: a, kind: process, outputs: [out] }
  - { name: b, kind: process, outputs: [out] }
  - { name: c, kind: process, inputs: { x: { step: a, output: out } } }
"#;
    let first = build(yaml).unwrap();
    for _ in 0..10 {
        assert_eq!(build(yaml).unwrap().execution_order(), first.execution_order());
    }
    assert_eq!(first.execution_order(), &["a", "b", "d", "c"]);
}
