//! Test: Parameters - defaults, overrides and type checking at launch

use crate::helpers::*;
use mlpipe::core::{PipelineError, Value};
use mlpipe::execution::SchedulingStrategy;
use mlpipe::runner::InMemoryRegistry;
use std::sync::Arc;

const PARAMETERIZED: &str = r#"
name: "Test: Parameters"
parameters:
  - { name: Epochs, type: integer, default: 10 }
  - { name: InstanceType, type: string, default: ml.m5.xlarge }
steps:
  - name: train
    kind: train
    inputs:
      epochs: { parameter: Epochs }
      instance: { parameter: InstanceType }
"#;

#[tokio::test]
async fn test_defaults_are_used_without_overrides() {
    let pipeline = pipeline_from_yaml(PARAMETERIZED);
    let runner = Arc::new(FakeRunner::new());
    let execution = run_pipeline_with_fake(&pipeline, runner.clone()).await;

    assert_run_succeeded(&execution);
    let request = runner.request("train").unwrap();
    assert_eq!(request.inputs.get("epochs"), Some(&Value::Integer(10)));
    assert_eq!(request.inputs.get("instance"), Some(&Value::from("ml.m5.xlarge")));
}

#[tokio::test]
async fn test_overrides_replace_defaults() {
    let pipeline = pipeline_from_yaml(PARAMETERIZED);
    let runner = Arc::new(FakeRunner::new());
    let execution = run_with(
        &pipeline,
        runner.clone(),
        Arc::new(InMemoryRegistry::new()),
        SchedulingStrategy::Sequential,
        &overrides(&[("Epochs", Value::Integer(25))]),
    )
    .await
    .unwrap();

    assert_run_succeeded(&execution);
    let request = runner.request("train").unwrap();
    assert_eq!(request.inputs.get("epochs"), Some(&Value::Integer(25)));
    assert_eq!(request.inputs.get("instance"), Some(&Value::from("ml.m5.xlarge")));
}

#[tokio::test]
async fn test_bad_overrides_fail_before_any_step_runs() {
    let pipeline = pipeline_from_yaml(PARAMETERIZED);
    let runner = Arc::new(FakeRunner::new());
    let err = run_with(
        &pipeline,
        runner.clone(),
        Arc::new(InMemoryRegistry::new()),
        SchedulingStrategy::Sequential,
        &overrides(&[("Epochs", Value::from("many")), ("Nope", Value::Integer(1))]),
    )
    .await
    .unwrap_err();

    match &err {
        PipelineError::ParameterResolution(causes) => {
            assert_eq!(causes.len(), 2);
            assert!(causes.iter().any(|e| matches!(e, PipelineError::TypeMismatch { name, .. } if name == "Epochs")));
            assert!(causes.contains(&PipelineError::UnknownParameter("Nope".to_string())));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(err.exit_code(), 3);
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_text_overrides_are_coerced() {
    let pipeline = pipeline_from_yaml(PARAMETERIZED);
    let overrides = pipeline
        .parameters
        .coerce_overrides(&[("Epochs".to_string(), "7".to_string())]);
    assert_eq!(overrides.get("Epochs"), Some(&Value::Integer(7)));
}

#[tokio::test]
async fn test_bad_text_overrides_fail_together() {
    let pipeline = pipeline_from_yaml(PARAMETERIZED);
    let runner = Arc::new(FakeRunner::new());
    let overrides = pipeline.parameters.coerce_overrides(&[
        ("Epochs".to_string(), "seven".to_string()),
        ("Nope".to_string(), "1".to_string()),
    ]);

    let err = run_with(
        &pipeline,
        runner.clone(),
        Arc::new(InMemoryRegistry::new()),
        SchedulingStrategy::Sequential,
        &overrides,
    )
    .await
    .unwrap_err();
    match &err {
        PipelineError::ParameterResolution(causes) => {
            assert_eq!(causes.len(), 2);
            assert!(causes.iter().any(|e| matches!(e, PipelineError::TypeMismatch { name, .. } if name == "Epochs")));
            assert!(causes.contains(&PipelineError::UnknownParameter("Nope".to_string())));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(err.exit_code(), 3);
    assert!(runner.calls().is_empty());
}
