//! Test: ML Pipeline - preprocess, train, package and register a model

use crate::helpers::*;
use mlpipe::core::Value;
use mlpipe::execution::SchedulingStrategy;
use mlpipe::runner::InMemoryRegistry;
use std::sync::Arc;

const ML_PIPELINE: &str = r#"
name: churn
environment: { region: us-west-2, bucket: ml-artifacts }
parameters:
  - { name: ProcessingInstanceCount, type: integer, default: 1 }
  - { name: TrainingInstanceType, type: string, default: ml.m5.xlarge }
  - { name: ModelApprovalStatus, type: string, default: PendingManualApproval }
steps:
  - name: Preprocessing
    kind: process
    inputs: { code: scripts/preprocess.py }
    outputs: [train_data, validation_data]
    target:
      instance_type: ml.m5.xlarge
      instance_count: { parameter: ProcessingInstanceCount }
  - name: TrainModel
    kind: train
    inputs:
      train: { step: Preprocessing, output: train_data }
      validation: { step: Preprocessing, output: validation_data }
    outputs: [model_artifacts]
    target:
      instance_type: { parameter: TrainingInstanceType }
  - name: CreateModelForRegistration
    kind: create_artifact
    inputs:
      model_data: { step: TrainModel, output: model_artifacts }
    outputs: [model_name]
  - name: RegisterModel
    kind: register
    inputs:
      model_data: { step: TrainModel, output: model_artifacts }
      model_name: { step: CreateModelForRegistration, output: model_name }
      model_package_group: churn-models
      approval_status: { parameter: ModelApprovalStatus }
"#;

fn ml_runner() -> FakeRunner {
    FakeRunner::new()
        .with_outputs(
            "Preprocessing",
            &[
                ("train_data", Value::from("s3://ml-artifacts/train")),
                ("validation_data", Value::from("s3://ml-artifacts/validation")),
            ],
        )
        .with_outputs(
            "TrainModel",
            &[("model_artifacts", Value::from("s3://ml-artifacts/model.tar.gz"))],
        )
        .with_outputs("CreateModelForRegistration", &[("model_name", Value::from("churn-model"))])
}

#[tokio::test]
async fn test_register_step_records_registration_id() {
    let pipeline = pipeline_from_yaml(ML_PIPELINE);
    let runner = Arc::new(ml_runner());
    let registry = Arc::new(InMemoryRegistry::new());

    let execution = run_with(
        &pipeline,
        runner.clone(),
        registry.clone(),
        SchedulingStrategy::Sequential,
        &overrides(&[("ModelApprovalStatus", Value::from("Approved"))]),
    )
    .await
    .unwrap();

    assert_run_succeeded(&execution);
    assert_completion_order(
        &execution,
        &["Preprocessing", "TrainModel", "CreateModelForRegistration", "RegisterModel"],
    );
    assert_eq!(
        execution.outputs("RegisterModel").unwrap().get("registration_id"),
        Some(&Value::from("churn-models/1"))
    );

    // The registry, not the runner, handles register steps
    assert!(!runner.calls().contains(&"RegisterModel".to_string()));
    let versions = registry.versions("churn-models").await;
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].model_data, Value::from("s3://ml-artifacts/model.tar.gz"));
    assert_eq!(versions[0].approval_status, "Approved");
}

#[tokio::test]
async fn test_targets_and_environment_reach_the_runner() {
    let pipeline = pipeline_from_yaml(ML_PIPELINE);
    let runner = Arc::new(ml_runner());

    let execution = run_with(
        &pipeline,
        runner.clone(),
        Arc::new(InMemoryRegistry::new()),
        SchedulingStrategy::Sequential,
        &overrides(&[("ProcessingInstanceCount", Value::Integer(3))]),
    )
    .await
    .unwrap();
    assert_run_succeeded(&execution);

    let preprocessing = runner.request("Preprocessing").unwrap();
    assert_eq!(preprocessing.target.instance_count, Some(Value::Integer(3)));
    assert_eq!(preprocessing.environment.region.as_deref(), Some("us-west-2"));
    assert_eq!(preprocessing.inputs.get("code"), Some(&Value::from("scripts/preprocess.py")));

    let training = runner.request("TrainModel").unwrap();
    assert_eq!(training.target.instance_type, Some(Value::from("ml.m5.xlarge")));
    assert_eq!(
        training.inputs.get("validation"),
        Some(&Value::from("s3://ml-artifacts/validation"))
    );
    assert_eq!(training.execution_id, execution.execution_id);
}

#[tokio::test]
async fn test_second_run_registers_new_version() {
    let pipeline = pipeline_from_yaml(ML_PIPELINE);
    let registry = Arc::new(InMemoryRegistry::new());

    for expected in ["churn-models/1", "churn-models/2"] {
        let execution = run_with(
            &pipeline,
            Arc::new(ml_runner()),
            registry.clone(),
            SchedulingStrategy::Sequential,
            &overrides(&[]),
        )
        .await
        .unwrap();
        assert_eq!(
            execution.outputs("RegisterModel").unwrap().get("registration_id"),
            Some(&Value::from(expected))
        );
    }
}

#[test]
fn test_demo_definition_is_valid() {
    let pipeline = pipeline_from_yaml(include_str!("../../demos/churn.yaml"));
    assert_eq!(
        pipeline.execution_order(),
        &["Preprocessing", "TrainModel", "CreateModelForRegistration", "RegisterModel"]
    );
    assert_eq!(pipeline.settings.timeout_secs, Some(3600));
}
