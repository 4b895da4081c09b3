//! Test: Failure Handling - failed steps block their descendants

use crate::helpers::*;
use mlpipe::core::{ParameterOverrides, StepState};
use mlpipe::execution::SchedulingStrategy;
use mlpipe::runner::InMemoryRegistry;
use std::sync::Arc;

const CHAIN: &str = r#"
name: "Test: Failure"
steps:
  - name: A
    kind: process
    outputs: [out]
  - name: B
    kind: train
    inputs: { data: { step: A, output: out } }
    outputs: [out]
  - name: C
    kind: create_artifact
    inputs: { model: { step: B, output: out } }
"#;

#[tokio::test]
async fn test_failure_stops_downstream_steps() {
    let pipeline = pipeline_from_yaml(CHAIN);
    let runner = Arc::new(FakeRunner::new().failing("A"));
    let execution = run_pipeline_with_fake(&pipeline, runner.clone()).await;

    assert_run_failed(&execution);
    assert_step_failed(&execution, "A", "A blew up");
    assert_step_pending(&execution, "B");
    assert_step_pending(&execution, "C");
    assert_eq!(runner.calls(), vec!["A"]);
    assert_eq!(execution.primary_error().unwrap().exit_code(), 2);
}

const BRANCHES: &str = r#"
name: "Test: Branches"
steps:
  - name: flaky
    kind: process
    outputs: [out]
  - name: after_flaky
    kind: train
    inputs: { data: { step: flaky, output: out } }
  - name: independent
    kind: process
    outputs: [out]
  - name: after_independent
    kind: train
    inputs: { data: { step: independent, output: out } }
"#;

#[tokio::test]
async fn test_failure_halts_independent_branches_by_default() {
    let pipeline = pipeline_from_yaml(BRANCHES);
    let runner = Arc::new(FakeRunner::new().failing("flaky"));
    let execution = run_pipeline_with_fake(&pipeline, runner.clone()).await;

    assert_run_failed(&execution);
    assert_step_failed(&execution, "flaky", "blew up");
    assert_step_pending(&execution, "after_flaky");
    assert_step_pending(&execution, "independent");
    assert_step_pending(&execution, "after_independent");
    assert_eq!(runner.calls(), vec!["flaky"]);
}

#[tokio::test]
async fn test_continue_on_failure_runs_independent_branches() {
    let yaml = BRANCHES.replace(
        "name: \"Test: Branches\"",
        "name: \"Test: Branches\"\nsettings: { continue_on_failure: true }",
    );
    let pipeline = pipeline_from_yaml(&yaml);
    let runner = Arc::new(FakeRunner::new().failing("flaky"));
    let execution = run_pipeline_with_fake(&pipeline, runner.clone()).await;

    assert_run_failed(&execution);
    assert_step_failed(&execution, "flaky", "blew up");
    assert_step_pending(&execution, "after_flaky");
    assert_step_succeeded(&execution, "independent");
    assert_step_succeeded(&execution, "after_independent");
    assert!(!runner.calls().contains(&"after_flaky".to_string()));
}

#[tokio::test]
async fn test_running_steps_are_joined_after_a_failure() {
    let pipeline = pipeline_from_yaml(BRANCHES);
    let runner = Arc::new(
        FakeRunner::new()
            .failing("flaky")
            .with_delay("independent", std::time::Duration::from_millis(200)),
    );
    let execution = run_with(
        &pipeline,
        runner,
        Arc::new(InMemoryRegistry::new()),
        SchedulingStrategy::Parallel,
        &ParameterOverrides::new(),
    )
    .await
    .unwrap();

    assert_run_failed(&execution);
    assert_step_succeeded(&execution, "independent");
    assert_step_pending(&execution, "after_independent");
    assert!(execution
        .steps
        .iter()
        .all(|s| !matches!(s.state, StepState::Running { .. })));
}

#[tokio::test]
async fn test_missing_declared_output_fails_step() {
    let yaml = r#"
name: "Test: Missing Output"
steps:
  - name: train
    kind: train
    outputs: [model_artifacts]
"#;
    let pipeline = pipeline_from_yaml(yaml);
    let execution = run_pipeline_with_fake(&pipeline, Arc::new(FakeRunner::new())).await;

    assert_run_failed(&execution);
    assert_step_failed(&execution, "train", "missing declared output 'model_artifacts'");
}
