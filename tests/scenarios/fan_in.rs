//! Test: Fan-in - a join step waits for every upstream branch

use crate::helpers::*;
use mlpipe::core::ParameterOverrides;
use mlpipe::execution::SchedulingStrategy;
use mlpipe::runner::InMemoryRegistry;
use std::sync::Arc;
use std::time::Duration;

const FAN_IN: &str = r#"
name: "Test: Fan-in"
steps:
  - name: A
    kind: process
    outputs: [out]
  - name: B
    kind: process
    outputs: [out]
  - name: C
    kind: train
    inputs:
      left: { step: A, output: out }
      right: { step: B, output: out }
"#;

#[tokio::test]
async fn test_sequential_join_runs_last() {
    let pipeline = pipeline_from_yaml(FAN_IN);
    let execution = run_pipeline_with_fake(&pipeline, Arc::new(FakeRunner::new())).await;

    assert_run_succeeded(&execution);
    assert_eq!(execution.completion_order.last().map(String::as_str), Some("C"));
    assert_completion_order(&execution, &["A", "B", "C"]);
}

#[tokio::test]
async fn test_parallel_branches_overlap() {
    let pipeline = pipeline_from_yaml(FAN_IN);
    let runner = Arc::new(
        FakeRunner::new()
            .with_delay("A", Duration::from_millis(200))
            .with_delay("B", Duration::from_millis(50)),
    );
    let execution = run_with(
        &pipeline,
        runner.clone(),
        Arc::new(InMemoryRegistry::new()),
        SchedulingStrategy::Parallel,
        &ParameterOverrides::new(),
    )
    .await
    .unwrap();

    assert_run_succeeded(&execution);
    assert_eq!(runner.peak_concurrency(), 2);
    assert_completion_order(&execution, &["B", "A", "C"]);

    let request = runner.request("C").unwrap();
    assert_eq!(request.inputs.len(), 2);
}

#[tokio::test]
async fn test_limited_parallelism_caps_running_steps() {
    let yaml = r#"
name: "Test: Limited"
steps:
  - { name: s1, kind: process }
  - { name: s2, kind: process }
  - { name: s3, kind: process }
  - { name: s4, kind: process }
"#;
    let pipeline = pipeline_from_yaml(yaml);
    let mut runner = FakeRunner::new();
    for step in ["s1", "s2", "s3", "s4"] {
        runner = runner.with_delay(step, Duration::from_millis(50));
    }
    let runner = Arc::new(runner);

    let execution = run_with(
        &pipeline,
        runner.clone(),
        Arc::new(InMemoryRegistry::new()),
        SchedulingStrategy::LimitedParallel(2),
        &ParameterOverrides::new(),
    )
    .await
    .unwrap();

    assert_run_succeeded(&execution);
    assert_eq!(runner.calls().len(), 4);
    assert!(runner.peak_concurrency() <= 2);
}
