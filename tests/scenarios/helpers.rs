//! Test utility functions for mlpipe scenarios

use async_trait::async_trait;
use mlpipe::core::{
    config::PipelineConfig, Execution, ParameterOverrides, Pipeline, PipelineError, RunStatus,
    StepOutputs, StepState, Value,
};
use mlpipe::execution::{ExecutionEngine, SchedulingStrategy};
use mlpipe::runner::{InMemoryRegistry, RunnerError, StepRequest, StepRunner};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Runner with scripted per-step behavior
///
/// Unscripted steps succeed and produce `out = "<step>-out"`.
#[derive(Default)]
pub struct FakeRunner {
    outputs: HashMap<String, StepOutputs>,
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
    requests: Mutex<Vec<StepRequest>>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outputs(mut self, step: &str, outputs: &[(&str, Value)]) -> Self {
        let outputs = outputs
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        self.outputs.insert(step.to_string(), outputs);
        self
    }

    pub fn failing(mut self, step: &str) -> Self {
        self.failing.insert(step.to_string());
        self
    }

    pub fn with_delay(mut self, step: &str, delay: Duration) -> Self {
        self.delays.insert(step.to_string(), delay);
        self
    }

    /// Names of the steps the runner was asked to run, in call order
    pub fn calls(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.step_name.clone())
            .collect()
    }

    /// The request received for `step`
    pub fn request(&self, step: &str) -> Option<StepRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.step_name == step)
            .cloned()
    }

    /// Largest number of steps observed running at once
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StepRunner for FakeRunner {
    async fn run(&self, request: &StepRequest) -> Result<StepOutputs, RunnerError> {
        self.requests.lock().unwrap().push(request.clone());
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(active, Ordering::SeqCst);

        if let Some(delay) = self.delays.get(&request.step_name) {
            tokio::time::sleep(*delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(&request.step_name) {
            return Err(RunnerError::Exit {
                code: 1,
                stderr: format!("{} blew up", request.step_name),
            });
        }

        Ok(self.outputs.get(&request.step_name).cloned().unwrap_or_else(|| {
            let mut outputs = StepOutputs::new();
            outputs.insert(
                "out".to_string(),
                Value::from(format!("{}-out", request.step_name)),
            );
            outputs
        }))
    }
}

/// Build a pipeline from a YAML definition, panicking on errors
pub fn pipeline_from_yaml(yaml: &str) -> Pipeline {
    PipelineConfig::from_yaml(yaml)
        .and_then(|config| config.to_pipeline())
        .unwrap()
}

/// Run a pipeline with the given collaborators and strategy
pub async fn run_with(
    pipeline: &Pipeline,
    runner: Arc<FakeRunner>,
    registry: Arc<InMemoryRegistry>,
    strategy: SchedulingStrategy,
    overrides: &ParameterOverrides,
) -> Result<Execution, PipelineError> {
    let engine = ExecutionEngine::new(runner, registry, strategy);
    engine.run(pipeline, overrides).await
}

/// Run a pipeline sequentially with no parameter overrides
pub async fn run_pipeline_with_fake(pipeline: &Pipeline, runner: Arc<FakeRunner>) -> Execution {
    run_with(
        pipeline,
        runner,
        Arc::new(InMemoryRegistry::new()),
        SchedulingStrategy::Sequential,
        &ParameterOverrides::new(),
    )
    .await
    .unwrap()
}

pub fn overrides(entries: &[(&str, Value)]) -> ParameterOverrides {
    entries
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

pub fn assert_run_succeeded(execution: &Execution) {
    assert_eq!(
        execution.status,
        RunStatus::Succeeded,
        "expected run to succeed, primary error: {:?}",
        execution.primary_error()
    );
}

pub fn assert_run_failed(execution: &Execution) {
    assert_eq!(execution.status, RunStatus::Failed, "expected run to fail");
}

pub fn assert_step_succeeded(execution: &Execution, step: &str) {
    match execution.step_state(step) {
        Some(StepState::Succeeded { .. }) => {}
        other => panic!("expected step '{}' to succeed, got {:?}", step, other),
    }
}

/// Assert the step failed and its error message contains `contains`
pub fn assert_step_failed(execution: &Execution, step: &str, contains: &str) {
    match execution.step_state(step) {
        Some(StepState::Failed { error, .. }) => assert!(
            error.to_string().contains(contains),
            "step '{}' failed with '{}', expected it to mention '{}'",
            step,
            error,
            contains
        ),
        other => panic!("expected step '{}' to fail, got {:?}", step, other),
    }
}

pub fn assert_step_pending(execution: &Execution, step: &str) {
    assert_eq!(
        execution.step_state(step),
        Some(&StepState::Pending),
        "expected step '{}' to remain pending",
        step
    );
}

pub fn assert_completion_order(execution: &Execution, expected: &[&str]) {
    assert_eq!(execution.completion_order, expected);
}
