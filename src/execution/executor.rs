//! Step executor - dispatches one step to the runner or the registry

use crate::{
    core::{PipelineError, StepKind, StepOutputs, Value, MODEL_DATA_INPUT, REGISTRATION_ID_OUTPUT},
    runner::{ArtifactRegistry, RegistrationRequest, RunnerError, StepRequest, StepRunner},
};
use std::collections::BTreeSet;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

/// Executes a single, fully resolved step
pub struct StepExecutor<R, G> {
    runner: R,
    registry: G,
}

impl<R: StepRunner, G: ArtifactRegistry> StepExecutor<R, G> {
    pub fn new(runner: R, registry: G) -> Self {
        Self { runner, registry }
    }

    /// Run the step and check its outputs against what it declared
    pub async fn execute(
        &self,
        request: StepRequest,
        declared: &BTreeSet<String>,
    ) -> Result<StepOutputs, PipelineError> {
        let step = request.step_name.clone();
        info!("Executing step: {} ({})", step, request.kind);
        debug!("Resolved inputs for step {}: {:?}", step, request.inputs);

        let result = match request.target.timeout_secs {
            Some(secs) => match timeout(Duration::from_secs(secs), self.dispatch(&request)).await {
                Ok(result) => result,
                Err(_) => Err(RunnerError::Timeout(secs)),
            },
            None => self.dispatch(&request).await,
        };

        let produced = result.map_err(|e| PipelineError::StepExecution {
            step: step.clone(),
            cause: e.to_string(),
        })?;

        Self::check_outputs(&step, produced, declared)
    }

    async fn dispatch(&self, request: &StepRequest) -> Result<StepOutputs, RunnerError> {
        match request.kind {
            StepKind::Register => {
                let registration = Self::registration_request(request)?;
                let id = self.registry.register(&registration).await?;
                let mut outputs = StepOutputs::new();
                outputs.insert(REGISTRATION_ID_OUTPUT.to_string(), Value::String(id));
                Ok(outputs)
            }
            StepKind::Process | StepKind::Train | StepKind::CreateArtifact => {
                self.runner.run(request).await
            }
        }
    }

    fn registration_request(request: &StepRequest) -> Result<RegistrationRequest, RunnerError> {
        let mut metadata = request.inputs.clone();
        let model_data = metadata.remove(MODEL_DATA_INPUT).ok_or_else(|| {
            RunnerError::Rejected(format!("missing '{}' input", MODEL_DATA_INPUT))
        })?;

        Ok(RegistrationRequest {
            pipeline_name: request.pipeline_name.clone(),
            step_name: request.step_name.clone(),
            model_data,
            metadata,
        })
    }

    /// Keep declared outputs only; a missing declared output fails the step
    fn check_outputs(
        step: &str,
        mut produced: StepOutputs,
        declared: &BTreeSet<String>,
    ) -> Result<StepOutputs, PipelineError> {
        if let Some(missing) = declared.iter().find(|name| !produced.contains_key(*name)) {
            return Err(PipelineError::StepExecution {
                step: step.to_string(),
                cause: format!("missing declared output '{}'", missing),
            });
        }

        let extra: Vec<String> = produced
            .keys()
            .filter(|name| !declared.contains(*name))
            .cloned()
            .collect();
        for name in extra {
            warn!("Step {} produced undeclared output '{}', ignoring it", step, name);
            produced.remove(&name);
        }

        Ok(produced)
    }
}
