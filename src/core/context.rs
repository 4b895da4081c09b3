//! Resolution context - resolved parameters and outputs of finished steps

use crate::core::{
    error::{PipelineError, Result},
    step::{ExecutionTarget, StepDescriptor},
    value::{InputValue, Value},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outputs produced by one step
pub type StepOutputs = BTreeMap<String, Value>;

/// Execution target with every value bound
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedTarget {
    pub image_uri: Option<String>,
    pub instance_type: Option<Value>,
    pub instance_count: Option<Value>,
    pub command: Vec<String>,
    pub timeout_secs: Option<u64>,
}

/// Values available for substitution while a run is in progress
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolutionContext {
    /// Resolved launch parameters
    pub parameters: BTreeMap<String, Value>,

    /// Outputs from succeeded steps (step -> output -> value)
    pub step_outputs: BTreeMap<String, StepOutputs>,
}

impl ResolutionContext {
    pub fn new(parameters: BTreeMap<String, Value>) -> Self {
        Self {
            parameters,
            step_outputs: BTreeMap::new(),
        }
    }

    /// Record the outputs of a succeeded step
    pub fn set_step_outputs(&mut self, step: &str, outputs: StepOutputs) {
        self.step_outputs.insert(step.to_string(), outputs);
    }

    pub fn get_step_output(&self, step: &str, output: &str) -> Option<&Value> {
        self.step_outputs.get(step).and_then(|o| o.get(output))
    }

    /// Substitute a single input for `step`
    pub fn resolve(&self, step: &str, input: &InputValue) -> Result<Value> {
        match input {
            InputValue::Literal(value) => Ok(value.clone()),
            InputValue::Parameter(name) => self
                .parameters
                .get(name)
                .cloned()
                .ok_or_else(|| PipelineError::UnknownParameter(name.clone())),
            InputValue::Deferred(reference) => self
                .get_step_output(&reference.source_step, &reference.output_name)
                .cloned()
                .ok_or_else(|| PipelineError::UnresolvedReference {
                    step: step.to_string(),
                    reference: reference.to_string(),
                }),
        }
    }

    /// Substitute every input of a step
    pub fn resolve_inputs(&self, step: &StepDescriptor) -> Result<BTreeMap<String, Value>> {
        step.inputs
            .iter()
            .map(|(name, input)| Ok((name.clone(), self.resolve(&step.name, input)?)))
            .collect()
    }

    /// Bind the step's execution target
    pub fn resolve_target(&self, step: &str, target: &ExecutionTarget) -> Result<ResolvedTarget> {
        let bind = |value: &Option<InputValue>| -> Result<Option<Value>> {
            value.as_ref().map(|v| self.resolve(step, v)).transpose()
        };

        Ok(ResolvedTarget {
            image_uri: target.image_uri.clone(),
            instance_type: bind(&target.instance_type)?,
            instance_count: bind(&target.instance_count)?,
            command: target.command.clone(),
            timeout_secs: target.timeout_secs,
        })
    }
}
