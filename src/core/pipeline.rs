//! Pipeline domain model

use crate::core::{
    error::{PipelineError, Result},
    graph::DependencyGraph,
    parameter::{validate_name, ParameterStore},
    step::{StepDescriptor, StepKind},
    value::{InputValue, ParameterType, Value},
};
use serde::{Deserialize, Serialize};

/// Deployment settings handed to the runner untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    #[serde(default)]
    pub region: Option<String>,

    /// Execution role identifier
    #[serde(default)]
    pub role: Option<String>,

    /// Storage bucket identifier
    #[serde(default)]
    pub bucket: Option<String>,
}

/// Run-time policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSettings {
    /// Keep running independent branches after a step fails
    pub continue_on_failure: bool,

    /// Wall-clock limit for the whole run
    pub timeout_secs: Option<u64>,
}

/// A validated pipeline: unique names, known references, acyclic
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub name: String,
    pub parameters: ParameterStore,
    pub environment: Environment,
    pub settings: RunSettings,
    steps: Vec<StepDescriptor>,
    graph: DependencyGraph,
    execution_order: Vec<String>,
}

impl Pipeline {
    pub fn builder(name: impl Into<String>) -> PipelineBuilder {
        PipelineBuilder::new(name)
    }

    /// Steps in declaration order
    pub fn steps(&self) -> &[StepDescriptor] {
        &self.steps
    }

    /// Get a step by name
    pub fn step(&self, name: &str) -> Option<&StepDescriptor> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Get execution order (topological sort)
    pub fn execution_order(&self) -> &[String] {
        &self.execution_order
    }

    /// Pipeline with no reference checks and no edges, run in declaration order
    #[cfg(test)]
    pub(crate) fn unchecked(
        name: &str,
        steps: Vec<StepDescriptor>,
        settings: RunSettings,
    ) -> Result<Self> {
        let detached: Vec<StepDescriptor> = steps
            .iter()
            .cloned()
            .map(|mut step| {
                step.inputs.clear();
                step
            })
            .collect();
        let graph = DependencyGraph::build(&detached)?;
        let execution_order = steps.iter().map(|s| s.name.clone()).collect();

        Ok(Self {
            name: name.to_string(),
            parameters: ParameterStore::new(),
            environment: Environment::default(),
            settings,
            steps,
            graph,
            execution_order,
        })
    }
}

/// Collects parameters and steps, then validates them into a [`Pipeline`]
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    name: String,
    parameters: ParameterStore,
    environment: Environment,
    settings: RunSettings,
    steps: Vec<StepDescriptor>,
}

impl PipelineBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: ParameterStore::new(),
            environment: Environment::default(),
            settings: RunSettings::default(),
            steps: Vec::new(),
        }
    }

    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn settings(mut self, settings: RunSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn define_parameter(
        &mut self,
        name: impl Into<String>,
        kind: ParameterType,
        default: Value,
    ) -> Result<()> {
        self.parameters.define(name, kind, default)
    }

    /// Declare a step. Nothing runs until the pipeline is executed.
    pub fn declare<I, O>(
        &mut self,
        name: impl Into<String>,
        kind: StepKind,
        inputs: I,
        outputs: O,
    ) -> Result<&mut StepDescriptor>
    where
        I: IntoIterator<Item = (String, InputValue)>,
        O: IntoIterator<Item = String>,
    {
        let mut step = StepDescriptor::new(name, kind);
        step.inputs.extend(inputs);
        step.outputs.extend(outputs);
        self.add_step(step)?;
        let last = self.steps.len() - 1;
        Ok(&mut self.steps[last])
    }

    /// Add a fully formed step
    pub fn add_step(&mut self, step: StepDescriptor) -> Result<()> {
        validate_name(&step.name)?;
        if self.steps.iter().any(|s| s.name == step.name) {
            return Err(PipelineError::DuplicateStep(step.name));
        }
        self.steps.push(step);
        Ok(())
    }

    /// Check references and compute the execution order
    pub fn build(self) -> Result<Pipeline> {
        for step in &self.steps {
            for reference in step.deferred_references() {
                let source = self
                    .steps
                    .iter()
                    .find(|s| s.name == reference.source_step)
                    .ok_or_else(|| PipelineError::UnknownStep {
                        step: step.name.clone(),
                        source_step: reference.source_step.clone(),
                    })?;
                if !source.outputs.contains(&reference.output_name) {
                    return Err(PipelineError::UnknownOutput {
                        step: step.name.clone(),
                        source_step: reference.source_step.clone(),
                        output: reference.output_name.clone(),
                    });
                }
            }
            for name in step.parameter_references() {
                if self.parameters.get(name).is_none() {
                    return Err(PipelineError::UnknownParameter(name.to_string()));
                }
            }
        }

        let graph = DependencyGraph::build(&self.steps)?;
        let execution_order = graph.topological_order()?;

        Ok(Pipeline {
            name: self.name,
            parameters: self.parameters,
            environment: self.environment,
            settings: self.settings,
            steps: self.steps,
            graph,
            execution_order,
        })
    }
}
