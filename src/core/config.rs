//! Pipeline definition and parameter overrides from YAML

use crate::core::{
    error::{PipelineError, Result},
    parameter::ParameterOverrides,
    pipeline::{Environment, Pipeline, RunSettings},
    step::{ExecutionTarget, StepDescriptor, StepKind},
    value::{InputValue, ParameterType, Value},
};
use crate::execution::SchedulingStrategy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Top-level pipeline definition loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name
    pub name: String,

    /// Pipeline version (optional)
    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// Region, role and bucket passed through to the runner
    #[serde(default)]
    pub environment: Environment,

    #[serde(default)]
    pub settings: SettingsConfig,

    /// Launch-time parameters
    #[serde(default)]
    pub parameters: Vec<ParameterConfig>,

    /// Pipeline steps
    pub steps: Vec<StepConfig>,
}

/// Run settings as written in the definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsConfig {
    /// Keep running independent branches after a failure
    #[serde(default)]
    pub continue_on_failure: bool,

    /// Run-level timeout in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    #[serde(default)]
    pub strategy: StrategyConfig,

    /// Concurrency cap for `parallel_limited`
    #[serde(default)]
    pub max_concurrency: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyConfig {
    #[default]
    Sequential,
    Parallel,
    ParallelLimited,
}

/// Parameter declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterConfig {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: ParameterType,

    pub default: Value,
}

/// Step configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    /// Unique step name
    pub name: String,

    pub kind: StepKind,

    /// Optional step description
    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub inputs: BTreeMap<String, InputConfig>,

    /// Outputs the step promises to produce
    #[serde(default)]
    pub outputs: Vec<String>,

    #[serde(default)]
    pub target: TargetConfig,
}

/// An input value: a scalar literal, `{ step, output }` or `{ parameter }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputConfig {
    Deferred { step: String, output: String },
    Parameter { parameter: String },
    Literal(Value),
}

impl From<&InputConfig> for InputValue {
    fn from(config: &InputConfig) -> Self {
        match config {
            InputConfig::Deferred { step, output } => InputValue::deferred(step.as_str(), output.as_str()),
            InputConfig::Parameter { parameter } => InputValue::parameter(parameter.as_str()),
            InputConfig::Literal(value) => InputValue::Literal(value.clone()),
        }
    }
}

/// Execution target configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetConfig {
    #[serde(default)]
    pub image_uri: Option<String>,

    #[serde(default)]
    pub instance_type: Option<InputConfig>,

    #[serde(default)]
    pub instance_count: Option<InputConfig>,

    /// Command overriding the runner's default program
    #[serde(default)]
    pub command: Vec<String>,

    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl PipelineConfig {
    /// Load pipeline configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Definition(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    /// Parse pipeline configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| PipelineError::Definition(e.to_string()))
    }

    /// Validate the definition by building it
    pub fn validate(&self) -> Result<()> {
        self.to_pipeline().map(|_| ())
    }

    /// Convert config to a validated Pipeline
    pub fn to_pipeline(&self) -> Result<Pipeline> {
        let mut builder = Pipeline::builder(&self.name)
            .environment(self.environment.clone())
            .settings(RunSettings {
                continue_on_failure: self.settings.continue_on_failure,
                timeout_secs: self.settings.timeout_secs,
            });

        for parameter in &self.parameters {
            builder.define_parameter(&parameter.name, parameter.kind, parameter.default.clone())?;
        }

        for step in &self.steps {
            builder.add_step(step.to_descriptor())?;
        }

        builder.build()
    }

    /// Scheduling strategy requested by the definition
    pub fn strategy(&self) -> SchedulingStrategy {
        match self.settings.strategy {
            StrategyConfig::Sequential => SchedulingStrategy::Sequential,
            StrategyConfig::Parallel => SchedulingStrategy::Parallel,
            StrategyConfig::ParallelLimited => {
                SchedulingStrategy::LimitedParallel(self.settings.max_concurrency.unwrap_or(4).max(1))
            }
        }
    }
}

impl StepConfig {
    fn to_descriptor(&self) -> StepDescriptor {
        let mut step = StepDescriptor::new(&self.name, self.kind).with_target(ExecutionTarget {
            image_uri: self.target.image_uri.clone(),
            instance_type: self.target.instance_type.as_ref().map(InputValue::from),
            instance_count: self.target.instance_count.as_ref().map(InputValue::from),
            command: self.target.command.clone(),
            timeout_secs: self.target.timeout_secs,
        });
        for (name, input) in &self.inputs {
            step = step.with_input(name.as_str(), InputValue::from(input));
        }
        for output in &self.outputs {
            step = step.with_output(output.as_str());
        }
        step
    }
}

/// Load parameter overrides: a flat YAML map of name to scalar
pub fn load_overrides<P: AsRef<Path>>(path: P) -> Result<ParameterOverrides> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        PipelineError::Definition(format!("cannot read {}: {}", path.display(), e))
    })?;
    if content.trim().is_empty() {
        return Ok(ParameterOverrides::new());
    }
    serde_yaml::from_str(&content).map_err(|e| PipelineError::Definition(e.to_string()))
}
