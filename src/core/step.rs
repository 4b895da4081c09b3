//! Step domain model

use crate::core::value::{DeferredReference, InputValue};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Output recorded by every `Register` step
pub const REGISTRATION_ID_OUTPUT: &str = "registration_id";

/// Input naming the artifact a `Register` step hands to the registry
pub const MODEL_DATA_INPUT: &str = "model_data";

/// What kind of work a step performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Data preprocessing script
    Process,
    /// Model training job
    Train,
    /// Package a trained artifact into a deployable model
    CreateArtifact,
    /// Register a model artifact with the artifact registry
    Register,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepKind::Process => "process",
            StepKind::Train => "train",
            StepKind::CreateArtifact => "create_artifact",
            StepKind::Register => "register",
        };
        write!(f, "{}", s)
    }
}

/// Where and how a step runs. Opaque to the core apart from value resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionTarget {
    /// Container image reference
    pub image_uri: Option<String>,

    /// Instance type, possibly bound to a launch parameter
    pub instance_type: Option<InputValue>,

    /// Instance count, possibly bound to a launch parameter
    pub instance_count: Option<InputValue>,

    /// Command to execute in place of the runner's default program
    pub command: Vec<String>,

    /// Per-step timeout
    pub timeout_secs: Option<u64>,
}

impl ExecutionTarget {
    fn values(&self) -> impl Iterator<Item = &InputValue> {
        self.instance_type.iter().chain(self.instance_count.iter())
    }
}

/// A single unit of pipeline work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDescriptor {
    /// Unique step name
    pub name: String,

    pub kind: StepKind,

    /// Named inputs, literal or deferred
    pub inputs: BTreeMap<String, InputValue>,

    /// Names of the outputs this step promises to produce
    pub outputs: BTreeSet<String>,

    pub target: ExecutionTarget,
}

impl StepDescriptor {
    pub fn new(name: impl Into<String>, kind: StepKind) -> Self {
        let mut outputs = BTreeSet::new();
        if kind == StepKind::Register {
            outputs.insert(REGISTRATION_ID_OUTPUT.to_string());
        }
        Self {
            name: name.into(),
            kind,
            inputs: BTreeMap::new(),
            outputs,
            target: ExecutionTarget::default(),
        }
    }

    pub fn with_input(mut self, name: impl Into<String>, value: impl Into<InputValue>) -> Self {
        self.inputs.insert(name.into(), value.into());
        self
    }

    pub fn with_output(mut self, name: impl Into<String>) -> Self {
        self.outputs.insert(name.into());
        self
    }

    pub fn with_target(mut self, target: ExecutionTarget) -> Self {
        self.target = target;
        self
    }

    /// Every input value the step carries, including the execution target's
    pub fn all_values(&self) -> impl Iterator<Item = &InputValue> {
        self.inputs.values().chain(self.target.values())
    }

    /// Deferred references found among the step's inputs
    pub fn deferred_references(&self) -> impl Iterator<Item = &DeferredReference> {
        self.all_values().filter_map(InputValue::as_deferred)
    }

    /// Names of the steps whose outputs this step consumes, deduplicated
    pub fn upstream_steps(&self) -> BTreeSet<&str> {
        self.deferred_references()
            .map(|r| r.source_step.as_str())
            .collect()
    }

    /// Launch parameters referenced by the step
    pub fn parameter_references(&self) -> impl Iterator<Item = &str> {
        self.all_values().filter_map(|v| match v {
            InputValue::Parameter(name) => Some(name.as_str()),
            _ => None,
        })
    }
}
