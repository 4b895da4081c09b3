//! Requests handed to collaborators and their error type

use crate::core::{Environment, ResolvedTarget, StepKind, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

/// Error types for runner and registry operations
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to start step process: {0}")]
    Spawn(String),

    #[error("step process exited with code {code}: {stderr}")]
    Exit { code: i32, stderr: String },

    #[error("timeout after {0} seconds")]
    Timeout(u64),

    #[error("invalid step output: {0}")]
    InvalidOutput(String),

    #[error("no command configured for step '{0}'")]
    NotConfigured(String),

    #[error("registration rejected: {0}")]
    Rejected(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Everything a runner needs to execute one step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRequest {
    pub execution_id: Uuid,
    pub pipeline_name: String,
    pub step_name: String,
    pub kind: StepKind,

    /// Inputs with parameters and deferred references substituted
    pub inputs: BTreeMap<String, Value>,

    pub target: ResolvedTarget,
    pub environment: Environment,
}

/// A model artifact to register
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationRequest {
    pub pipeline_name: String,
    pub step_name: String,

    /// Artifact reference, usually the training step's model artifacts
    pub model_data: Value,

    /// Remaining step inputs, e.g. `model_package_group` or `approval_status`
    pub metadata: BTreeMap<String, Value>,
}

impl RegistrationRequest {
    /// Group the artifact is registered under
    pub fn model_package_group(&self) -> String {
        self.metadata
            .get("model_package_group")
            .map(|v| v.to_string())
            .unwrap_or_else(|| format!("{}-model-group", self.pipeline_name))
    }
}
