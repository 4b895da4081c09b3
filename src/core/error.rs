//! Pipeline error taxonomy

use crate::core::value::ParameterType;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while defining or running a pipeline
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineError {
    #[error("parameter '{0}' is already defined")]
    DuplicateParameter(String),

    #[error("parameter '{name}' expects {expected} but got {found}")]
    TypeMismatch {
        name: String,
        expected: ParameterType,
        found: String,
    },

    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),

    #[error("invalid name '{0}': must start with a letter and contain only letters, digits, '-' or '_' (max 64)")]
    InvalidName(String),

    #[error("step '{0}' is already declared")]
    DuplicateStep(String),

    #[error("step '{step}' references unknown step '{source_step}'")]
    UnknownStep { step: String, source_step: String },

    #[error("step '{step}' references output '{output}' which step '{source_step}' does not declare")]
    UnknownOutput {
        step: String,
        source_step: String,
        output: String,
    },

    #[error("cycle detected in dependency graph involving step '{step}'")]
    CyclicDependency { step: String },

    #[error("failed to resolve parameters: {}", format_causes(.0))]
    ParameterResolution(Vec<PipelineError>),

    #[error("step '{step}' input refers to '{reference}' which is not available yet")]
    UnresolvedReference { step: String, reference: String },

    #[error("step '{step}' failed: {cause}")]
    StepExecution { step: String, cause: String },

    #[error("run timed out after {0} seconds")]
    Timeout(u64),

    #[error("invalid pipeline definition: {0}")]
    Definition(String),
}

fn format_causes(causes: &[PipelineError]) -> String {
    causes
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl PipelineError {
    /// Process exit code for this kind of error
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::Definition(_) => 1,
            PipelineError::StepExecution { .. } => 2,
            PipelineError::DuplicateParameter(_)
            | PipelineError::TypeMismatch { .. }
            | PipelineError::UnknownParameter(_)
            | PipelineError::ParameterResolution(_) => 3,
            PipelineError::DuplicateStep(_)
            | PipelineError::UnknownStep { .. }
            | PipelineError::UnknownOutput { .. }
            | PipelineError::InvalidName(_) => 4,
            PipelineError::CyclicDependency { .. } => 5,
            PipelineError::UnresolvedReference { .. } => 6,
            PipelineError::Timeout(_) => 7,
        }
    }

    /// True for errors found before any step runs
    pub fn is_structural(&self) -> bool {
        !matches!(
            self,
            PipelineError::StepExecution { .. }
                | PipelineError::UnresolvedReference { .. }
                | PipelineError::Timeout(_)
        )
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
