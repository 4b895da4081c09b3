//! mlpipe - run ML workflow pipelines as dependency-ordered steps

pub mod cli;
pub mod core;
pub mod execution;
pub mod persistence;
pub mod runner;

// Re-export commonly used types
pub use core::{
    Execution, Pipeline, PipelineBuilder, PipelineConfig, PipelineError, RunStatus, StepDescriptor,
    StepKind, StepState, Value,
};
pub use execution::{ExecutionEngine, ExecutionEvent, SchedulingStrategy};
pub use runner::{ArtifactRegistry, InMemoryRegistry, StepRunner, SubprocessRunner};
