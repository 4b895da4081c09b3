//! External collaborators: the step runner and the artifact registry

pub mod config;
pub mod registry;
pub mod request;
pub mod subprocess;

use async_trait::async_trait;
use crate::core::StepOutputs;
pub use config::RunnerConfig;
pub use registry::InMemoryRegistry;
pub use request::{RegistrationRequest, RunnerError, StepRequest};
pub use subprocess::SubprocessRunner;

/// Runs a step's logic on its execution target
#[async_trait]
pub trait StepRunner: Send + Sync {
    /// Run the step and return the outputs it produced
    async fn run(&self, request: &StepRequest) -> Result<StepOutputs, RunnerError>;
}

/// Registers model artifacts
#[async_trait]
pub trait ArtifactRegistry: Send + Sync {
    /// Register an artifact and return its registration identifier
    async fn register(&self, request: &RegistrationRequest) -> Result<String, RunnerError>;
}

#[async_trait]
impl<T: StepRunner + ?Sized> StepRunner for std::sync::Arc<T> {
    async fn run(&self, request: &StepRequest) -> Result<StepOutputs, RunnerError> {
        (**self).run(request).await
    }
}

#[async_trait]
impl<T: ArtifactRegistry + ?Sized> ArtifactRegistry for std::sync::Arc<T> {
    async fn register(&self, request: &RegistrationRequest) -> Result<String, RunnerError> {
        (**self).register(request).await
    }
}
