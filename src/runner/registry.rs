//! In-memory artifact registry

use crate::core::Value;
use crate::runner::{ArtifactRegistry, RegistrationRequest, RunnerError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::info;

/// A registered model package
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredArtifact {
    pub registration_id: String,
    pub group: String,
    pub version: u32,
    pub model_data: Value,
    pub approval_status: String,
}

/// Registry that keeps versioned model packages in memory
///
/// Identifiers have the form `<group>/<version>`, versions counting from 1
/// per model package group.
#[derive(Default)]
pub struct InMemoryRegistry {
    groups: RwLock<HashMap<String, Vec<RegisteredArtifact>>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// All versions registered under `group`
    pub async fn versions(&self, group: &str) -> Vec<RegisteredArtifact> {
        self.groups
            .read()
            .await
            .get(group)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ArtifactRegistry for InMemoryRegistry {
    async fn register(&self, request: &RegistrationRequest) -> Result<String, RunnerError> {
        if request.model_data.to_string().trim().is_empty() {
            return Err(RunnerError::Rejected(format!(
                "step '{}' supplied an empty model artifact",
                request.step_name
            )));
        }

        let group = request.model_package_group();
        let approval_status = request
            .metadata
            .get("approval_status")
            .map(|v| v.to_string())
            .unwrap_or_else(|| "PendingManualApproval".to_string());

        let mut groups = self.groups.write().await;
        let versions = groups.entry(group.clone()).or_default();
        let version = versions.len() as u32 + 1;
        let registration_id = format!("{}/{}", group, version);

        versions.push(RegisteredArtifact {
            registration_id: registration_id.clone(),
            group,
            version,
            model_data: request.model_data.clone(),
            approval_status,
        });

        info!("Registered {} from step {}", registration_id, request.step_name);
        Ok(registration_id)
    }
}
