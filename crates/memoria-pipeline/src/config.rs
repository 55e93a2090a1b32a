use memoria_core::config::EffectiveConfig;

use crate::error::Result;

/// Seam between the pipeline and whatever resolves a project's effective
/// profile configuration (global defaults merged with the project's stored
/// `profile_config`). Kept as a trait so `memoria-pipeline`
/// never has to know how projects are persisted — `memoria-server` supplies
/// the real implementation backed by its project table.
#[async_trait::async_trait]
pub trait ProjectConfigProvider: Send + Sync {
    async fn resolve(&self, project_id: &str) -> Result<EffectiveConfig>;
}

/// Fixed-config provider for tests and single-tenant deployments that never
/// override the global defaults per project.
pub struct StaticConfigProvider(pub EffectiveConfig);

#[async_trait::async_trait]
impl ProjectConfigProvider for StaticConfigProvider {
    async fn resolve(&self, _project_id: &str) -> Result<EffectiveConfig> {
        Ok(self.0.clone())
    }
}
