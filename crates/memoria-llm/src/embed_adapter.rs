use std::sync::Arc;

use memoria_event::{EmbedPhase as EventEmbedPhase, EventEmbedder};

use crate::gateway::{EmbedPhase, EmbedRequest, LlmGateway};

/// Bridges `memoria-llm`'s `LlmGateway::embed` to the narrow
/// `memoria_event::EventEmbedder` seam `EventStore` depends on, so
/// `memoria-event` never has to know about HTTP providers.
pub struct LlmEventEmbedder {
    gateway: Arc<dyn LlmGateway>,
    project_id: String,
    model: Option<String>,
}

impl LlmEventEmbedder {
    pub fn new(gateway: Arc<dyn LlmGateway>, project_id: impl Into<String>, model: Option<String>) -> Self {
        Self {
            gateway,
            project_id: project_id.into(),
            model,
        }
    }
}

#[async_trait::async_trait]
impl EventEmbedder for LlmEventEmbedder {
    async fn embed(&self, text: &str, phase: EventEmbedPhase) -> std::result::Result<Vec<f32>, String> {
        let phase = match phase {
            EventEmbedPhase::Query => EmbedPhase::Query,
            EventEmbedPhase::Document => EmbedPhase::Document,
        };
        let mut vectors = self
            .gateway
            .embed(EmbedRequest {
                project_id: self.project_id.clone(),
                texts: vec![text.to_string()],
                phase,
                model: self.model.clone(),
            })
            .await
            .map_err(|e| e.to_string())?;
        vectors
            .pop()
            .ok_or_else(|| "embedding provider returned no vectors".to_string())
    }
}
