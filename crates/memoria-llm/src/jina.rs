use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

use crate::error::{LlmError, Result};
use crate::gateway::{CompletionOutcome, CompletionRequest, EmbedPhase, EmbedRequest, LlmGateway};
use crate::usage::{NoopUsageSink, UsageSink};

const EMBEDDING_TIMEOUT: Duration = Duration::from_secs(20);

/// Jina-style embedding HTTP backend. Embeddings-only: Jina
/// distinguishes `query` vs `document` embedding tasks, unlike the plain
/// OpenAI endpoint, so its `task` field is set from `EmbedRequest::phase`.
/// `complete` is unimplemented — this backend is selected only as the
/// embedding half of `ProvidersConfig`, paired with an `OpenAiCompatGateway`
/// for completions.
pub struct JinaEmbeddingGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    default_model: String,
    usage: Arc<dyn UsageSink>,
}

impl JinaEmbeddingGateway {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, api_key: impl Into<String>, default_model: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            default_model: default_model.into(),
            usage: Arc::new(NoopUsageSink),
        }
    }

    pub fn with_usage_sink(mut self, usage: Arc<dyn UsageSink>) -> Self {
        self.usage = usage;
        self
    }
}

#[derive(Deserialize)]
struct JinaEmbeddingResponse {
    data: Vec<JinaEmbeddingDatum>,
}

#[derive(Deserialize)]
struct JinaEmbeddingDatum {
    embedding: Vec<f32>,
}

#[async_trait::async_trait]
impl LlmGateway for JinaEmbeddingGateway {
    async fn complete(&self, _req: CompletionRequest) -> Result<CompletionOutcome> {
        Err(LlmError::Unavailable(
            "the Jina backend only provides embeddings".to_string(),
        ))
    }

    async fn embed(&self, req: EmbedRequest) -> Result<Vec<Vec<f32>>> {
        let model = req.model.clone().unwrap_or_else(|| self.default_model.clone());
        let task = match req.phase {
            EmbedPhase::Query => "retrieval.query",
            EmbedPhase::Document => "retrieval.passage",
        };
        let body = json!({
            "model": model,
            "task": task,
            "input": req.texts,
        });
        let response = tokio::time::timeout(
            EMBEDDING_TIMEOUT,
            self.client
                .post(format!("{}/v1/embeddings", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&body)
                .send(),
        )
        .await
        .map_err(|_| LlmError::Timeout(EMBEDDING_TIMEOUT.as_millis() as u64))?
        .map_err(|e| LlmError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let msg = response.text().await.unwrap_or_default();
            return Err(LlmError::Unavailable(format!("{status}: {msg}")));
        }

        let parsed: JinaEmbeddingResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Unavailable(e.to_string()))?;
        let vectors = parsed.data.into_iter().map(|d| d.embedding).collect();

        let total_tokens: usize = req.texts.iter().map(|t| memoria_tokenizer::count_tokens(t)).sum();
        self.usage.record_embedding(&req.project_id, &model, total_tokens);

        Ok(vectors)
    }
}
