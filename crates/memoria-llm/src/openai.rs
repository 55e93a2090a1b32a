use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::error::{LlmError, Result};
use crate::gateway::{CompletionOutcome, CompletionRequest, EmbedPhase, EmbedRequest, LlmGateway};
use crate::json_salvage::extract_first_json_object;
use crate::usage::{NoopUsageSink, UsageSink};
use std::sync::Arc;

const COMPLETION_TIMEOUT: Duration = Duration::from_secs(120);
const EMBEDDING_TIMEOUT: Duration = Duration::from_secs(20);

/// A general OpenAI-chat-completions-compatible backend.
pub struct OpenAiCompatGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    default_model: String,
    default_embedding_model: String,
    usage: Arc<dyn UsageSink>,
}

impl OpenAiCompatGateway {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, api_key: impl Into<String>, default_model: impl Into<String>, default_embedding_model: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            default_model: default_model.into(),
            default_embedding_model: default_embedding_model.into(),
            usage: Arc::new(NoopUsageSink),
        }
    }

    pub fn with_usage_sink(mut self, usage: Arc<dyn UsageSink>) -> Self {
        self.usage = usage;
        self
    }

    fn messages_for(&self, req: &CompletionRequest) -> Vec<serde_json::Value> {
        let mut messages = Vec::new();
        if let Some(sys) = &req.system_prompt {
            messages.push(json!({"role": "system", "content": sys}));
        }
        for turn in &req.history {
            messages.push(json!({"role": turn.role, "content": turn.content}));
        }
        messages.push(json!({"role": "user", "content": req.prompt}));
        messages
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

#[async_trait::async_trait]
impl LlmGateway for OpenAiCompatGateway {
    async fn complete(&self, req: CompletionRequest) -> Result<CompletionOutcome> {
        let model = req.model.clone().unwrap_or_else(|| self.default_model.clone());
        let mut body = json!({
            "model": model,
            "messages": self.messages_for(&req),
        });
        if let Some(t) = req.temperature {
            body["temperature"] = json!(t);
        }
        if req.json_mode {
            body["response_format"] = json!({"type": "json_object"});
        }
        if let serde_json::Value::Object(extra) = &req.extra_kwargs {
            if let serde_json::Value::Object(obj) = &mut body {
                for (k, v) in extra {
                    obj.insert(k.clone(), v.clone());
                }
            }
        }

        let input_tokens = req.input_token_count();
        let response = tokio::time::timeout(
            COMPLETION_TIMEOUT,
            self.client
                .post(format!("{}/v1/chat/completions", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&body)
                .send(),
        )
        .await
        .map_err(|_| LlmError::Timeout(COMPLETION_TIMEOUT.as_millis() as u64))?
        .map_err(|e| LlmError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let msg = response.text().await.unwrap_or_default();
            return Err(LlmError::Unavailable(format!("{status}: {msg}")));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Unavailable(e.to_string()))?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        if req.json_mode && extract_first_json_object(&text).is_none() {
            return Err(LlmError::Unprocessable(format!(
                "response was not valid json: {text}"
            )));
        }

        let output_tokens = memoria_tokenizer::count_tokens(&text);
        self.usage.record_completion(&req.project_id, &model, input_tokens, output_tokens);

        Ok(CompletionOutcome {
            text,
            input_tokens,
            output_tokens,
        })
    }

    async fn embed(&self, req: EmbedRequest) -> Result<Vec<Vec<f32>>> {
        let model = req.model.clone().unwrap_or_else(|| self.default_embedding_model.clone());
        // OpenAI's embeddings endpoint has no query/document distinction;
        // `phase` is accepted for trait symmetry with the Jina backend.
        let _ = EmbedPhase::Query;
        let body = json!({
            "model": model,
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
            warn!(%status, %msg, "embedding provider returned an error");
            return Err(LlmError::Unavailable(format!("{status}: {msg}")));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Unavailable(e.to_string()))?;
        let vectors: Vec<Vec<f32>> = parsed.data.into_iter().map(|d| d.embedding).collect();

        let total_tokens: usize = req.texts.iter().map(|t| memoria_tokenizer::count_tokens(t)).sum();
        self.usage.record_embedding(&req.project_id, &model, total_tokens);

        Ok(vectors)
    }
}
