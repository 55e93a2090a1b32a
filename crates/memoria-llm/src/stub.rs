use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::{LlmError, Result};
use crate::gateway::{CompletionOutcome, CompletionRequest, EmbedRequest, LlmGateway};

/// Scriptable test double: queue up canned completions/embeddings and they
/// are handed out in FIFO order as the pipeline calls through its stages.
#[derive(Default)]
pub struct StubLlmGateway {
    completions: Mutex<VecDeque<String>>,
    embeddings: Mutex<VecDeque<Vec<Vec<f32>>>>,
}

impl StubLlmGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_completion(&self, text: impl Into<String>) {
        self.completions.lock().unwrap().push_back(text.into());
    }

    pub fn push_embedding(&self, vectors: Vec<Vec<f32>>) {
        self.embeddings.lock().unwrap().push_back(vectors);
    }
}

#[async_trait::async_trait]
impl LlmGateway for StubLlmGateway {
    async fn complete(&self, req: CompletionRequest) -> Result<CompletionOutcome> {
        let text = self
            .completions
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LlmError::Unavailable("no stubbed completion queued".to_string()))?;
        let input_tokens = req.input_token_count();
        let output_tokens = memoria_tokenizer::count_tokens(&text);
        Ok(CompletionOutcome {
            text,
            input_tokens,
            output_tokens,
        })
    }

    async fn embed(&self, req: EmbedRequest) -> Result<Vec<Vec<f32>>> {
        if let Some(vectors) = self.embeddings.lock().unwrap().pop_front() {
            return Ok(vectors);
        }
        // Deterministic fallback so tests that don't care about embedding
        // content still get a stable, non-degenerate vector per text.
        Ok(req
            .texts
            .iter()
            .map(|t| {
                let seed = t.len() as f32;
                (0..8).map(|i| (seed + i as f32).sin()).collect()
            })
            .collect())
    }
}
