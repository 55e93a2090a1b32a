use crate::error::Result;

/// One turn of prior conversation fed to a completion call as history
///. Distinct from the chat transcript the pipeline
/// renders itself — this is for callers (e.g. a chat-completion wrapper)
/// that want memory-grounded context appended ahead of live history.
#[derive(Debug, Clone)]
pub struct HistoryTurn {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub project_id: String,
    pub system_prompt: Option<String>,
    pub prompt: String,
    pub history: Vec<HistoryTurn>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub json_mode: bool,
    pub extra_kwargs: serde_json::Value,
}

impl CompletionRequest {
    pub fn new(project_id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_system(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, t: f32) -> Self {
        self.temperature = Some(t);
        self
    }

    /// Tokens of `prompt + system_prompt + history.contents`.
    pub fn input_token_count(&self) -> usize {
        let mut text = self.prompt.clone();
        if let Some(sys) = &self.system_prompt {
            text.push(' ');
            text.push_str(sys);
        }
        for turn in &self.history {
            text.push(' ');
            text.push_str(&turn.content);
        }
        memoria_tokenizer::count_tokens(&text)
    }
}

#[derive(Debug, Clone)]
pub struct CompletionOutcome {
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedPhase {
    Query,
    Document,
}

#[derive(Debug, Clone)]
pub struct EmbedRequest {
    pub project_id: String,
    pub texts: Vec<String>,
    pub phase: EmbedPhase,
    pub model: Option<String>,
}

/// Completion + embedding adapter. Two provider backends plus
/// a scriptable stub implement this; callers (PromptPack-driven pipeline
/// stages, ContextAssembler) only ever see the trait.
#[async_trait::async_trait]
pub trait LlmGateway: Send + Sync {
    async fn complete(&self, req: CompletionRequest) -> Result<CompletionOutcome>;

    /// Normalizes provider output to a `len(texts) x dim` matrix. Callers
    /// that care about a specific dimension validate it themselves (e.g.
    /// `EventStore` against `embedding_dim`); the gateway's job is just to
    /// hand back one vector per input text, in order.
    async fn embed(&self, req: EmbedRequest) -> Result<Vec<Vec<f32>>>;
}
