//! LLMGateway + PromptPack: the sole collaborator that
//! speaks HTTP to a completion/embedding provider, and the bilingual
//! prompt builders the ChatFlusher pipeline drives through it.

pub mod embed_adapter;
pub mod error;
pub mod gateway;
pub mod jina;
pub mod json_salvage;
pub mod openai;
pub mod prompts;
pub mod stub;
pub mod usage;

pub use embed_adapter::LlmEventEmbedder;
pub use error::{LlmError, Result};
pub use gateway::{CompletionOutcome, CompletionRequest, EmbedPhase, EmbedRequest, HistoryTurn, LlmGateway};
pub use jina::JinaEmbeddingGateway;
pub use openai::OpenAiCompatGateway;
pub use stub::StubLlmGateway;
pub use usage::{NoopUsageSink, UsageSink};
