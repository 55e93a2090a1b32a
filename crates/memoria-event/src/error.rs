use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("event not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("event search requires embeddings to be enabled")]
    EmbeddingDisabled,

    #[error("embedding provider failed: {0}")]
    EmbeddingFailed(String),
}

impl From<EventError> for memoria_core::MemoriaError {
    fn from(e: EventError) -> Self {
        match e {
            EventError::Database(err) => memoria_core::MemoriaError::Database(err.to_string()),
            EventError::NotFound(id) => memoria_core::MemoriaError::NotFound(id),
            EventError::Serialization(err) => memoria_core::MemoriaError::Serialization(err),
            EventError::DimensionMismatch { expected, actual } => {
                memoria_core::MemoriaError::UnprocessableEntity(format!(
                    "embedding dimension mismatch: expected {expected}, got {actual}"
                ))
            }
            EventError::EmbeddingDisabled => memoria_core::MemoriaError::NotImplemented(
                "event embedding is not enabled".to_string(),
            ),
            EventError::EmbeddingFailed(msg) => {
                memoria_core::MemoriaError::ServiceUnavailable(msg)
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, EventError>;
