use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm provider unavailable: {0}")]
    Unavailable(String),

    #[error("llm response was not valid json: {0}")]
    Unprocessable(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("request timed out after {0}ms")]
    Timeout(u64),
}

impl From<LlmError> for memoria_core::MemoriaError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::Unavailable(msg) => memoria_core::MemoriaError::ServiceUnavailable(msg),
            LlmError::Unprocessable(msg) => memoria_core::MemoriaError::UnprocessableEntity(msg),
            LlmError::DimensionMismatch { expected, actual } => {
                memoria_core::MemoriaError::UnprocessableEntity(format!(
                    "embedding dimension mismatch: expected {expected}, got {actual}"
                ))
            }
            LlmError::Timeout(ms) => memoria_core::MemoriaError::Timeout(ms),
        }
    }
}

pub type Result<T> = std::result::Result<T, LlmError>;
