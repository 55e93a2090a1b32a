use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContextError {
    #[error(transparent)]
    Core(#[from] memoria_core::MemoriaError),

    #[error(transparent)]
    Profile(#[from] memoria_profile::ProfileError),

    #[error(transparent)]
    Event(#[from] memoria_event::EventError),

    #[error(transparent)]
    Llm(#[from] memoria_llm::LlmError),

    #[error("profile_event_ratio must be in (0, 1], got {0}")]
    InvalidRatio(f64),
}

impl From<ContextError> for memoria_core::MemoriaError {
    fn from(e: ContextError) -> Self {
        match e {
            ContextError::Core(err) => err,
            ContextError::Profile(err) => err.into(),
            ContextError::Event(err) => err.into(),
            ContextError::Llm(err) => err.into(),
            ContextError::InvalidRatio(r) => {
                memoria_core::MemoriaError::BadRequest(format!("profile_event_ratio must be in (0, 1], got {r}"))
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ContextError>;
