use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] memoria_core::MemoriaError),

    #[error(transparent)]
    Profile(#[from] memoria_profile::ProfileError),

    #[error(transparent)]
    Event(#[from] memoria_event::EventError),

    #[error(transparent)]
    Llm(#[from] memoria_llm::LlmError),

    #[error("chat flusher only accepts chat blobs, got {0}")]
    UnsupportedBlobType(String),

    #[error("failed to parse merge action from llm output: {0:?}")]
    MergeParseFailed(String),
}

impl From<PipelineError> for memoria_core::MemoriaError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::Core(err) => err,
            PipelineError::Profile(err) => err.into(),
            PipelineError::Event(err) => err.into(),
            PipelineError::Llm(err) => err.into(),
            PipelineError::UnsupportedBlobType(t) => {
                memoria_core::MemoriaError::BadRequest(format!("unsupported blob type: {t}"))
            }
            PipelineError::MergeParseFailed(raw) => memoria_core::MemoriaError::UnprocessableEntity(format!(
                "could not parse merge action from llm output: {raw}"
            )),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
