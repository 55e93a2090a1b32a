use thiserror::Error;

#[derive(Debug, Error)]
pub enum BufferError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Blob(#[from] memoria_blob::BlobError),

    #[error(transparent)]
    Core(#[from] memoria_core::MemoriaError),

    #[error("blob type {0} is not supported for buffering")]
    UnsupportedType(String),
}

impl From<BufferError> for memoria_core::MemoriaError {
    fn from(e: BufferError) -> Self {
        match e {
            BufferError::Database(err) => memoria_core::MemoriaError::Database(err.to_string()),
            BufferError::Blob(err) => err.into(),
            BufferError::Core(err) => err,
            BufferError::UnsupportedType(t) => memoria_core::MemoriaError::BadRequest(format!(
                "blob type {t} is not supported"
            )),
        }
    }
}

pub type Result<T> = std::result::Result<T, BufferError>;
