use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("blob not found: {0}")]
    NotFound(String),

    #[error("blob type {0} is not supported")]
    UnsupportedType(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<BlobError> for memoria_core::MemoriaError {
    fn from(e: BlobError) -> Self {
        match e {
            BlobError::Database(err) => memoria_core::MemoriaError::Database(err.to_string()),
            BlobError::NotFound(id) => memoria_core::MemoriaError::NotFound(id),
            BlobError::UnsupportedType(t) => memoria_core::MemoriaError::NotImplemented(t),
            BlobError::Serialization(err) => memoria_core::MemoriaError::Serialization(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, BlobError>;
