use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("profile not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<ProfileError> for memoria_core::MemoriaError {
    fn from(e: ProfileError) -> Self {
        match e {
            ProfileError::Database(err) => memoria_core::MemoriaError::Database(err.to_string()),
            ProfileError::NotFound(id) => memoria_core::MemoriaError::NotFound(id),
            ProfileError::Serialization(err) => memoria_core::MemoriaError::Serialization(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProfileError>;
