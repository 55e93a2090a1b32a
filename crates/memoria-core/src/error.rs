use thiserror::Error;

/// Error kinds mirrored onto HTTP status codes at the edge (memoria-server).
#[derive(Debug, Error)]
pub enum MemoriaError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unprocessable: {0}")]
    UnprocessableEntity(String),

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("timeout after {0}ms")]
    Timeout(u64),

    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl MemoriaError {
    /// Short error code string, sent in the `{data, errno, errmsg}` envelope.
    pub fn code(&self) -> i32 {
        match self {
            MemoriaError::BadRequest(_) => 400,
            MemoriaError::Unauthorized(_) => 401,
            MemoriaError::Forbidden(_) => 403,
            MemoriaError::NotFound(_) => 404,
            MemoriaError::UnprocessableEntity(_) => 422,
            MemoriaError::ServiceUnavailable(_) => 503,
            MemoriaError::NotImplemented(_) => 501,
            MemoriaError::Timeout(_) => 408,
            MemoriaError::Database(_) => 500,
            MemoriaError::Serialization(_) => 500,
            MemoriaError::Internal(_) => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, MemoriaError>;
