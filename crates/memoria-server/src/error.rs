use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

use memoria_core::MemoriaError;

/// HTTP-edge wrapper around [`MemoriaError`]: every handler's error path
/// converges here so the `{data, errno, errmsg}` envelope is built
/// in exactly one place.
pub struct ApiError(pub MemoriaError);

impl<E> From<E> for ApiError
where
    E: Into<MemoriaError>,
{
    fn from(e: E) -> Self {
        ApiError(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.0.code();
        let status = StatusCode::from_u16(code as u16).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(json!({
            "data": Value::Null,
            "errno": code,
            "errmsg": self.0.to_string(),
        }));
        (status, body).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Success envelope.
pub fn ok<T: Serialize>(data: T) -> Json<Value> {
    Json(json!({
        "data": data,
        "errno": 0,
        "errmsg": "",
    }))
}
