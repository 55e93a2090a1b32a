//! POST /users/buffer/{uid}/{type} — force-flush the write-behind buffer
//!.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Extension;
use axum::Json;
use serde_json::{json, Value};

use memoria_core::types::Scope;

use crate::app::AppState;
use crate::auth::AuthedProject;
use crate::error::{ok, ApiResult};

pub async fn flush_buffer(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthedProject>,
    Path((uid, blob_type)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let scope = Scope::new(uid, auth.project_id);
    let result = state.buffer.flush(&scope, &blob_type).await?;
    Ok(ok(json!({ "flushed": result })))
}
