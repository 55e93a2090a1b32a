//! GET /users/blobs/{uid}/{type}, POST /blobs/insert/{uid}, GET/DELETE
//! /blobs/{uid}/{bid}.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Extension;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use memoria_core::types::{Blob, BlobType, Scope};
use memoria_core::MemoriaError;

use crate::app::AppState;
use crate::auth::AuthedProject;
use crate::error::{ok, ApiResult};

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page() -> u32 {
    1
}
fn default_page_size() -> u32 {
    50
}

pub async fn list_blobs(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthedProject>,
    Path((uid, blob_type)): Path<(String, String)>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<Value>> {
    let scope = Scope::new(uid, auth.project_id);
    let blob_type: BlobType = blob_type
        .parse()
        .map_err(|e: String| MemoriaError::BadRequest(e))?;
    let ids = state.blobs.list(&scope, blob_type, page.page, page.page_size)?;
    Ok(ok(json!({ "blob_ids": ids })))
}

#[derive(Debug, Deserialize)]
pub struct InsertBlobRequest {
    pub blob: Blob,
}

/// Inserts into durable blob storage, then hands the id to the write-behind
/// buffer for the same scope/type. Creates the user lazily if this is its first reference.
pub async fn insert_blob(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthedProject>,
    Path(uid): Path<String>,
    Json(body): Json<InsertBlobRequest>,
) -> ApiResult<Json<Value>> {
    let scope = Scope::new(uid, auth.project_id);
    state.users.get_or_create(&scope)?;

    let blob_type = body.blob.blob_type;
    let blob_id = state.blobs.insert(&scope, body.blob.clone())?;
    state.buffer.append(&scope, &blob_id, &body.blob).await?;

    Ok(ok(json!({ "blob_id": blob_id, "blob_type": blob_type.to_string() })))
}

pub async fn get_blob(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthedProject>,
    Path((uid, bid)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let scope = Scope::new(uid, auth.project_id);
    let blob = state.blobs.get(&scope, &bid)?;
    Ok(ok(serde_json::to_value(blob).unwrap_or(Value::Null)))
}

pub async fn delete_blob(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthedProject>,
    Path((uid, bid)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let scope = Scope::new(uid, auth.project_id);
    state.blobs.delete(&scope, &bid)?;
    Ok(ok(json!({"deleted": true})))
}
