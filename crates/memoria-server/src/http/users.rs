//! POST /users, GET/PUT/DELETE /users/{uid}.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Extension;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use memoria_core::types::Scope;

use crate::app::AppState;
use crate::auth::AuthedProject;
use crate::error::{ok, ApiResult};

/// Body shape: `{data?, id?}` — `id` is optional, the service
/// generates one when the caller omits it.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub id: Option<String>,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub data: Value,
}

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthedProject>,
    Json(body): Json<CreateUserRequest>,
) -> ApiResult<Json<Value>> {
    let user_id = body.id.unwrap_or_else(memoria_core::ids::new_id);
    let user = state.users.create(&auth.project_id, &user_id, body.data)?;
    Ok(ok(json!({
        "user_id": user.user_id,
        "created_at": user.created_at,
    })))
}

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthedProject>,
    Path(uid): Path<String>,
) -> ApiResult<Json<Value>> {
    let scope = Scope::new(uid, auth.project_id);
    let user = state.users.require(&scope)?;
    Ok(ok(json!({
        "user_id": user.user_id,
        "data": user.data,
        "created_at": user.created_at,
        "updated_at": user.updated_at,
    })))
}

pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthedProject>,
    Path(uid): Path<String>,
    Json(body): Json<UpdateUserRequest>,
) -> ApiResult<Json<Value>> {
    let scope = Scope::new(uid, auth.project_id);
    state.users.update(&scope, body.data)?;
    Ok(ok(json!({"updated": true})))
}

/// Cascades through blobs, buffer entries, profiles, and events before
/// dropping the user row itself.
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthedProject>,
    Path(uid): Path<String>,
) -> ApiResult<Json<Value>> {
    let scope = Scope::new(uid, auth.project_id);
    state
        .users
        .delete_cascade(&scope, &state.blobs, &state.buffer, &state.profiles, &state.events)?;
    Ok(ok(json!({"deleted": true})))
}
