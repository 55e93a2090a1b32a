//! GET/POST /project/profile_config, GET /project/billing.

use std::sync::Arc;

use axum::extract::State;
use axum::Extension;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::auth::AuthedProject;
use crate::error::{ok, ApiResult};

pub async fn get_profile_config(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthedProject>,
) -> ApiResult<Json<Value>> {
    let config = state.projects.profile_config(&auth.project_id)?;
    Ok(ok(config))
}

#[derive(Debug, Deserialize)]
pub struct SetProfileConfigRequest {
    pub profile_config: Value,
}

pub async fn set_profile_config(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthedProject>,
    Json(body): Json<SetProfileConfigRequest>,
) -> ApiResult<Json<Value>> {
    let raw = body.profile_config.to_string();
    state.projects.set_profile_config(&auth.project_id, &raw)?;
    Ok(ok(json!({"updated": true})))
}

pub async fn billing(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthedProject>,
) -> ApiResult<Json<Value>> {
    let snapshot = state.projects.billing(&auth.project_id)?;
    Ok(ok(json!({
        "project_id": snapshot.project_id,
        "token_quota": snapshot.token_quota,
        "tokens_used_this_month": snapshot.tokens_used_this_month,
        "month": snapshot.month,
    })))
}
