//! GET/PUT/DELETE /users/event/{uid}[/{eid}], GET /users/event/search/{uid}
//!.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Extension;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use memoria_core::types::Scope;
use memoria_event::EventPatch;

use crate::app::AppState;
use crate::auth::AuthedProject;
use crate::error::{ok, ApiResult};

#[derive(Debug, Deserialize)]
pub struct ListEventsQuery {
    #[serde(default = "default_topk")]
    pub topk: u32,
    #[serde(default)]
    pub need_summary: bool,
}

fn default_topk() -> u32 {
    20
}

pub async fn list_events(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthedProject>,
    Path(uid): Path<String>,
    Query(q): Query<ListEventsQuery>,
) -> ApiResult<Json<Value>> {
    let scope = Scope::new(uid, auth.project_id);
    let events = state.events.list(&scope, q.topk, q.need_summary)?;
    Ok(ok(json!({ "events": events })))
}

pub async fn get_event(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthedProject>,
    Path((uid, eid)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let scope = Scope::new(uid, auth.project_id);
    let event = state.events.get(&scope, &eid)?;
    Ok(ok(event))
}

pub async fn update_event(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthedProject>,
    Path((uid, eid)): Path<(String, String)>,
    Json(patch): Json<EventPatch>,
) -> ApiResult<Json<Value>> {
    let scope = Scope::new(uid, auth.project_id);
    state.events.update(&scope, &eid, patch)?;
    Ok(ok(json!({"updated": true})))
}

pub async fn delete_event(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthedProject>,
    Path((uid, eid)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let scope = Scope::new(uid, auth.project_id);
    state.events.delete(&scope, &eid)?;
    Ok(ok(json!({"deleted": true})))
}

#[derive(Debug, Deserialize)]
pub struct SearchEventsQuery {
    pub query: String,
    #[serde(default = "default_topk")]
    pub topk: u32,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    #[serde(default = "default_time_range_days")]
    pub time_range_in_days: i64,
}

fn default_similarity_threshold() -> f32 {
    0.3
}
fn default_time_range_days() -> i64 {
    3650
}

pub async fn search_events(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthedProject>,
    Path(uid): Path<String>,
    Query(q): Query<SearchEventsQuery>,
) -> ApiResult<Json<Value>> {
    let scope = Scope::new(uid, auth.project_id);
    let events = state
        .events
        .search(&scope, &q.query, q.topk, q.similarity_threshold, q.time_range_in_days)
        .await?;
    Ok(ok(json!({ "events": events })))
}
