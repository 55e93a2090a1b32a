//! GET/POST/PUT/DELETE /users/profile/{uid}[/{pid}].

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Extension;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use memoria_core::config::ConfigResolver;
use memoria_core::types::Scope;
use memoria_core::MemoriaError;
use memoria_llm::prompts::{parse, pick_related_profiles, Language};
use memoria_llm::CompletionRequest;
use memoria_profile::{truncate_profiles, Profile, ProfileAttributes, TruncateOptions};

use crate::app::AppState;
use crate::auth::AuthedProject;
use crate::error::{ok, ApiResult};

/// Cap on how many profiles a chat-driven pick may select.
const MAX_FILTER_NUM: usize = 30;

#[derive(Debug, Deserialize, Default)]
pub struct ListProfilesQuery {
    pub topk: Option<usize>,
    pub max_token_size: Option<usize>,
    pub prefer_topics: Option<String>,
    pub only_topics: Option<String>,
    pub max_subtopic_size: Option<i64>,
    pub topic_limits_json: Option<String>,
    /// JSON array of `{role, content}`; when present, profiles are first
    /// narrowed to the ones an LLM pick judges relevant to this tail
    /// before truncation runs.
    pub chats_str: Option<String>,
    /// Accepted for parity with the client's response-shaping flag; the
    /// server always returns JSON, so this has no effect here.
    pub need_json: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawChatMessage {
    role: String,
    content: String,
}

fn comma_list(raw: &Option<String>) -> Option<Vec<String>> {
    raw.as_ref()
        .map(|s| s.split(',').map(|t| t.trim().to_string()).filter(|t| !t.is_empty()).collect())
}

pub async fn list_profiles(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthedProject>,
    Path(uid): Path<String>,
    Query(q): Query<ListProfilesQuery>,
) -> ApiResult<Json<Value>> {
    let scope = Scope::new(uid, auth.project_id.clone());
    let profiles = state.profiles.list(&scope)?;

    let topic_limits = match &q.topic_limits_json {
        Some(raw) => Some(
            serde_json::from_str::<HashMap<String, i64>>(raw)
                .map_err(|e| MemoriaError::BadRequest(format!("invalid topic_limits_json: {e}")))?,
        ),
        None => None,
    };
    let only_topics = comma_list(&q.only_topics);

    let chats = match &q.chats_str {
        Some(raw) => serde_json::from_str::<Vec<RawChatMessage>>(raw)
            .map_err(|e| MemoriaError::BadRequest(format!("invalid chats_str: {e}")))?,
        None => Vec::new(),
    };
    let profiles = if chats.is_empty() || profiles.is_empty() {
        profiles
    } else {
        let project_config = state.projects.profile_config(&auth.project_id)?;
        let effective = ConfigResolver::resolve(&state.config, Some(&project_config));
        let lang = Language::parse(&effective.language);
        pick_related_by_chats(&state, &scope, lang, &chats, &only_topics, profiles).await?
    };

    let opts = TruncateOptions {
        prefer_topics: comma_list(&q.prefer_topics),
        topk: q.topk,
        max_token_size: q.max_token_size,
        only_topics,
        max_subtopic_size: q.max_subtopic_size,
        topic_limits,
    };
    let truncated = truncate_profiles(profiles, &opts);
    Ok(ok(json!({ "profiles": truncated })))
}

/// Narrows `profiles` to the ones an LLM pick judges relevant to the tail
/// of `chats`. Falls back to the full list on any LLM failure or when the
/// model names nothing.
async fn pick_related_by_chats(
    state: &AppState,
    scope: &Scope,
    lang: Language,
    chats: &[RawChatMessage],
    only_topics: &Option<Vec<String>>,
    profiles: Vec<Profile>,
) -> ApiResult<Vec<Profile>> {
    let query = chats
        .iter()
        .rev()
        .find(|m| m.role == "user")
        .map(|m| m.content.clone())
        .unwrap_or_default();

    let candidates: Vec<(String, String, String)> = profiles
        .iter()
        .filter(|p| match only_topics {
            Some(only) => only.iter().any(|t| t == p.attributes.topic.trim()),
            None => true,
        })
        .map(|p| (p.attributes.topic.clone(), p.attributes.sub_topic.clone(), p.content.clone()))
        .collect();
    if candidates.is_empty() {
        return Ok(profiles);
    }

    let sep = "::";
    let (system, user) = pick_related_profiles::build(lang, &query, &candidates, sep);
    let req = CompletionRequest::new(scope.project_id.clone(), user).with_system(system);
    let outcome = match state.llm.complete(req).await {
        Ok(o) => o,
        Err(_) => return Ok(profiles),
    };

    let picked: std::collections::HashSet<(String, String)> = parse::parse_lines(&outcome.text, sep, 2)
        .into_iter()
        .map(|parts| (memoria_core::types::normalize_attr(&parts[0]), memoria_core::types::normalize_attr(&parts[1])))
        .collect();
    if picked.is_empty() {
        return Ok(profiles);
    }
    let mut selected: Vec<Profile> = profiles
        .into_iter()
        .filter(|p| picked.contains(&(p.attributes.topic.clone(), p.attributes.sub_topic.clone())))
        .collect();
    selected.truncate(MAX_FILTER_NUM);
    Ok(selected)
}

#[derive(Debug, Deserialize)]
pub struct AddProfileRequest {
    pub content: String,
    pub topic: String,
    pub sub_topic: String,
}

pub async fn add_profile(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthedProject>,
    Path(uid): Path<String>,
    Json(body): Json<AddProfileRequest>,
) -> ApiResult<Json<Value>> {
    let scope = Scope::new(uid, auth.project_id);
    state.users.get_or_create(&scope)?;
    let id = state.profiles.add(&scope, &body.content, &body.topic, &body.sub_topic)?;
    Ok(ok(json!({ "id": id })))
}

pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthedProject>,
    Path((uid, pid)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let scope = Scope::new(uid, auth.project_id);
    let profile = state
        .profiles
        .list(&scope)?
        .into_iter()
        .find(|p| p.id == pid)
        .ok_or_else(|| MemoriaError::NotFound(format!("profile {pid}")))?;
    Ok(ok(profile))
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub content: String,
    pub topic: Option<String>,
    pub sub_topic: Option<String>,
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthedProject>,
    Path((uid, pid)): Path<(String, String)>,
    Json(body): Json<UpdateProfileRequest>,
) -> ApiResult<Json<Value>> {
    let scope = Scope::new(uid, auth.project_id);
    let attrs = match (body.topic, body.sub_topic) {
        (Some(topic), Some(sub_topic)) => Some(ProfileAttributes::new(topic, sub_topic)),
        _ => None,
    };
    let updated = state
        .profiles
        .update_many(&scope, vec![(pid.clone(), body.content, attrs)])?;
    if updated.is_empty() {
        return Err(MemoriaError::NotFound(format!("profile {pid}")).into());
    }
    Ok(ok(json!({"updated": true})))
}

pub async fn delete_profile(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthedProject>,
    Path((uid, pid)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let scope = Scope::new(uid, auth.project_id);
    state.profiles.delete(&scope, &pid)?;
    Ok(ok(json!({"deleted": true})))
}
