//! GET /users/context/{uid}.

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
use memoria_context::{ChatTailMessage, ContextRequest};
use memoria_llm::prompts::Language;
use memoria_profile::TruncateOptions;

use crate::app::AppState;
use crate::auth::AuthedProject;
use crate::error::{ok, ApiResult};

#[derive(Debug, Deserialize)]
pub struct ContextQuery {
    #[serde(default = "default_max_token_size")]
    pub max_token_size: usize,
    #[serde(default = "default_ratio")]
    pub profile_event_ratio: f64,
    pub prefer_topics: Option<String>,
    pub only_topics: Option<String>,
    pub max_subtopic_size: Option<i64>,
    pub topic_limits_json: Option<String>,
    /// JSON array of `{role, content}`, the tail of the live conversation.
    pub chat_tail_json: Option<String>,
}

fn default_max_token_size() -> usize {
    2000
}
fn default_ratio() -> f64 {
    0.6
}

fn comma_list(raw: &Option<String>) -> Option<Vec<String>> {
    raw.as_ref()
        .map(|s| s.split(',').map(|t| t.trim().to_string()).filter(|t| !t.is_empty()).collect())
}

#[derive(Debug, Deserialize)]
struct RawChatTailMessage {
    role: String,
    content: String,
}

pub async fn assemble_context(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthedProject>,
    Path(uid): Path<String>,
    Query(q): Query<ContextQuery>,
) -> ApiResult<Json<Value>> {
    let scope = Scope::new(uid, auth.project_id.clone());

    let project_config = state.projects.profile_config(&auth.project_id)?;
    let effective = ConfigResolver::resolve(&state.config, Some(&project_config));
    let lang = Language::parse(&effective.language);

    let topic_limits = match &q.topic_limits_json {
        Some(raw) => Some(
            serde_json::from_str::<HashMap<String, i64>>(raw)
                .map_err(|e| MemoriaError::BadRequest(format!("invalid topic_limits_json: {e}")))?,
        ),
        None => None,
    };
    let chat_tail = match &q.chat_tail_json {
        Some(raw) => Some(
            serde_json::from_str::<Vec<RawChatTailMessage>>(raw)
                .map_err(|e| MemoriaError::BadRequest(format!("invalid chat_tail_json: {e}")))?
                .into_iter()
                .map(|m| ChatTailMessage { role: m.role, content: m.content })
                .collect(),
        ),
        None => None,
    };

    let req = ContextRequest {
        max_token_size: q.max_token_size,
        profile_event_ratio: q.profile_event_ratio,
        chat_tail,
        truncate: TruncateOptions {
            prefer_topics: comma_list(&q.prefer_topics),
            topk: None,
            max_token_size: None,
            only_topics: comma_list(&q.only_topics),
            max_subtopic_size: q.max_subtopic_size,
            topic_limits,
        },
    };

    let assembled = state.context.assemble(&scope, lang, &req).await?;
    Ok(ok(json!({
        "text": assembled.text,
        "profile_token_count": assembled.profile_token_count,
        "event_token_count": assembled.event_token_count,
    })))
}
