use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use axum::Json;
use serde_json::{json, Value};

use memoria_core::types::ROOT_PROJECT_ID;

use crate::app::AppState;

/// The project a request authenticated as. Stashed in request extensions by
/// `require_auth` and pulled out by every handler that needs a `Scope`
///.
#[derive(Debug, Clone)]
pub struct AuthedProject {
    pub project_id: String,
    pub is_root: bool,
}

const ROOT_PROJECT_HEADER: &str = "x-project-id";

/// Bearer-token auth middleware: the root token (if configured)
/// bypasses project scoping entirely; otherwise the token must be
/// `sk-{project_id}-{secret}` and the project must not be suspended.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<Value>)> {
    let token = extract_bearer(&headers).map_err(|msg| unauthorized(&msg))?;

    let authed = if let Some(root_token) = &state.config.gateway.root_token {
        if token == root_token.as_str() {
            let project_id = headers
                .get(ROOT_PROJECT_HEADER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or(ROOT_PROJECT_ID)
                .to_string();
            AuthedProject { project_id, is_root: true }
        } else {
            verify_project_token(&state, token).map_err(|msg| unauthorized(&msg))?
        }
    } else {
        verify_project_token(&state, token).map_err(|msg| unauthorized(&msg))?
    };

    request.extensions_mut().insert(authed);
    Ok(next.run(request).await)
}

fn verify_project_token(state: &AppState, token: &str) -> Result<AuthedProject, String> {
    let (project_id, secret) = parse_project_token(token).ok_or("malformed bearer token")?;
    state
        .projects
        .verify_secret(&project_id, &secret)
        .map_err(|e| e.to_string())?;
    Ok(AuthedProject { project_id, is_root: false })
}

/// `sk-{project_id}-{secret}`. Project ids may themselves contain hyphens
/// (they are UUIDv7 strings), so the secret is split off the *last* hyphen
/// rather than the first.
fn parse_project_token(token: &str) -> Option<(String, String)> {
    let rest = token.strip_prefix("sk-")?;
    let (project_id, secret) = rest.rsplit_once('-')?;
    if project_id.is_empty() || secret.is_empty() {
        return None;
    }
    Some((project_id.to_string(), secret.to_string()))
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, String> {
    let raw = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or("missing authorization header")?
        .to_str()
        .map_err(|_| "authorization header is not valid utf-8".to_string())?;
    raw.strip_prefix("Bearer ").ok_or_else(|| "authorization header is not a bearer token".to_string())
}

fn unauthorized(msg: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"data": Value::Null, "errno": 401, "errmsg": msg})),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_project_id_with_hyphens() {
        let (project_id, secret) = parse_project_token("sk-11111111-1111-1111-1111-111111111111-mysecret").unwrap();
        assert_eq!(project_id, "11111111-1111-1111-1111-111111111111");
        assert_eq!(secret, "mysecret");
    }

    #[test]
    fn rejects_tokens_without_the_sk_prefix() {
        assert!(parse_project_token("bearer-abc-def").is_none());
    }

    #[test]
    fn rejects_tokens_with_no_secret() {
        assert!(parse_project_token("sk-onlyproject").is_none());
    }
}
