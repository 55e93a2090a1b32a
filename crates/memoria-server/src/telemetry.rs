use std::sync::Arc;
use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::auth::AuthedProject;
use crate::project::ProjectStore;

/// Prometheus exporter handle, held by `AppState` and rendered by the
/// `/metrics` route. Installed once at startup.
pub fn install() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install the prometheus metrics recorder")
}

/// Request-level counters/histogram, recorded by the tracing/metrics
/// middleware layered onto every route.
pub fn record_request(path: &str, project_id: &str, status: u16, elapsed_secs: f64) {
    metrics::counter!(
        "memoria_requests_total",
        "path" => path.to_string(),
        "project_id" => project_id.to_string(),
        "status" => status.to_string(),
    )
    .increment(1);
    metrics::histogram!(
        "memoria_request_latency_seconds",
        "path" => path.to_string(),
    )
    .record(elapsed_secs);
}

pub fn record_healthcheck(ok: bool) {
    metrics::counter!("memoria_healthcheck_total", "ok" => ok.to_string()).increment(1);
}

/// Normalized-path request middleware. Placed as the
/// innermost layer on the authenticated router so it runs after
/// `require_auth` has stashed an [`AuthedProject`] in the request's
/// extensions — that's where `project_id` comes from.
pub async fn track_authed(req: Request, next: Next) -> Response {
    let path = matched_path(&req);
    let project_id = req
        .extensions()
        .get::<AuthedProject>()
        .map(|p| p.project_id.clone())
        .unwrap_or_else(|| "-".to_string());
    let started = Instant::now();
    let response = next.run(req).await;
    record_request(&path, &project_id, response.status().as_u16(), started.elapsed().as_secs_f64());
    response
}

/// Same as [`track_authed`] but for routes outside the auth boundary
/// (`/healthcheck`, `/metrics`), which carry no project scope.
pub async fn track_anonymous(req: Request, next: Next) -> Response {
    let path = matched_path(&req);
    let started = Instant::now();
    let response = next.run(req).await;
    record_request(&path, "-", response.status().as_u16(), started.elapsed().as_secs_f64());
    response
}

fn matched_path(req: &Request) -> String {
    req.extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string())
}

/// Bridges `memoria-llm`'s `UsageSink` to both the project's monthly token
/// ledger and the Prometheus counters. Kept in
/// `memoria-server` since it is the only crate that owns both collaborators.
pub struct TelemetryUsageSink {
    projects: Arc<ProjectStore>,
}

impl TelemetryUsageSink {
    pub fn new(projects: Arc<ProjectStore>) -> Self {
        Self { projects }
    }
}

impl memoria_llm::UsageSink for TelemetryUsageSink {
    fn record_completion(&self, project_id: &str, model: &str, input_tokens: usize, output_tokens: usize) {
        metrics::counter!(
            "memoria_llm_invocations_total",
            "project_id" => project_id.to_string(),
            "model" => model.to_string(),
        )
        .increment(1);
        metrics::counter!(
            "memoria_llm_input_tokens_total",
            "project_id" => project_id.to_string(),
        )
        .increment(input_tokens as u64);
        metrics::counter!(
            "memoria_llm_output_tokens_total",
            "project_id" => project_id.to_string(),
        )
        .increment(output_tokens as u64);

        let total = (input_tokens + output_tokens) as i64;
        if let Err(e) = self.projects.record_usage(project_id, total) {
            tracing::warn!(project_id, error = %e, "failed to record project token usage");
        }
    }

    fn record_embedding(&self, project_id: &str, _model: &str, tokens: usize) {
        metrics::counter!(
            "memoria_embedding_tokens_total",
            "project_id" => project_id.to_string(),
        )
        .increment(tokens as u64);

        if let Err(e) = self.projects.record_usage(project_id, tokens as i64) {
            tracing::warn!(project_id, error = %e, "failed to record project token usage");
        }
    }
}
