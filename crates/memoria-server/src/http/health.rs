//! GET /healthcheck — liveness probe: confirms the SQLite-backed stores are
//! reachable.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::telemetry;

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let started = Instant::now();
    let db_ok = state.projects.get(memoria_core::types::ROOT_PROJECT_ID).is_ok();
    telemetry::record_healthcheck(db_ok);
    Json(json!({
        "data": {
            "status": if db_ok { "ok" } else { "degraded" },
            "database": db_ok,
            "elapsed_ms": started.elapsed().as_millis(),
        },
        "errno": 0,
        "errmsg": "",
    }))
}

/// GET /metrics — Prometheus text exposition.
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> String {
    state.metrics.render()
}
