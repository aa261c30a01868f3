//! Liveness, readiness and metrics scrape endpoints.
//!
//! None of these are versioned under /api/v1 and none require a token.

use super::auth_handler::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub store: &'static str,
}

/// GET /health
///
/// Liveness only. Never touches the store.
pub async fn health_check() -> &'static str {
    "OK"
}

/// GET /ready
///
/// Pings the store within the per-request budget. An unreachable store is
/// reported as 503 with a body, so probes can tell the two apart.
#[instrument(skip_all, name = "quill.health.ready")]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.store.session().ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ReadinessResponse {
                status: "ready",
                store: "healthy",
            }),
        ),
        Err(e) => {
            tracing::warn!(target: "quill.health", error = %e, "Store ping failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadinessResponse {
                    status: "not_ready",
                    store: "unhealthy",
                }),
            )
        }
    }
}

/// GET /metrics
///
/// Prometheus text format. Labels are bounded; no identities or token ids.
#[instrument(skip_all, name = "quill.metrics.scrape")]
pub async fn metrics_handler(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    handle.render()
}
