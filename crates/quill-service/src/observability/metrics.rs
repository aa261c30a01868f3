//! Metrics definitions for the Quill auth core.
//!
//! All metrics follow Prometheus naming conventions:
//! - `quill_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `flow`: sign_in, refresh
//! - `track`: access, refresh
//! - `status`: success, error (HTTP: success, client_error, server_error, timeout)
//! - `error_category`: see [`super::ErrorCategory`] plus token rejection reasons
//! - `required_role`: the four role names
//! - `endpoint`: matched route templates, `/other` for unmatched paths

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the Prometheus recorder and return the handle backing `/metrics`.
///
/// # Errors
///
/// Returns error if the recorder cannot be installed (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("quill_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // Sign-in is dominated by bcrypt (~200ms at cost 12)
        .set_buckets_for_metric(
            Matcher::Prefix("quill_token_issuance".to_string()),
            &[
                0.010, 0.025, 0.050, 0.100, 0.200, 0.300, 0.400, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set token issuance buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// Token Metrics
// ============================================================================

/// Record token issuance duration and outcome
///
/// Metric: `quill_token_issuance_total`, `quill_token_issuance_duration_seconds`
/// Labels: `flow` (sign_in, refresh), `status`
pub fn record_token_issuance(flow: &str, status: &str, duration: Duration) {
    histogram!("quill_token_issuance_duration_seconds", "flow" => flow.to_string(), "status" => status.to_string())
        .record(duration.as_secs_f64());

    counter!("quill_token_issuance_total", "flow" => flow.to_string(), "status" => status.to_string())
        .increment(1);
}

/// Record the outcome of an authentication-pipeline check
///
/// Metric: `quill_token_validations_total`
/// Labels: `track`, `status`, `error_category`
pub fn record_token_validation(track: &str, status: &str, error_category: Option<&str>) {
    let category = error_category.unwrap_or("none");
    counter!("quill_token_validations_total",
        "track" => track.to_string(),
        "status" => status.to_string(),
        "error_category" => category.to_string()
    )
    .increment(1);
}

/// Record a role-gate decision
///
/// Metric: `quill_authorization_decisions_total`
/// Labels: `required_role`, `decision` (allow, deny)
pub fn record_authorization_decision(required_role: &str, decision: &str) {
    counter!("quill_authorization_decisions_total",
        "required_role" => required_role.to_string(),
        "decision" => decision.to_string()
    )
    .increment(1);
}

// ============================================================================
// Error Metrics
// ============================================================================

/// Record an error surfaced by a flow
///
/// Metric: `quill_errors_total`
/// Labels: `operation`, `error_category`, `status_code`
pub fn record_error(operation: &str, error_category: &str, status_code: u16) {
    counter!("quill_errors_total",
        "operation" => operation.to_string(),
        "error_category" => error_category.to_string(),
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `quill_http_requests_total`, `quill_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status` / `status_code`
///
/// `endpoint` must already be a route template (or `/other`).
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let status = categorize_status_code(status_code);

    histogram!("quill_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => endpoint.to_string(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("quill_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => endpoint.to_string(),
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        400..=499 => "client_error",
        _ => "server_error",
    }
}
