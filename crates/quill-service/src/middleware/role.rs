//! Per-route-group role gate.
//!
//! Layered inside `require_access_token`. Nested groups each add their own
//! gate; the checks are independent, not cumulative.

use crate::errors::AuthError;
use crate::observability::metrics::record_authorization_decision;
use crate::services::authentication_service::AccessContext;
use crate::services::authorization_service;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::IntoResponse,
};
use tracing::instrument;

/// Role name a route group requires, resolved at request time.
#[derive(Debug, Clone, Copy)]
pub struct RequiredRole(pub &'static str);

#[instrument(skip_all, name = "quill.middleware.role")]
pub async fn require_role(
    State(required): State<RequiredRole>,
    req: Request,
    next: Next,
) -> Result<impl IntoResponse, AuthError> {
    // No context means the gate was mounted without the access track
    let Some(ctx) = req.extensions().get::<AccessContext>() else {
        tracing::error!(target: "quill.middleware.role", "Role gate reached without access context");
        return Err(AuthError::MalformedToken);
    };

    if !authorization_service::authorize(&ctx.roles, required.0) {
        record_authorization_decision(required.0, "deny");
        tracing::debug!(target: "quill.middleware.role", "Role check denied");
        return Err(AuthError::Forbidden {
            required: required.0.to_string(),
        });
    }

    record_authorization_decision(required.0, "allow");
    Ok(next.run(req).await)
}
