//! Role-gated identity administration.
//!
//! The role gates live in the router; handlers assume the caller passed them.

use super::auth_handler::AppState;
use crate::errors::AuthError;
use crate::models::{
    AccountResponse, CreateAccountRequest, RevokeSessionsResponse, SessionsResponse,
    UpdateRolesRequest,
};
use crate::observability::hash_for_correlation;
use crate::repositories::StoreSession;
use crate::services::authentication_service::AccessContext;
use crate::services::session_service;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use std::sync::Arc;
use uuid::Uuid;

use super::record_failure;

/// GET /api/v1/users/:user_id/sessions (Editor)
pub async fn handle_list_sessions(
    Extension(session): Extension<StoreSession>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<SessionsResponse>, AuthError> {
    let sessions = session_service::get_sessions(&session, user_id)
        .await
        .map_err(|e| record_failure("list_sessions", e))?;
    Ok(Json(sessions))
}

/// POST /api/v1/users/:user_id/sessions/revoke (Admin)
pub async fn handle_revoke_sessions(
    Extension(ctx): Extension<AccessContext>,
    Extension(session): Extension<StoreSession>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<RevokeSessionsResponse>, AuthError> {
    tracing::info!(
        target: "quill.admin",
        actor = %hash_for_correlation(&ctx.user_id.to_string()),
        "Revoking all sessions"
    );

    let result = session_service::revoke_all_sessions(&session, user_id)
        .await
        .map_err(|e| record_failure("revoke_sessions", e))?;
    Ok(Json(result))
}

/// PUT /api/v1/users/:user_id/roles (SuperAdmin)
///
/// Replaces the role set. Tokens already issued keep working; the new roles
/// apply from the next request because roles are read from the identity.
pub async fn handle_set_roles(
    Extension(ctx): Extension<AccessContext>,
    Extension(session): Extension<StoreSession>,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<UpdateRolesRequest>,
) -> Result<Json<AccountResponse>, AuthError> {
    tracing::info!(
        target: "quill.admin",
        actor = %hash_for_correlation(&ctx.user_id.to_string()),
        "Replacing role set"
    );

    let account = session_service::set_roles(&session, user_id, &payload.roles)
        .await
        .map_err(|e| record_failure("set_roles", e))?;
    Ok(Json(account))
}

/// POST /api/v1/users (SuperAdmin)
pub async fn handle_create_account(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AccessContext>,
    Extension(session): Extension<StoreSession>,
    Json(payload): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<AccountResponse>), AuthError> {
    tracing::info!(
        target: "quill.admin",
        actor = %hash_for_correlation(&ctx.user_id.to_string()),
        "Creating account"
    );

    let account = session_service::create_account(&session, &state.config, &payload)
        .await
        .map_err(|e| record_failure("create_account", e))?;
    Ok((StatusCode::CREATED, Json(account)))
}
