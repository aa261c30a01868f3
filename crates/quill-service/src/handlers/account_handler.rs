use crate::errors::AuthError;
use crate::models::{AccountResponse, SessionsResponse};
use crate::repositories::StoreSession;
use crate::services::authentication_service::AccessContext;
use crate::services::session_service;
use axum::{Extension, Json};

use super::record_failure;

/// GET /api/v1/account
///
/// Answered from the access context; the pipeline already loaded the identity.
pub async fn handle_get_account(Extension(ctx): Extension<AccessContext>) -> Json<AccountResponse> {
    Json(AccountResponse {
        user_id: ctx.user_id,
        username: ctx.username,
        roles: ctx.roles,
    })
}

/// GET /api/v1/account/sessions
pub async fn handle_get_own_sessions(
    Extension(ctx): Extension<AccessContext>,
    Extension(session): Extension<StoreSession>,
) -> Result<Json<SessionsResponse>, AuthError> {
    let sessions = session_service::get_sessions(&session, ctx.user_id)
        .await
        .map_err(|e| record_failure("list_own_sessions", e))?;
    Ok(Json(sessions))
}
