//! The two authentication tracks.
//!
//! The access track guards general routes and checks the bearer token
//! against the owner's per-identity revoked list. The refresh track guards
//! only refresh and sign-out and checks the shared ledger plus the hashed
//! issued-refresh bookkeeping. Both produce a typed context for handlers.

use crate::config::Config;
use crate::crypto::{self, jwt, jwt::Claims};
use crate::errors::AuthError;
use crate::models::{Identity, Role, TokenKind};
use crate::observability::{hash_for_correlation, metrics::record_token_validation};
use crate::repositories::StoreSession;
use chrono::{DateTime, Utc};
use tracing::instrument;
use uuid::Uuid;

/// Identity published by the access track.
#[derive(Debug, Clone)]
pub struct AccessContext {
    pub user_id: Uuid,
    pub username: String,
    pub roles: Vec<Role>,
    pub token_id: String,
    pub expires_at: DateTime<Utc>,
}

/// Identity and verified claims published by the refresh track.
#[derive(Debug, Clone)]
pub struct RefreshContext {
    pub identity: Identity,
    pub claims: Claims,
}

impl RefreshContext {
    pub fn user_id(&self) -> Uuid {
        self.identity.user_id
    }

    pub fn token_id(&self) -> &str {
        &self.claims.jti
    }
}

/// Run the access track against a bearer token.
pub async fn authenticate_access(
    session: &StoreSession,
    config: &Config,
    token: &str,
) -> Result<AccessContext, AuthError> {
    authenticate_access_at(session, config, token, Utc::now()).await
}

/// [`authenticate_access`] with an explicit clock.
#[instrument(skip_all)]
pub async fn authenticate_access_at(
    session: &StoreSession,
    config: &Config,
    token: &str,
    now: DateTime<Utc>,
) -> Result<AccessContext, AuthError> {
    let result = access_track(session, config, token, now).await;
    record_outcome("access", &result);
    result
}

async fn access_track(
    session: &StoreSession,
    config: &Config,
    token: &str,
    now: DateTime<Utc>,
) -> Result<AccessContext, AuthError> {
    let claims = jwt::verify_token_at(
        token,
        config.signing_secret_bytes(),
        TokenKind::Access,
        config.jwt_clock_skew_seconds,
        now,
    )?;
    let user_id = claims.subject_id()?;

    let identity = session
        .get_by_id(user_id)
        .await?
        .ok_or(AuthError::IdentityNotFound)?;

    if identity.access_token_revoked(&claims.jti, now) {
        tracing::debug!(
            target: "quill.auth",
            user = %hash_for_correlation(&user_id.to_string()),
            "Access token on revoked list"
        );
        return Err(AuthError::Revoked);
    }

    let issued = identity
        .issued_access_tokens
        .iter()
        .any(|t| t.token_id == claims.jti && t.is_live(now));
    if !issued {
        tracing::debug!(
            target: "quill.auth",
            user = %hash_for_correlation(&user_id.to_string()),
            "Access token has no bookkeeping entry"
        );
        return Err(AuthError::Revoked);
    }

    Ok(AccessContext {
        user_id,
        username: identity.username,
        roles: identity.roles,
        expires_at: claims.expires_at()?,
        token_id: claims.jti,
    })
}

/// Run the refresh track against a cookie-carried refresh token.
pub async fn authenticate_refresh(
    session: &StoreSession,
    config: &Config,
    token: &str,
) -> Result<RefreshContext, AuthError> {
    authenticate_refresh_at(session, config, token, Utc::now()).await
}

/// [`authenticate_refresh`] with an explicit clock.
#[instrument(skip_all)]
pub async fn authenticate_refresh_at(
    session: &StoreSession,
    config: &Config,
    token: &str,
    now: DateTime<Utc>,
) -> Result<RefreshContext, AuthError> {
    let result = refresh_track(session, config, token, now).await;
    record_outcome("refresh", &result);
    result
}

async fn refresh_track(
    session: &StoreSession,
    config: &Config,
    token: &str,
    now: DateTime<Utc>,
) -> Result<RefreshContext, AuthError> {
    let claims = jwt::verify_token_at(
        token,
        config.signing_secret_bytes(),
        TokenKind::Refresh,
        config.jwt_clock_skew_seconds,
        now,
    )?;

    let identity = load_refresh_owner(session, &claims, now).await?;
    Ok(RefreshContext { identity, claims })
}

/// Load the owner of a verified refresh token, re-checking that the token is
/// neither in the ledger nor missing from the issued-refresh list.
///
/// Also used to re-validate after a lost optimistic write.
pub(crate) async fn load_refresh_owner(
    session: &StoreSession,
    claims: &Claims,
    now: DateTime<Utc>,
) -> Result<Identity, AuthError> {
    if session.is_revoked(&claims.jti).await? {
        tracing::debug!(target: "quill.auth", "Refresh token found in ledger");
        return Err(AuthError::Revoked);
    }

    let user_id = claims.subject_id()?;
    let identity = session
        .get_by_id(user_id)
        .await?
        .ok_or(AuthError::IdentityNotFound)?;

    if find_refresh_entry(&identity, &claims.jti, now).is_none() {
        tracing::debug!(
            target: "quill.auth",
            user = %hash_for_correlation(&user_id.to_string()),
            "Refresh token has no bookkeeping entry"
        );
        return Err(AuthError::Revoked);
    }

    Ok(identity)
}

/// Position of the live issued-refresh entry whose digest matches `token_id`.
pub(crate) fn find_refresh_entry(
    identity: &Identity,
    token_id: &str,
    now: DateTime<Utc>,
) -> Option<usize> {
    identity
        .issued_refresh_tokens
        .iter()
        .position(|t| t.is_live(now) && crypto::token_id_matches(token_id, &t.token_id))
}

fn record_outcome<T>(track: &str, result: &Result<T, AuthError>) {
    match result {
        Ok(_) => record_token_validation(track, "success", None),
        Err(e) => record_token_validation(track, "error", Some(e.rejection_reason())),
    }
}
