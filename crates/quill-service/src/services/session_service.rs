//! Account and session administration behind the role-gated routes.

use super::MAX_WRITE_ATTEMPTS;
use crate::config::Config;
use crate::crypto;
use crate::errors::AuthError;
use crate::models::{
    AccountResponse, CreateAccountRequest, Identity, RevokeSessionsResponse, Role,
    SessionSummary, SessionsResponse, TokenKind,
};
use crate::observability::hash_for_correlation;
use crate::repositories::StoreSession;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use tracing::instrument;
use uuid::Uuid;

/// Live sessions of an identity, oldest first.
///
/// Refresh entries carry no id since only their digest is stored.
pub fn list_sessions(identity: &Identity, now: DateTime<Utc>) -> Vec<SessionSummary> {
    let access = identity
        .issued_access_tokens
        .iter()
        .filter(|t| t.is_live(now) && !identity.access_token_revoked(&t.token_id, now))
        .map(|t| SessionSummary {
            token_id: Some(t.token_id.clone()),
            kind: TokenKind::Access,
            client_label: t.client_label.clone(),
            issued_at: t.issued_at,
            expires_at: t.expires_at,
        });

    let refresh = identity
        .issued_refresh_tokens
        .iter()
        .filter(|t| t.is_live(now))
        .map(|t| SessionSummary {
            token_id: None,
            kind: TokenKind::Refresh,
            client_label: t.client_label.clone(),
            issued_at: t.issued_at,
            expires_at: t.expires_at,
        });

    let mut sessions: Vec<SessionSummary> = access.chain(refresh).collect();
    sessions.sort_by_key(|s| s.issued_at);
    sessions
}

async fn load(session: &StoreSession, user_id: Uuid) -> Result<Identity, AuthError> {
    session
        .get_by_id(user_id)
        .await?
        .ok_or_else(|| AuthError::NotFound("User".to_string()))
}

pub async fn get_account(session: &StoreSession, user_id: Uuid) -> Result<AccountResponse, AuthError> {
    let identity = load(session, user_id).await?;
    Ok(AccountResponse {
        user_id: identity.user_id,
        username: identity.username,
        roles: identity.roles,
    })
}

#[instrument(skip_all)]
pub async fn get_sessions(
    session: &StoreSession,
    user_id: Uuid,
) -> Result<SessionsResponse, AuthError> {
    let identity = load(session, user_id).await?;
    Ok(SessionsResponse {
        user_id,
        sessions: list_sessions(&identity, Utc::now()),
    })
}

/// Revoke every live access token and drop every refresh entry.
///
/// Dropped refresh tokens fail the refresh track's bookkeeping check from
/// then on; their raw ids are unknown, so they are not added to the ledger.
pub async fn revoke_all_sessions(
    session: &StoreSession,
    user_id: Uuid,
) -> Result<RevokeSessionsResponse, AuthError> {
    revoke_all_sessions_at(session, user_id, Utc::now()).await
}

#[instrument(skip_all)]
pub async fn revoke_all_sessions_at(
    session: &StoreSession,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Result<RevokeSessionsResponse, AuthError> {
    let mut attempt = 1;
    loop {
        let mut identity = load(session, user_id).await?;
        identity.prune(now);

        let access_ids: Vec<String> = identity
            .issued_access_tokens
            .iter()
            .map(|t| t.token_id.clone())
            .collect();
        let mut revoked_access_tokens = 0;
        for id in &access_ids {
            if identity.revoke_access_token(id) {
                revoked_access_tokens += 1;
            }
        }
        let dropped_refresh_tokens = identity.issued_refresh_tokens.len();
        identity.issued_refresh_tokens.clear();

        match session.update(&identity).await {
            Ok(()) => {
                tracing::info!(
                    target: "quill.admin",
                    user = %hash_for_correlation(&user_id.to_string()),
                    revoked_access_tokens,
                    dropped_refresh_tokens,
                    "Revoked all sessions"
                );
                return Ok(RevokeSessionsResponse {
                    revoked_access_tokens,
                    dropped_refresh_tokens,
                });
            }
            Err(AuthError::Conflict) if attempt < MAX_WRITE_ATTEMPTS => attempt += 1,
            Err(e) => return Err(e),
        }
    }
}

/// Parse role names strictly. Unknown or empty input is a bad request.
pub fn parse_role_names(names: &[String]) -> Result<Vec<Role>, AuthError> {
    if names.is_empty() {
        return Err(AuthError::BadRequest(
            "At least one role is required".to_string(),
        ));
    }

    let mut roles = Vec::with_capacity(names.len());
    for name in names {
        let role = Role::parse(name)
            .ok_or_else(|| AuthError::BadRequest(format!("Unknown role: {}", name)))?;
        if !roles.contains(&role) {
            roles.push(role);
        }
    }
    roles.sort();
    Ok(roles)
}

/// Shortest password accepted for a new account.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// bcrypt ignores input past 72 bytes; longer passwords are refused.
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Longest accepted username.
pub const MAX_USERNAME_LENGTH: usize = 64;

fn validate_new_account(username: &str, email: &str, password: &str) -> Result<(), AuthError> {
    if username.is_empty() || username.chars().count() > MAX_USERNAME_LENGTH {
        return Err(AuthError::BadRequest(format!(
            "Username must be 1-{} characters",
            MAX_USERNAME_LENGTH
        )));
    }
    // Usernames never look like emails, so a sign-in handle is unambiguous
    if username.contains('@') || username.chars().any(char::is_whitespace) {
        return Err(AuthError::BadRequest(
            "Username must not contain '@' or whitespace".to_string(),
        ));
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
        _ => return Err(AuthError::BadRequest("Invalid email address".to_string())),
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH || password.len() > MAX_PASSWORD_BYTES {
        return Err(AuthError::BadRequest(format!(
            "Password must be at least {} characters and at most {} bytes",
            MIN_PASSWORD_LENGTH, MAX_PASSWORD_BYTES
        )));
    }
    Ok(())
}

/// Provision a new identity with a bcrypt hash at the configured cost.
#[instrument(skip_all)]
pub async fn create_account(
    session: &StoreSession,
    config: &Config,
    request: &CreateAccountRequest,
) -> Result<AccountResponse, AuthError> {
    let username = request.username.trim();
    let email = request.email.trim();
    let password = request.password.expose_secret();
    validate_new_account(username, email, password)?;

    let roles = if request.roles.is_empty() {
        vec![Role::Writer]
    } else {
        parse_role_names(&request.roles)?
    };

    let password_hash = crypto::hash_password(password, config.bcrypt_cost)?;
    let identity = Identity::new(Uuid::new_v4(), username, email, password_hash, roles);
    session.create(&identity).await?;

    tracing::info!(
        target: "quill.admin",
        user = %hash_for_correlation(&identity.user_id.to_string()),
        roles = ?identity.roles,
        "Account created"
    );

    Ok(AccountResponse {
        user_id: identity.user_id,
        username: identity.username,
        roles: identity.roles,
    })
}

/// Replace the role set of an identity.
#[instrument(skip_all)]
pub async fn set_roles(
    session: &StoreSession,
    user_id: Uuid,
    names: &[String],
) -> Result<AccountResponse, AuthError> {
    let roles = parse_role_names(names)?;
    let now = Utc::now();

    let mut attempt = 1;
    loop {
        let mut identity = load(session, user_id).await?;
        identity.prune(now);
        identity.roles = roles.clone();

        match session.update(&identity).await {
            Ok(()) => {
                tracing::info!(
                    target: "quill.admin",
                    user = %hash_for_correlation(&user_id.to_string()),
                    roles = ?roles,
                    "Role set replaced"
                );
                return Ok(AccountResponse {
                    user_id,
                    username: identity.username,
                    roles,
                });
            }
            Err(AuthError::Conflict) if attempt < MAX_WRITE_ATTEMPTS => attempt += 1,
            Err(e) => return Err(e),
        }
    }
}
