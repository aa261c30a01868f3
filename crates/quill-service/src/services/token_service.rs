//! Sign-in, refresh and sign-out flows.
//!
//! Each flow ends in exactly one identity write. Refresh and sign-out write
//! the identity and the ledger record together, so a rotated or signed-out
//! refresh token is revoked before any new token leaves the service.

use super::authentication_service::{find_refresh_entry, load_refresh_owner, RefreshContext};
use super::MAX_WRITE_ATTEMPTS;
use crate::config::Config;
use crate::crypto::{self, jwt, jwt::Claims, DUMMY_PASSWORD_HASH};
use crate::errors::AuthError;
use crate::models::{Identity, IssuedToken, RevokedToken, TokenKind, TokenResponse};
use crate::observability::{hash_for_correlation, metrics::record_token_issuance};
use crate::repositories::StoreSession;
use chrono::{DateTime, Utc};
use std::time::Instant;
use tracing::instrument;
use uuid::Uuid;

/// Client labels longer than this are truncated.
pub const CLIENT_LABEL_MAX_CHARS: usize = 128;

/// Label used when the client supplies none.
pub const DEFAULT_CLIENT_LABEL: &str = "unknown";

/// A freshly minted access/refresh pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub access_claims: Claims,
    pub refresh_token: String,
    pub refresh_claims: Claims,
}

impl TokenPair {
    pub fn to_response(&self) -> TokenResponse {
        let lifetime = self.access_claims.exp - self.access_claims.iat;
        TokenResponse {
            access_token: self.access_token.clone(),
            token_type: "Bearer".to_string(),
            expires_in: u64::try_from(lifetime).unwrap_or(0),
            token_id: self.access_claims.jti.clone(),
        }
    }
}

/// Trim and bound a client-supplied label.
pub fn normalize_client_label(label: Option<&str>) -> String {
    match label.map(str::trim).filter(|l| !l.is_empty()) {
        Some(l) => l.chars().take(CLIENT_LABEL_MAX_CHARS).collect(),
        None => DEFAULT_CLIENT_LABEL.to_string(),
    }
}

fn mint_pair(config: &Config, subject: Uuid, now: DateTime<Utc>) -> Result<TokenPair, AuthError> {
    let secret = config.signing_secret_bytes();
    let (access_claims, access_token) = jwt::issue_token_at(
        TokenKind::Access,
        subject,
        config.access_token_lifetime(),
        secret,
        now,
    )?;
    let (refresh_claims, refresh_token) = jwt::issue_token_at(
        TokenKind::Refresh,
        subject,
        config.refresh_token_lifetime(),
        secret,
        now,
    )?;

    Ok(TokenPair {
        access_token,
        access_claims,
        refresh_token,
        refresh_claims,
    })
}

/// Append bookkeeping for `pair`; the refresh id is stored as a digest.
fn record_pair(identity: &mut Identity, pair: &TokenPair, label: &str) -> Result<(), AuthError> {
    identity.issued_access_tokens.push(IssuedToken {
        token_id: pair.access_claims.jti.clone(),
        client_label: label.to_string(),
        issued_at: pair.access_claims.issued_at()?,
        expires_at: pair.access_claims.expires_at()?,
    });
    identity.issued_refresh_tokens.push(IssuedToken {
        token_id: crypto::hash_token_id(&pair.refresh_claims.jti)?,
        client_label: label.to_string(),
        issued_at: pair.refresh_claims.issued_at()?,
        expires_at: pair.refresh_claims.expires_at()?,
    });
    Ok(())
}

fn revocation_record(
    identity: &Identity,
    claims: &Claims,
    now: DateTime<Utc>,
) -> Result<RevokedToken, AuthError> {
    Ok(RevokedToken {
        token_id: claims.jti.clone(),
        expires_at: claims.expires_at()?,
        user_id: identity.user_id,
        username: identity.username.clone(),
        created_at: now,
    })
}

/// Verify credentials and issue a new pair.
///
/// Unknown handles still pay for one bcrypt verification against a dummy
/// hash, and fail with the same `InvalidCredentials` as a wrong password.
pub async fn sign_in(
    session: &StoreSession,
    config: &Config,
    login: &str,
    password: &str,
    client_label: &str,
) -> Result<TokenPair, AuthError> {
    sign_in_at(session, config, login, password, client_label, Utc::now()).await
}

#[instrument(skip_all)]
pub async fn sign_in_at(
    session: &StoreSession,
    config: &Config,
    login: &str,
    password: &str,
    client_label: &str,
    now: DateTime<Utc>,
) -> Result<TokenPair, AuthError> {
    let start = Instant::now();
    let result = sign_in_inner(session, config, login, password, client_label, now).await;
    let status = if result.is_ok() { "success" } else { "error" };
    record_token_issuance("sign_in", status, start.elapsed());
    result
}

async fn sign_in_inner(
    session: &StoreSession,
    config: &Config,
    login: &str,
    password: &str,
    client_label: &str,
    now: DateTime<Utc>,
) -> Result<TokenPair, AuthError> {
    let identity = session.get_by_credential_handle(login).await?;

    let hash_to_verify = identity
        .as_ref()
        .map(|i| i.password_hash.as_str())
        .unwrap_or(DUMMY_PASSWORD_HASH);
    let is_valid = crypto::verify_password(password, hash_to_verify);

    let mut identity = match identity {
        Some(identity) if is_valid => identity,
        _ => {
            tracing::debug!(target: "quill.auth", "Sign-in rejected");
            return Err(AuthError::InvalidCredentials);
        }
    };

    let user_id = identity.user_id;
    let pair = mint_pair(config, user_id, now)?;

    let mut attempt = 1;
    loop {
        identity.prune(now);
        record_pair(&mut identity, &pair, client_label)?;

        match session.update(&identity).await {
            Ok(()) => break,
            Err(AuthError::Conflict) if attempt < MAX_WRITE_ATTEMPTS => {
                attempt += 1;
                identity = session
                    .get_by_id(user_id)
                    .await?
                    .ok_or(AuthError::IdentityNotFound)?;
            }
            Err(e) => return Err(e),
        }
    }

    tracing::info!(
        target: "quill.auth",
        user = %hash_for_correlation(&user_id.to_string()),
        "Signed in"
    );

    Ok(pair)
}

/// Rotate the presented refresh token into a new pair.
///
/// The old refresh id is written to the ledger and dropped from the
/// bookkeeping in the same store write that records the new pair. The new
/// pair inherits the client label of the consumed entry.
pub async fn refresh(
    session: &StoreSession,
    config: &Config,
    ctx: RefreshContext,
) -> Result<TokenPair, AuthError> {
    refresh_at(session, config, ctx, Utc::now()).await
}

#[instrument(skip_all)]
pub async fn refresh_at(
    session: &StoreSession,
    config: &Config,
    ctx: RefreshContext,
    now: DateTime<Utc>,
) -> Result<TokenPair, AuthError> {
    let start = Instant::now();
    let result = refresh_inner(session, config, ctx, now).await;
    let status = if result.is_ok() { "success" } else { "error" };
    record_token_issuance("refresh", status, start.elapsed());
    result
}

async fn refresh_inner(
    session: &StoreSession,
    config: &Config,
    ctx: RefreshContext,
    now: DateTime<Utc>,
) -> Result<TokenPair, AuthError> {
    let RefreshContext {
        mut identity,
        claims,
    } = ctx;

    let pair = mint_pair(config, identity.user_id, now)?;
    let record = revocation_record(&identity, &claims, now)?;

    let mut attempt = 1;
    loop {
        let pos = find_refresh_entry(&identity, &claims.jti, now).ok_or(AuthError::Revoked)?;
        let consumed = identity.issued_refresh_tokens.remove(pos);
        identity.prune(now);
        record_pair(&mut identity, &pair, &consumed.client_label)?;

        match session.update_with_revocation(&identity, &record).await {
            Ok(()) => break,
            Err(AuthError::Conflict) if attempt < MAX_WRITE_ATTEMPTS => {
                // A concurrent rotation of the same token wins; reloading
                // then fails with Revoked.
                attempt += 1;
                identity = load_refresh_owner(session, &claims, now).await?;
            }
            Err(e) => return Err(e),
        }
    }

    tracing::info!(
        target: "quill.auth",
        user = %hash_for_correlation(&identity.user_id.to_string()),
        "Refresh token rotated"
    );

    Ok(pair)
}

/// Revoke the presented refresh token and, optionally, one access token of
/// the same identity.
///
/// An `access_token_id` not on the identity's issued list is ignored.
pub async fn sign_out(
    session: &StoreSession,
    ctx: RefreshContext,
    access_token_id: Option<&str>,
) -> Result<(), AuthError> {
    sign_out_at(session, ctx, access_token_id, Utc::now()).await
}

#[instrument(skip_all)]
pub async fn sign_out_at(
    session: &StoreSession,
    ctx: RefreshContext,
    access_token_id: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(), AuthError> {
    let RefreshContext {
        mut identity,
        claims,
    } = ctx;

    let record = revocation_record(&identity, &claims, now)?;

    let mut attempt = 1;
    loop {
        let pos = find_refresh_entry(&identity, &claims.jti, now).ok_or(AuthError::Revoked)?;
        identity.issued_refresh_tokens.remove(pos);

        if let Some(id) = access_token_id {
            if !identity.revoke_access_token(id) {
                tracing::debug!(target: "quill.auth", "Sign-out access token id not issued, ignoring");
            }
        }
        identity.prune(now);

        match session.update_with_revocation(&identity, &record).await {
            Ok(()) => break,
            Err(AuthError::Conflict) if attempt < MAX_WRITE_ATTEMPTS => {
                attempt += 1;
                identity = load_refresh_owner(session, &claims, now).await?;
            }
            Err(e) => return Err(e),
        }
    }

    tracing::info!(
        target: "quill.auth",
        user = %hash_for_correlation(&identity.user_id.to_string()),
        "Signed out"
    );

    Ok(())
}
