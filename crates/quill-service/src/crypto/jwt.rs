//! HS256 token codec for access and refresh tokens.
//!
//! Expiry and issued-at are checked here against an explicit `now` rather
//! than by `jsonwebtoken`, whose leeway would let a token live past `exp`.

use crate::errors::AuthError;
use crate::models::TokenKind;
use chrono::{DateTime, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::instrument;
use uuid::Uuid;

/// Tokens above 4 KiB are rejected before any decoding or HMAC work.
pub const MAX_JWT_SIZE_BYTES: usize = 4096;

/// Verified claim set of an access or refresh token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "typ")]
    pub kind: TokenKind,
    /// Subject id (user id as a UUID string).
    pub sub: String,
    /// Unique token id, random per issuance.
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn subject_id(&self) -> Result<Uuid, AuthError> {
        Uuid::parse_str(&self.sub).map_err(|_| AuthError::MalformedToken)
    }

    pub fn issued_at(&self) -> Result<DateTime<Utc>, AuthError> {
        DateTime::from_timestamp(self.iat, 0).ok_or(AuthError::MalformedToken)
    }

    pub fn expires_at(&self) -> Result<DateTime<Utc>, AuthError> {
        DateTime::from_timestamp(self.exp, 0).ok_or(AuthError::MalformedToken)
    }
}

/// Redacts `sub` and `jti`.
impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claims")
            .field("kind", &self.kind)
            .field("sub", &"[REDACTED]")
            .field("jti", &"[REDACTED]")
            .field("iat", &self.iat)
            .field("exp", &self.exp)
            .finish()
    }
}

/// Issue a signed token of `kind` for `subject`, valid for `lifetime` from now.
///
/// Returns the claims for bookkeeping and the compact token for the client.
pub fn issue_token(
    kind: TokenKind,
    subject: Uuid,
    lifetime: chrono::Duration,
    secret: &[u8],
) -> Result<(Claims, String), AuthError> {
    issue_token_at(kind, subject, lifetime, secret, Utc::now())
}

/// [`issue_token`] with an explicit clock.
#[instrument(skip_all, fields(kind = %kind))]
pub fn issue_token_at(
    kind: TokenKind,
    subject: Uuid,
    lifetime: chrono::Duration,
    secret: &[u8],
    now: DateTime<Utc>,
) -> Result<(Claims, String), AuthError> {
    if lifetime <= chrono::Duration::zero() {
        return Err(AuthError::Crypto(format!(
            "Non-positive {} token lifetime",
            kind
        )));
    }

    let expires_at = now.checked_add_signed(lifetime).ok_or_else(|| {
        AuthError::Crypto(format!("{} token lifetime out of range", kind))
    })?;

    let claims = Claims {
        kind,
        sub: subject.to_string(),
        jti: Uuid::new_v4().to_string(),
        iat: now.timestamp(),
        exp: expires_at.timestamp(),
    };

    let header = Header::new(Algorithm::HS256);
    let token = encode(&header, &claims, &EncodingKey::from_secret(secret)).map_err(|e| {
        tracing::error!(target: "quill.crypto", error = %e, "Token signing failed");
        AuthError::Crypto("Token signing failed".to_string())
    })?;

    Ok((claims, token))
}

/// Verify a token's signature, kind and validity window.
pub fn verify_token(
    token: &str,
    secret: &[u8],
    expected_kind: TokenKind,
    clock_skew_seconds: i64,
) -> Result<Claims, AuthError> {
    verify_token_at(token, secret, expected_kind, clock_skew_seconds, Utc::now())
}

/// [`verify_token`] with an explicit clock.
///
/// Fails with `Expired` when `now >= exp` or when `iat` lies more than
/// `clock_skew_seconds` ahead of `now`.
#[instrument(skip_all, fields(expected_kind = %expected_kind))]
pub fn verify_token_at(
    token: &str,
    secret: &[u8],
    expected_kind: TokenKind,
    clock_skew_seconds: i64,
    now: DateTime<Utc>,
) -> Result<Claims, AuthError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "quill.crypto",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(AuthError::MalformedToken);
    }

    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.leeway = 0;

    let token_data = decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation)
        .map_err(|e| match e.kind() {
            ErrorKind::InvalidSignature => {
                tracing::debug!(target: "quill.crypto", "Token rejected: signature mismatch");
                AuthError::SignatureMismatch
            }
            _ => {
                tracing::debug!(target: "quill.crypto", error = %e, "Token rejected: malformed");
                AuthError::MalformedToken
            }
        })?;

    let claims = token_data.claims;

    if claims.kind != expected_kind {
        tracing::debug!(
            target: "quill.crypto",
            presented = %claims.kind,
            "Token rejected: wrong kind"
        );
        return Err(AuthError::WrongKind);
    }

    let now_ts = now.timestamp();

    if now_ts >= claims.exp {
        tracing::debug!(target: "quill.crypto", exp = claims.exp, now = now_ts, "Token rejected: expired");
        return Err(AuthError::Expired);
    }

    let max_iat = now_ts + clock_skew_seconds;
    if claims.iat > max_iat {
        tracing::debug!(
            target: "quill.crypto",
            iat = claims.iat,
            now = now_ts,
            max_allowed = max_iat,
            "Token rejected: iat too far in the future"
        );
        return Err(AuthError::Expired);
    }

    Ok(claims)
}
