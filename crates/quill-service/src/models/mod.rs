use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

mod roles;

pub use roles::Role;

/// Token kind carried in the `typ` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bookkeeping entry for a token handed to a client.
///
/// For refresh tokens `token_id` holds the salted digest produced by
/// [`crate::crypto::hash_token_id`], never the raw id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct IssuedToken {
    pub token_id: String,
    pub client_label: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl IssuedToken {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Access token revoked before its natural expiry, tracked on the identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RevokedAccessToken {
    pub token_id: String,
    pub until: DateTime<Utc>,
}

/// Ledger record for a revoked refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RevokedToken {
    pub token_id: String,
    pub expires_at: DateTime<Utc>,
    /// Owner at revocation time.
    pub user_id: Uuid,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// A principal as held by the user store, with its token bookkeeping.
#[derive(Clone, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub roles: Vec<Role>,
    pub issued_access_tokens: Vec<IssuedToken>,
    pub issued_refresh_tokens: Vec<IssuedToken>,
    pub revoked_access_tokens: Vec<RevokedAccessToken>,
    /// Optimistic concurrency version, bumped by every store write.
    pub version: i64,
}

impl Identity {
    /// New identity with empty bookkeeping.
    pub fn new(
        user_id: Uuid,
        username: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
        roles: Vec<Role>,
    ) -> Self {
        Self {
            user_id,
            username: username.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            roles,
            issued_access_tokens: Vec::new(),
            issued_refresh_tokens: Vec::new(),
            revoked_access_tokens: Vec::new(),
            version: 0,
        }
    }

    /// Whether `token_id` is on the revoked-access list with `until` still ahead.
    pub fn access_token_revoked(&self, token_id: &str, now: DateTime<Utc>) -> bool {
        self.revoked_access_tokens
            .iter()
            .any(|r| r.token_id == token_id && now < r.until)
    }

    /// Drop expired issued entries and elapsed revocations.
    pub fn prune(&mut self, now: DateTime<Utc>) {
        self.issued_access_tokens.retain(|t| t.is_live(now));
        self.issued_refresh_tokens.retain(|t| t.is_live(now));
        self.revoked_access_tokens.retain(|r| now < r.until);
    }

    /// Move an issued access token to the revoked list until its expiry.
    ///
    /// Returns false when the id is not on the issued list.
    pub fn revoke_access_token(&mut self, token_id: &str) -> bool {
        let Some(pos) = self
            .issued_access_tokens
            .iter()
            .position(|t| t.token_id == token_id)
        else {
            return false;
        };

        let entry = self.issued_access_tokens.remove(pos);
        self.revoked_access_tokens.push(RevokedAccessToken {
            token_id: entry.token_id,
            until: entry.expires_at,
        });
        true
    }
}

/// Custom Debug implementation that redacts the password hash.
impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("user_id", &self.user_id)
            .field("username", &self.username)
            .field("email", &"[REDACTED]")
            .field("password_hash", &"[REDACTED]")
            .field("roles", &self.roles)
            .field("issued_access_tokens", &self.issued_access_tokens.len())
            .field("issued_refresh_tokens", &self.issued_refresh_tokens.len())
            .field("revoked_access_tokens", &self.revoked_access_tokens.len())
            .field("version", &self.version)
            .finish()
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    /// Username or email.
    pub login: String,
    pub password: secrecy::SecretString,
    #[serde(default)]
    pub client_label: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SignOutRequest {
    /// Access-token id to revoke alongside the refresh token.
    #[serde(default)]
    pub access_token_id: Option<String>,
}

/// Body returned by sign-in and refresh. The refresh token travels in a cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    /// Id of the access token, usable for targeted revocation at sign-out.
    pub token_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountResponse {
    pub user_id: Uuid,
    pub username: String,
    pub roles: Vec<Role>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Present for access tokens only; refresh ids are stored as digests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_id: Option<String>,
    pub kind: TokenKind,
    pub client_label: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsResponse {
    pub user_id: Uuid,
    pub sessions: Vec<SessionSummary>,
}

/// New account. An empty role list means Writer.
#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub username: String,
    pub email: String,
    pub password: secrecy::SecretString,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRolesRequest {
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RevokeSessionsResponse {
    pub revoked_access_tokens: usize,
    pub dropped_refresh_tokens: usize,
}
