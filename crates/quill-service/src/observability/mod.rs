//! Logging and metrics helpers.
//!
//! Instrumented functions use `#[instrument(skip_all)]` and add fields
//! explicitly. Subject ids go through [`hash_for_correlation`]; tokens,
//! token ids, secrets and password hashes are never logged.

pub mod metrics;

use crate::errors::AuthError;
use sha2::{Digest, Sha256};

/// Hash a field value for correlation in logs (SHA-256, first 8 hex chars).
///
/// One-way and truncated; good enough to follow one subject across log lines.
pub fn hash_for_correlation(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest.get(..4).unwrap_or_default())
}

/// Error categories for metrics labels (bounded cardinality)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad credentials or a rejected token
    Authentication,
    /// Caller is known but lacks the role
    Authorization,
    Cryptographic,
    /// Storage, conflicts and everything else
    Internal,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Authentication => "authentication",
            ErrorCategory::Authorization => "authorization",
            ErrorCategory::Cryptographic => "cryptographic",
            ErrorCategory::Internal => "internal",
        }
    }
}

impl From<&AuthError> for ErrorCategory {
    fn from(err: &AuthError) -> Self {
        match err {
            AuthError::MalformedToken
            | AuthError::SignatureMismatch
            | AuthError::Expired
            | AuthError::WrongKind
            | AuthError::Revoked
            | AuthError::IdentityNotFound
            | AuthError::InvalidCredentials => ErrorCategory::Authentication,
            AuthError::Forbidden { .. } => ErrorCategory::Authorization,
            AuthError::Crypto(_) => ErrorCategory::Cryptographic,
            AuthError::BadRequest(_)
            | AuthError::NotFound(_)
            | AuthError::Conflict
            | AuthError::AlreadyExists(_)
            | AuthError::StorageUnavailable(_) => ErrorCategory::Internal,
        }
    }
}
