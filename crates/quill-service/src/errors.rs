use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Message returned for every token failure. Clients never learn which
/// check rejected them.
const UNAUTHENTICATED_MESSAGE: &str = "Authentication required";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Malformed token")]
    MalformedToken,

    #[error("Token signature mismatch")]
    SignatureMismatch,

    /// The token is outside its validity window (expired, or issued in the future).
    #[error("Token expired")]
    Expired,

    #[error("Token kind does not match the endpoint")]
    WrongKind,

    #[error("Token revoked")]
    Revoked,

    #[error("Identity not found")]
    IdentityNotFound,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Role required: {required}")]
    Forbidden { required: String },

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// An optimistic write lost against a concurrent update of the same identity.
    #[error("Concurrent update conflict")]
    Conflict,

    /// A unique username or email is already taken.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Cryptographic error: {0}")]
    Crypto(String),
}

impl AuthError {
    /// True for the failures folded into the single "unauthenticated" outcome.
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            AuthError::MalformedToken
                | AuthError::SignatureMismatch
                | AuthError::Expired
                | AuthError::WrongKind
                | AuthError::Revoked
                | AuthError::IdentityNotFound
        )
    }

    /// Bounded label describing why a token was rejected (metrics only).
    pub fn rejection_reason(&self) -> &'static str {
        match self {
            AuthError::MalformedToken => "malformed",
            AuthError::SignatureMismatch => "signature",
            AuthError::Expired => "expired",
            AuthError::WrongKind => "wrong_kind",
            AuthError::Revoked => "revoked",
            AuthError::IdentityNotFound => "identity_not_found",
            AuthError::StorageUnavailable(_) => "storage",
            _ => "other",
        }
    }

    pub fn status_code(&self) -> u16 {
        self.status().as_u16()
    }

    fn status(&self) -> StatusCode {
        match self {
            e if e.is_unauthenticated() => StatusCode::UNAUTHORIZED,
            AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AuthError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AuthError::NotFound(_) => StatusCode::NOT_FOUND,
            AuthError::Conflict | AuthError::AlreadyExists(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    required_role: Option<String>,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, message, required_role) = match &self {
            e if e.is_unauthenticated() => {
                ("UNAUTHENTICATED", UNAUTHENTICATED_MESSAGE.to_string(), None)
            }
            AuthError::InvalidCredentials => (
                "INVALID_CREDENTIALS",
                "Invalid username or password".to_string(),
                None,
            ),
            AuthError::Forbidden { required } => (
                "FORBIDDEN",
                format!("Requires role: {}", required),
                Some(required.clone()),
            ),
            AuthError::BadRequest(reason) => ("BAD_REQUEST", reason.clone(), None),
            AuthError::NotFound(what) => ("NOT_FOUND", format!("{} not found", what), None),
            AuthError::Conflict => (
                "CONFLICT",
                "The resource was modified concurrently, please retry".to_string(),
                None,
            ),
            AuthError::AlreadyExists(what) => {
                ("ALREADY_EXISTS", format!("{} already exists", what), None)
            }
            AuthError::StorageUnavailable(detail) | AuthError::Crypto(detail) => {
                tracing::error!(target: "quill.errors", error = %detail, "Internal failure");
                (
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
            _ => (
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
                None,
            ),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                required_role,
            },
        };

        (status, Json(error_response)).into_response()
    }
}
