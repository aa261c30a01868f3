pub mod account_handler;
pub mod admin_handler;
pub mod auth_handler;
pub mod health;

use crate::errors::AuthError;
use crate::observability::{metrics::record_error, ErrorCategory};

/// Count a failed operation and hand the error back for the response.
pub(crate) fn record_failure(operation: &'static str, err: AuthError) -> AuthError {
    record_error(
        operation,
        ErrorCategory::from(&err).as_str(),
        err.status_code(),
    );
    err
}
