pub mod authentication_service;
pub mod authorization_service;
pub mod session_service;
pub mod token_service;

/// Optimistic identity writes are retried this many times before giving up.
pub(crate) const MAX_WRITE_ATTEMPTS: usize = 3;
