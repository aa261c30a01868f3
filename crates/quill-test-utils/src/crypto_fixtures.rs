//! Deterministic fixtures for testing
//!
//! A fixed signing secret and low-cost bcrypt hashes keep tests fast and
//! reproducible. None of these values may be used outside tests.

use quill_service::config::Config;
use quill_service::models::{Identity, Role};
use std::collections::HashMap;
use uuid::Uuid;

/// HMAC signing secret shared by the test server and hand-built tokens.
pub const TEST_SIGNING_SECRET: &str = "quill-test-signing-secret-0123456789abcdef";

/// A different secret, for forged tokens.
pub const FOREIGN_SIGNING_SECRET: &str = "someone-elses-signing-secret-fedcba9876543210";

/// Password of every fixture identity.
pub const TEST_PASSWORD: &str = "correct horse battery staple";

/// bcrypt cost for fixtures. Below the production minimum, tests only.
pub const TEST_BCRYPT_COST: u32 = 4;

/// Configuration for tests: fixed secret, default lifetimes, insecure cookie
/// so plain-HTTP clients send it back.
pub fn test_config() -> Config {
    let vars = HashMap::from([
        (
            "DATABASE_URL".to_string(),
            "postgresql://localhost/quill_test".to_string(),
        ),
        ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
        ("JWT_SECRET".to_string(), TEST_SIGNING_SECRET.to_string()),
        ("COOKIE_SECURE".to_string(), "false".to_string()),
        // Lowest production cost, for accounts created through the API
        ("BCRYPT_COST".to_string(), "10".to_string()),
    ]);
    Config::from_vars(&vars).expect("test configuration must be valid")
}

/// bcrypt hash of `password` at [`TEST_BCRYPT_COST`].
pub fn test_password_hash(password: &str) -> String {
    bcrypt::hash(password, TEST_BCRYPT_COST).expect("bcrypt hashing should succeed")
}

/// Identity with [`TEST_PASSWORD`] and empty bookkeeping.
pub fn fixture_identity(user_id: Uuid, username: &str, roles: &[Role]) -> Identity {
    Identity::new(
        user_id,
        username,
        format!("{}@example.com", username),
        test_password_hash(TEST_PASSWORD),
        roles.to_vec(),
    )
}
