//! Builder patterns for test data construction
//!
//! Tokens are signed here with `jsonwebtoken` directly rather than through the
//! service's codec, so tests can produce tokens the service would never issue.

use crate::crypto_fixtures::TEST_SIGNING_SECRET;
use crate::test_ids::TEST_USER_ALICE;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;
use uuid::Uuid;

/// Builder for hand-crafted HS256 tokens
///
/// # Example
/// ```rust,ignore
/// let expired = TestTokenBuilder::new()
///     .for_user(TEST_USER_ALICE)
///     .expired_seconds_ago(60)
///     .build();
/// ```
pub struct TestTokenBuilder {
    kind: String,
    sub: String,
    jti: String,
    exp: i64,
    iat: i64,
    secret: Vec<u8>,
}

impl TestTokenBuilder {
    /// Access token for [`TEST_USER_ALICE`], valid for an hour, signed with
    /// the test secret.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            kind: "access".to_string(),
            sub: TEST_USER_ALICE.to_string(),
            jti: Uuid::new_v4().to_string(),
            exp: (now + Duration::seconds(3600)).timestamp(),
            iat: now.timestamp(),
            secret: TEST_SIGNING_SECRET.as_bytes().to_vec(),
        }
    }

    /// Set the subject
    pub fn for_user(mut self, user_id: Uuid) -> Self {
        self.sub = user_id.to_string();
        self
    }

    /// Set a raw subject, e.g. one that is not a UUID
    pub fn with_raw_subject(mut self, subject: &str) -> Self {
        self.sub = subject.to_string();
        self
    }

    /// Set the `typ` claim ("access", "refresh", or anything else)
    pub fn of_kind(mut self, kind: &str) -> Self {
        self.kind = kind.to_string();
        self
    }

    /// Set the token id
    pub fn with_id(mut self, jti: &str) -> Self {
        self.jti = jti.to_string();
        self
    }

    /// Set expiration in seconds from now
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self
    }

    /// Expire the token `seconds` ago; it was issued an hour before that.
    pub fn expired_seconds_ago(mut self, seconds: i64) -> Self {
        let exp = Utc::now() - Duration::seconds(seconds);
        self.exp = exp.timestamp();
        self.iat = (exp - Duration::seconds(3600)).timestamp();
        self
    }

    /// Set issued-at timestamp
    pub fn issued_at(mut self, timestamp: i64) -> Self {
        self.iat = timestamp;
        self
    }

    /// Sign with a different secret
    pub fn signed_with(mut self, secret: &str) -> Self {
        self.secret = secret.as_bytes().to_vec();
        self
    }

    /// Build the claims as a JSON value
    pub fn build_claims(&self) -> serde_json::Value {
        json!({
            "typ": self.kind,
            "sub": self.sub,
            "jti": self.jti,
            "iat": self.iat,
            "exp": self.exp,
        })
    }

    /// Sign the claims into a compact HS256 token
    pub fn build(self) -> String {
        encode(
            &Header::default(),
            &self.build_claims(),
            &EncodingKey::from_secret(&self.secret),
        )
        .expect("HS256 signing should succeed")
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}
