//! Custom test assertions for expressive tests
//!
//! Assertions decode the token payload without verifying the signature;
//! signature checks belong to the service's own tests.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct JwtHeader {
    pub alg: String,
    pub typ: String,
}

#[derive(Debug, Deserialize)]
struct JwtClaims {
    pub typ: String,
    pub sub: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

fn segment(token: &str, index: usize) -> Vec<u8> {
    let part = token
        .split('.')
        .nth(index)
        .unwrap_or_else(|| panic!("JWT is missing segment {}", index));
    URL_SAFE_NO_PAD
        .decode(part)
        .unwrap_or_else(|e| panic!("Failed to base64 decode JWT segment {}: {}", index, e))
}

fn claims(token: &str) -> JwtClaims {
    serde_json::from_slice(&segment(token, 1)).expect("Failed to parse JWT claims")
}

/// Custom assertions for issued tokens
///
/// # Example
/// ```rust,ignore
/// tokens.access_token
///     .assert_valid_jwt()
///     .assert_kind("access")
///     .assert_for_subject(TEST_USER_ALICE)
///     .assert_lifetime(3600);
/// ```
pub trait TokenAssertions {
    /// Assert compact HS256 JWT structure with the expected claim set
    fn assert_valid_jwt(&self) -> &Self;

    /// Assert the `typ` claim
    fn assert_kind(&self, kind: &str) -> &Self;

    /// Assert the subject
    fn assert_for_subject(&self, user_id: Uuid) -> &Self;

    /// Assert the token id
    fn assert_token_id(&self, token_id: &str) -> &Self;

    /// Assert `exp - iat` equals `seconds`
    fn assert_lifetime(&self, seconds: i64) -> &Self;
}

impl TokenAssertions for String {
    fn assert_valid_jwt(&self) -> &Self {
        let parts = self.split('.').count();
        assert_eq!(
            parts, 3,
            "JWT must have 3 parts (header.payload.signature), got {}",
            parts
        );

        let header: JwtHeader =
            serde_json::from_slice(&segment(self, 0)).expect("Failed to parse JWT header JSON");
        assert_eq!(header.alg, "HS256", "Expected HS256 algorithm");
        assert_eq!(header.typ, "JWT", "Expected JWT type");

        let claims = claims(self);
        assert!(!claims.jti.is_empty(), "Token id must not be empty");
        assert!(claims.exp > claims.iat, "Token must expire after issuance");

        self
    }

    fn assert_kind(&self, kind: &str) -> &Self {
        let claims = claims(self);
        assert_eq!(claims.typ, kind, "Expected token kind '{}', got '{}'", kind, claims.typ);
        self
    }

    fn assert_for_subject(&self, user_id: Uuid) -> &Self {
        let claims = claims(self);
        assert_eq!(
            claims.sub,
            user_id.to_string(),
            "Expected subject '{}', got '{}'",
            user_id,
            claims.sub
        );
        self
    }

    fn assert_token_id(&self, token_id: &str) -> &Self {
        let claims = claims(self);
        assert_eq!(claims.jti, token_id, "Unexpected token id");
        self
    }

    fn assert_lifetime(&self, seconds: i64) -> &Self {
        let claims = claims(self);
        assert_eq!(
            claims.exp - claims.iat,
            seconds,
            "Expected lifetime of {} seconds, got {}",
            seconds,
            claims.exp - claims.iat
        );
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unsigned(payload: &str) -> String {
        let header = r#"{"alg":"HS256","typ":"JWT"}"#;
        format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(header.as_bytes()),
            URL_SAFE_NO_PAD.encode(payload.as_bytes())
        )
    }

    #[test]
    fn test_assertions_chain() {
        let sub = Uuid::from_u128(100);
        let token = unsigned(&format!(
            r#"{{"typ":"access","sub":"{}","jti":"a-1","iat":1000,"exp":4600}}"#,
            sub
        ));

        token
            .assert_valid_jwt()
            .assert_kind("access")
            .assert_for_subject(sub)
            .assert_token_id("a-1")
            .assert_lifetime(3600);
    }

    #[test]
    #[should_panic(expected = "JWT must have 3 parts")]
    fn test_assert_valid_jwt_with_invalid_structure() {
        "invalid.token".to_string().assert_valid_jwt();
    }

    #[test]
    #[should_panic(expected = "Expected token kind")]
    fn test_assert_kind_mismatch() {
        let token = unsigned(r#"{"typ":"refresh","sub":"x","jti":"r-1","iat":1,"exp":2}"#);
        token.assert_kind("access");
    }
}
