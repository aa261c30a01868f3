//! Credential verification and token-id digests.
//!
//! The token codec lives in [`jwt`].

use crate::config::{MAX_BCRYPT_COST, MIN_BCRYPT_COST};
use crate::errors::AuthError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use ring::{
    hmac,
    rand::{SecureRandom, SystemRandom},
};
use tracing::instrument;

pub mod jwt;

/// Valid bcrypt hash of a random string, verified when the handle is
/// unknown so both sign-in failure paths cost the same.
pub const DUMMY_PASSWORD_HASH: &str =
    "$2b$12$LQv3c1yqBWVHxkd0LHAkCOYz6TtxMQJqhN8/LewY5GyYqExt7YD3a";

/// Prefix identifying the digest scheme of stored refresh-token ids.
const TOKEN_DIGEST_SCHEME: &str = "hmac-sha256";

/// Per-value salt length in bytes.
const TOKEN_DIGEST_SALT_LEN: usize = 16;

/// Check a plaintext secret against a stored bcrypt hash.
///
/// A malformed hash is reported as "no match", same as a wrong secret.
#[instrument(skip_all)]
pub fn verify_password(plaintext: &str, stored_hash: &str) -> bool {
    match bcrypt::verify(plaintext, stored_hash) {
        Ok(matches) => matches,
        Err(e) => {
            tracing::debug!(target: "quill.crypto", error = %e, "Stored password hash unusable");
            false
        }
    }
}

/// Hash a password with bcrypt.
///
/// # Errors
///
/// Returns `AuthError::Crypto` if the cost is outside 10-14 or hashing fails.
#[instrument(skip_all)]
pub fn hash_password(plaintext: &str, cost: u32) -> Result<String, AuthError> {
    if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&cost) {
        return Err(AuthError::Crypto(format!(
            "Invalid bcrypt cost: {} (must be {}-{})",
            cost, MIN_BCRYPT_COST, MAX_BCRYPT_COST
        )));
    }

    bcrypt::hash(plaintext, cost)
        .map_err(|e| AuthError::Crypto(format!("Password hashing failed: {}", e)))
}

/// Generate cryptographically secure random bytes
pub fn generate_random_bytes(len: usize) -> Result<Vec<u8>, AuthError> {
    let rng = SystemRandom::new();
    let mut bytes = vec![0u8; len];
    rng.fill(&mut bytes)
        .map_err(|e| AuthError::Crypto(format!("Random bytes generation failed: {}", e)))?;
    Ok(bytes)
}

/// One-way digest of a refresh-token id for storage.
///
/// Format: `hmac-sha256$<salt>$<tag>`, both base64url. The salt is random per
/// value and used as the HMAC key, so equal ids never produce equal digests.
#[instrument(skip_all)]
pub fn hash_token_id(token_id: &str) -> Result<String, AuthError> {
    let salt = generate_random_bytes(TOKEN_DIGEST_SALT_LEN)?;
    let key = hmac::Key::new(hmac::HMAC_SHA256, &salt);
    let tag = hmac::sign(&key, token_id.as_bytes());

    Ok(format!(
        "{}${}${}",
        TOKEN_DIGEST_SCHEME,
        URL_SAFE_NO_PAD.encode(&salt),
        URL_SAFE_NO_PAD.encode(tag.as_ref())
    ))
}

/// Constant-time check of a raw token id against a stored digest.
///
/// Unparseable digests never match.
pub fn token_id_matches(token_id: &str, stored_digest: &str) -> bool {
    let mut parts = stored_digest.splitn(3, '$');
    let (Some(scheme), Some(salt), Some(tag)) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };

    if scheme != TOKEN_DIGEST_SCHEME {
        return false;
    }

    let (Ok(salt), Ok(tag)) = (URL_SAFE_NO_PAD.decode(salt), URL_SAFE_NO_PAD.decode(tag)) else {
        return false;
    };

    let key = hmac::Key::new(hmac::HMAC_SHA256, &salt);
    hmac::verify(&key, token_id.as_bytes(), &tag).is_ok()
}
