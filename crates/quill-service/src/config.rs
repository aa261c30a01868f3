use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default access-token lifetime (minutes).
pub const DEFAULT_ACCESS_TOKEN_LIFETIME_MINUTES: i64 = 60;

/// Upper bound for the access-token lifetime (24 hours).
pub const MAX_ACCESS_TOKEN_LIFETIME_MINUTES: i64 = 1440;

/// Default refresh-token lifetime (days).
pub const DEFAULT_REFRESH_TOKEN_LIFETIME_DAYS: i64 = 14;

/// Upper bound for the refresh-token lifetime.
pub const MAX_REFRESH_TOKEN_LIFETIME_DAYS: i64 = 365;

/// Default tolerance for `iat` claims in the future (5 minutes).
pub const DEFAULT_JWT_CLOCK_SKEW_SECONDS: i64 = 300;

/// Upper bound for the configurable clock skew.
pub const MAX_JWT_CLOCK_SKEW_SECONDS: i64 = 600;

/// Default bcrypt work factor for password hashing.
pub const DEFAULT_BCRYPT_COST: u32 = 12;

/// Minimum accepted bcrypt cost.
pub const MIN_BCRYPT_COST: u32 = 10;

/// Maximum accepted bcrypt cost.
pub const MAX_BCRYPT_COST: u32 = 14;

/// Default deadline budget for the store calls of one request.
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 2000;

/// Default whole-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// HMAC-SHA256 secrets shorter than the digest size are rejected.
pub const MIN_SIGNING_SECRET_BYTES: usize = 32;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    /// Shared HMAC secret used to sign and verify every token.
    pub signing_secret: SecretString,
    pub access_token_lifetime_minutes: i64,
    pub refresh_token_lifetime_days: i64,
    pub jwt_clock_skew_seconds: i64,
    pub bcrypt_cost: u32,
    pub store_timeout: Duration,
    pub request_timeout: Duration,
    pub cookie_secure: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {var}: {reason}")]
    InvalidValue { var: String, reason: String },

    #[error("Signing secret too short: {0} bytes (minimum 32)")]
    WeakSigningSecret(usize),
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing)
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_url = vars
            .get("DATABASE_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?
            .clone();

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| "0.0.0.0:8080".to_string());

        let signing_secret = vars
            .get("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("JWT_SECRET".to_string()))?;

        if signing_secret.len() < MIN_SIGNING_SECRET_BYTES {
            return Err(ConfigError::WeakSigningSecret(signing_secret.len()));
        }

        let access_token_lifetime_minutes = parse_var(
            vars,
            "ACCESS_TOKEN_LIFETIME_MINUTES",
            DEFAULT_ACCESS_TOKEN_LIFETIME_MINUTES,
        )?;
        if !(1..=MAX_ACCESS_TOKEN_LIFETIME_MINUTES).contains(&access_token_lifetime_minutes) {
            return Err(invalid(
                "ACCESS_TOKEN_LIFETIME_MINUTES",
                &format!("must be between 1 and {}", MAX_ACCESS_TOKEN_LIFETIME_MINUTES),
            ));
        }

        let refresh_token_lifetime_days = parse_var(
            vars,
            "REFRESH_TOKEN_LIFETIME_DAYS",
            DEFAULT_REFRESH_TOKEN_LIFETIME_DAYS,
        )?;
        if !(1..=MAX_REFRESH_TOKEN_LIFETIME_DAYS).contains(&refresh_token_lifetime_days) {
            return Err(invalid(
                "REFRESH_TOKEN_LIFETIME_DAYS",
                &format!("must be between 1 and {}", MAX_REFRESH_TOKEN_LIFETIME_DAYS),
            ));
        }

        let jwt_clock_skew_seconds = parse_var(
            vars,
            "JWT_CLOCK_SKEW_SECONDS",
            DEFAULT_JWT_CLOCK_SKEW_SECONDS,
        )?;
        if !(0..=MAX_JWT_CLOCK_SKEW_SECONDS).contains(&jwt_clock_skew_seconds) {
            return Err(invalid(
                "JWT_CLOCK_SKEW_SECONDS",
                &format!("must be between 0 and {}", MAX_JWT_CLOCK_SKEW_SECONDS),
            ));
        }

        let bcrypt_cost = parse_var(vars, "BCRYPT_COST", DEFAULT_BCRYPT_COST)?;
        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&bcrypt_cost) {
            return Err(invalid(
                "BCRYPT_COST",
                &format!("must be between {} and {}", MIN_BCRYPT_COST, MAX_BCRYPT_COST),
            ));
        }

        let store_timeout_ms = parse_var(vars, "STORE_TIMEOUT_MS", DEFAULT_STORE_TIMEOUT_MS)?;
        if store_timeout_ms == 0 {
            return Err(invalid("STORE_TIMEOUT_MS", "must be positive"));
        }

        let request_timeout_seconds = parse_var(
            vars,
            "REQUEST_TIMEOUT_SECONDS",
            DEFAULT_REQUEST_TIMEOUT_SECONDS,
        )?;

        let cookie_secure = parse_var(vars, "COOKIE_SECURE", true)?;

        Ok(Config {
            database_url,
            bind_address,
            signing_secret: SecretString::from(signing_secret.clone()),
            access_token_lifetime_minutes,
            refresh_token_lifetime_days,
            jwt_clock_skew_seconds,
            bcrypt_cost,
            store_timeout: Duration::from_millis(store_timeout_ms),
            request_timeout: Duration::from_secs(request_timeout_seconds),
            cookie_secure,
        })
    }

    pub fn access_token_lifetime(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.access_token_lifetime_minutes)
    }

    pub fn refresh_token_lifetime(&self) -> chrono::Duration {
        chrono::Duration::days(self.refresh_token_lifetime_days)
    }

    /// Raw signing secret bytes. Callers must not log the result.
    pub fn signing_secret_bytes(&self) -> &[u8] {
        self.signing_secret.expose_secret().as_bytes()
    }
}

fn parse_var<T: std::str::FromStr>(
    vars: &HashMap<String, String>,
    name: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match vars.get(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| invalid(name, &e.to_string())),
        None => Ok(default),
    }
}

fn invalid(var: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        var: var.to_string(),
        reason: reason.to_string(),
    }
}
