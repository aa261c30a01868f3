//! Postgres refresh-token revocation ledger.
//!
//! Records are append-only. Removing rows whose `expires_at` has passed is
//! left to an external retention job.

use super::{PgStore, RevokedTokenStore};
use crate::errors::AuthError;
use crate::models::RevokedToken;
use async_trait::async_trait;
use sqlx::PgConnection;

/// Insert a ledger record; an existing row for the same id wins.
pub(super) async fn insert_record(
    conn: &mut PgConnection,
    record: &RevokedToken,
) -> Result<(), AuthError> {
    sqlx::query(
        r#"
        INSERT INTO revoked_tokens (token_id, expires_at, user_id, username, created_at)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (token_id) DO NOTHING
        "#,
    )
    .bind(&record.token_id)
    .bind(record.expires_at)
    .bind(record.user_id)
    .bind(&record.username)
    .bind(record.created_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| AuthError::StorageUnavailable(format!("Failed to record revocation: {}", e)))?;

    Ok(())
}

#[async_trait]
impl RevokedTokenStore for PgStore {
    async fn insert(&self, record: &RevokedToken) -> Result<(), AuthError> {
        let mut conn = self.pool().acquire().await.map_err(|e| {
            AuthError::StorageUnavailable(format!("Failed to acquire connection: {}", e))
        })?;

        insert_record(&mut conn, record).await
    }

    async fn exists_by_id(&self, token_id: &str) -> Result<bool, AuthError> {
        let exists: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS(SELECT 1 FROM revoked_tokens WHERE token_id = $1)
            "#,
        )
        .bind(token_id)
        .fetch_one(self.pool())
        .await
        .map_err(|e| {
            AuthError::StorageUnavailable(format!("Failed to check revocation: {}", e))
        })?;

        Ok(exists.0)
    }
}
