//! Postgres identity storage.
//!
//! An identity spans three tables: `users` (roles, version), `issued_tokens`
//! (both issued lists, told apart by `kind`) and `revoked_access_tokens`.
//! Writes replace the bookkeeping rows wholesale inside one transaction.

use super::{revoked_tokens, AuthStore, PgStore, UserStore};
use crate::errors::AuthError;
use crate::models::{Identity, IssuedToken, RevokedAccessToken, RevokedToken, Role, TokenKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

/// Row of the `users` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct UserRow {
    user_id: Uuid,
    username: String,
    email: String,
    password_hash: String,
    roles: Vec<String>,
    version: i64,
}

/// Row of the `issued_tokens` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct IssuedTokenRow {
    kind: String,
    token_id: String,
    client_label: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

fn db_error(context: &str, e: sqlx::Error) -> AuthError {
    AuthError::StorageUnavailable(format!("{}: {}", context, e))
}

/// Stored role names that no longer parse are dropped, never widened.
fn roles_from_names(user_id: Uuid, names: &[String]) -> Vec<Role> {
    names
        .iter()
        .filter_map(|name| {
            let role = Role::parse(name);
            if role.is_none() {
                tracing::warn!(
                    target: "quill.store",
                    user = %crate::observability::hash_for_correlation(&user_id.to_string()),
                    role = %name,
                    "Ignoring unknown stored role"
                );
            }
            role
        })
        .collect()
}

async fn load_identity(conn: &mut PgConnection, row: UserRow) -> Result<Identity, AuthError> {
    let issued = sqlx::query_as::<_, IssuedTokenRow>(
        r#"
        SELECT kind, token_id, client_label, issued_at, expires_at
        FROM issued_tokens
        WHERE user_id = $1
        ORDER BY issued_at
        "#,
    )
    .bind(row.user_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| db_error("Failed to fetch issued tokens", e))?;

    let revoked_access_tokens = sqlx::query_as::<_, RevokedAccessToken>(
        r#"
        SELECT token_id, until
        FROM revoked_access_tokens
        WHERE user_id = $1
        "#,
    )
    .bind(row.user_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| db_error("Failed to fetch revoked access tokens", e))?;

    let mut issued_access_tokens = Vec::new();
    let mut issued_refresh_tokens = Vec::new();
    for token in issued {
        let entry = IssuedToken {
            token_id: token.token_id,
            client_label: token.client_label,
            issued_at: token.issued_at,
            expires_at: token.expires_at,
        };
        if token.kind == TokenKind::Refresh.as_str() {
            issued_refresh_tokens.push(entry);
        } else {
            issued_access_tokens.push(entry);
        }
    }

    Ok(Identity {
        roles: roles_from_names(row.user_id, &row.roles),
        user_id: row.user_id,
        username: row.username,
        email: row.email,
        password_hash: row.password_hash,
        issued_access_tokens,
        issued_refresh_tokens,
        revoked_access_tokens,
        version: row.version,
    })
}

async fn insert_issued(
    conn: &mut PgConnection,
    user_id: Uuid,
    kind: TokenKind,
    tokens: &[IssuedToken],
) -> Result<(), AuthError> {
    if tokens.is_empty() {
        return Ok(());
    }

    let kinds: Vec<&str> = tokens.iter().map(|_| kind.as_str()).collect();
    let ids: Vec<&str> = tokens.iter().map(|t| t.token_id.as_str()).collect();
    let labels: Vec<&str> = tokens.iter().map(|t| t.client_label.as_str()).collect();
    let issued_at: Vec<DateTime<Utc>> = tokens.iter().map(|t| t.issued_at).collect();
    let expires_at: Vec<DateTime<Utc>> = tokens.iter().map(|t| t.expires_at).collect();

    sqlx::query(
        r#"
        INSERT INTO issued_tokens (user_id, kind, token_id, client_label, issued_at, expires_at)
        SELECT $1, t.kind, t.token_id, t.client_label, t.issued_at, t.expires_at
        FROM UNNEST($2::text[], $3::text[], $4::text[], $5::timestamptz[], $6::timestamptz[])
            AS t(kind, token_id, client_label, issued_at, expires_at)
        "#,
    )
    .bind(user_id)
    .bind(kinds)
    .bind(ids)
    .bind(labels)
    .bind(issued_at)
    .bind(expires_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| db_error("Failed to insert issued tokens", e))?;

    Ok(())
}

/// Versioned write of roles and bookkeeping. Must run inside a transaction.
pub(super) async fn write_identity(
    conn: &mut PgConnection,
    identity: &Identity,
) -> Result<(), AuthError> {
    let role_names: Vec<&str> = identity.roles.iter().map(Role::as_str).collect();

    let result = sqlx::query(
        r#"
        UPDATE users
        SET roles = $2, version = version + 1, updated_at = NOW()
        WHERE user_id = $1 AND version = $3
        "#,
    )
    .bind(identity.user_id)
    .bind(role_names)
    .bind(identity.version)
    .execute(&mut *conn)
    .await
    .map_err(|e| db_error("Failed to update user", e))?;

    if result.rows_affected() == 0 {
        let exists: Option<(Uuid,)> =
            sqlx::query_as("SELECT user_id FROM users WHERE user_id = $1")
                .bind(identity.user_id)
                .fetch_optional(&mut *conn)
                .await
                .map_err(|e| db_error("Failed to check user existence", e))?;

        return Err(match exists {
            Some(_) => AuthError::Conflict,
            None => AuthError::NotFound("User".to_string()),
        });
    }

    sqlx::query("DELETE FROM issued_tokens WHERE user_id = $1")
        .bind(identity.user_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| db_error("Failed to clear issued tokens", e))?;

    insert_issued(
        conn,
        identity.user_id,
        TokenKind::Access,
        &identity.issued_access_tokens,
    )
    .await?;
    insert_issued(
        conn,
        identity.user_id,
        TokenKind::Refresh,
        &identity.issued_refresh_tokens,
    )
    .await?;

    sqlx::query("DELETE FROM revoked_access_tokens WHERE user_id = $1")
        .bind(identity.user_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| db_error("Failed to clear revoked access tokens", e))?;

    if !identity.revoked_access_tokens.is_empty() {
        let ids: Vec<&str> = identity
            .revoked_access_tokens
            .iter()
            .map(|r| r.token_id.as_str())
            .collect();
        let until: Vec<DateTime<Utc>> =
            identity.revoked_access_tokens.iter().map(|r| r.until).collect();

        sqlx::query(
            r#"
            INSERT INTO revoked_access_tokens (user_id, token_id, until)
            SELECT $1, t.token_id, t.until
            FROM UNNEST($2::text[], $3::timestamptz[]) AS t(token_id, until)
            ON CONFLICT (user_id, token_id) DO NOTHING
            "#,
        )
        .bind(identity.user_id)
        .bind(ids)
        .bind(until)
        .execute(&mut *conn)
        .await
        .map_err(|e| db_error("Failed to insert revoked access tokens", e))?;
    }

    Ok(())
}

#[async_trait]
impl UserStore for PgStore {
    async fn get_by_id(&self, user_id: Uuid) -> Result<Option<Identity>, AuthError> {
        let mut conn = self
            .pool()
            .acquire()
            .await
            .map_err(|e| db_error("Failed to acquire connection", e))?;

        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT user_id, username, email, password_hash, roles, version
            FROM users
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| db_error("Failed to fetch user by id", e))?;

        match row {
            Some(row) => Ok(Some(load_identity(&mut conn, row).await?)),
            None => Ok(None),
        }
    }

    async fn get_by_credential_handle(
        &self,
        handle: &str,
    ) -> Result<Option<Identity>, AuthError> {
        let mut conn = self
            .pool()
            .acquire()
            .await
            .map_err(|e| db_error("Failed to acquire connection", e))?;

        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT user_id, username, email, password_hash, roles, version
            FROM users
            WHERE username = $1 OR lower(email) = lower($1)
            ORDER BY (username = $1) DESC
            LIMIT 1
            "#,
        )
        .bind(handle)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| db_error("Failed to fetch user by handle", e))?;

        match row {
            Some(row) => Ok(Some(load_identity(&mut conn, row).await?)),
            None => Ok(None),
        }
    }

    async fn create(&self, identity: &Identity) -> Result<(), AuthError> {
        let role_names: Vec<&str> = identity.roles.iter().map(Role::as_str).collect();

        sqlx::query(
            r#"
            INSERT INTO users (user_id, username, email, password_hash, roles, version)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(identity.user_id)
        .bind(&identity.username)
        .bind(&identity.email)
        .bind(&identity.password_hash)
        .bind(role_names)
        .bind(identity.version)
        .execute(self.pool())
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AuthError::AlreadyExists("User".to_string())
            }
            _ => db_error("Failed to create user", e),
        })?;

        Ok(())
    }

    async fn update(&self, identity: &Identity) -> Result<(), AuthError> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| db_error("Failed to start transaction", e))?;

        write_identity(&mut tx, identity).await?;

        tx.commit()
            .await
            .map_err(|e| db_error("Failed to commit identity update", e))?;

        Ok(())
    }
}

#[async_trait]
impl AuthStore for PgStore {
    async fn update_with_revocation(
        &self,
        identity: &Identity,
        record: &RevokedToken,
    ) -> Result<(), AuthError> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| db_error("Failed to start transaction", e))?;

        write_identity(&mut tx, identity).await?;
        revoked_tokens::insert_record(&mut tx, record).await?;

        tx.commit()
            .await
            .map_err(|e| db_error("Failed to commit rotation", e))?;

        Ok(())
    }

    async fn ping(&self) -> Result<(), AuthError> {
        sqlx::query("SELECT 1")
            .execute(self.pool())
            .await
            .map_err(|e| db_error("Ping failed", e))?;
        Ok(())
    }
}
