//! Identity and revocation storage.
//!
//! The authentication core talks to storage only through the traits below.
//! Two backends exist: [`PgStore`] for deployments and [`MemoryStore`] for
//! tests. Request code never calls a backend directly; it goes through a
//! [`StoreSession`], which bounds every call by one per-request deadline.

use crate::errors::AuthError;
use crate::models::{Identity, RevokedToken};
use async_trait::async_trait;
use sqlx::PgPool;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

pub mod memory;
pub mod revoked_tokens;
pub mod users;

pub use memory::MemoryStore;

/// Identity lookup and bookkeeping writes.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_by_id(&self, user_id: Uuid) -> Result<Option<Identity>, AuthError>;

    /// Lookup by username or email. An exact username match wins over an
    /// email match on another identity.
    async fn get_by_credential_handle(&self, handle: &str)
        -> Result<Option<Identity>, AuthError>;

    /// Insert a new identity. Fails with `AlreadyExists` when the username
    /// or the email (case-insensitive) is taken.
    async fn create(&self, identity: &Identity) -> Result<(), AuthError>;

    /// Persist roles and all three bookkeeping lists in one atomic write.
    ///
    /// Fails with `Conflict` if the stored version differs from
    /// `identity.version`, and with `NotFound` if the identity is gone.
    async fn update(&self, identity: &Identity) -> Result<(), AuthError>;
}

/// Ledger of revoked refresh tokens.
#[async_trait]
pub trait RevokedTokenStore: Send + Sync {
    /// Idempotent: inserting an already revoked id is not an error.
    async fn insert(&self, record: &RevokedToken) -> Result<(), AuthError>;

    async fn exists_by_id(&self, token_id: &str) -> Result<bool, AuthError>;
}

/// Everything the authentication core needs from storage.
#[async_trait]
pub trait AuthStore: UserStore + RevokedTokenStore {
    /// Identity write plus ledger insert, committed together or not at all.
    async fn update_with_revocation(
        &self,
        identity: &Identity,
        record: &RevokedToken,
    ) -> Result<(), AuthError>;

    /// Cheap round trip used by the readiness probe.
    async fn ping(&self) -> Result<(), AuthError>;
}

/// Postgres backend. Trait impls live in [`users`] and [`revoked_tokens`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Shared handle to the configured backend plus the per-request budget.
#[derive(Clone)]
pub struct Store {
    backend: Arc<dyn AuthStore>,
    budget: Duration,
}

impl Store {
    pub fn new(backend: Arc<dyn AuthStore>, budget: Duration) -> Self {
        Self { backend, budget }
    }

    /// Open a session whose deadline is fixed now.
    pub fn session(&self) -> StoreSession {
        StoreSession {
            backend: Arc::clone(&self.backend),
            deadline: Instant::now() + self.budget,
        }
    }
}

/// Request-scoped view of the store. Every call shares one deadline; once it
/// has passed, calls fail with `StorageUnavailable` instead of waiting.
#[derive(Clone)]
pub struct StoreSession {
    backend: Arc<dyn AuthStore>,
    deadline: Instant,
}

impl StoreSession {
    pub async fn get_by_id(&self, user_id: Uuid) -> Result<Option<Identity>, AuthError> {
        self.bounded("get_by_id", self.backend.get_by_id(user_id))
            .await
    }

    pub async fn get_by_credential_handle(
        &self,
        handle: &str,
    ) -> Result<Option<Identity>, AuthError> {
        self.bounded(
            "get_by_credential_handle",
            self.backend.get_by_credential_handle(handle),
        )
        .await
    }

    pub async fn create(&self, identity: &Identity) -> Result<(), AuthError> {
        self.bounded("create", self.backend.create(identity)).await
    }

    pub async fn update(&self, identity: &Identity) -> Result<(), AuthError> {
        self.bounded("update", self.backend.update(identity)).await
    }

    /// Standalone ledger insert. Request paths go through
    /// [`StoreSession::update_with_revocation`] instead.
    #[cfg(test)]
    pub async fn revoke(&self, record: &RevokedToken) -> Result<(), AuthError> {
        self.bounded("revoke", self.backend.insert(record)).await
    }

    pub async fn is_revoked(&self, token_id: &str) -> Result<bool, AuthError> {
        self.bounded("is_revoked", self.backend.exists_by_id(token_id))
            .await
    }

    pub async fn update_with_revocation(
        &self,
        identity: &Identity,
        record: &RevokedToken,
    ) -> Result<(), AuthError> {
        self.bounded(
            "update_with_revocation",
            self.backend.update_with_revocation(identity, record),
        )
        .await
    }

    pub async fn ping(&self) -> Result<(), AuthError> {
        self.bounded("ping", self.backend.ping()).await
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T, AuthError>>,
    ) -> Result<T, AuthError> {
        match tokio::time::timeout_at(self.deadline, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    target: "quill.store",
                    operation = operation,
                    "Store deadline elapsed, failing closed"
                );
                Err(AuthError::StorageUnavailable(format!(
                    "deadline elapsed during {}",
                    operation
                )))
            }
        }
    }
}
