//! In-process store for tests and local runs.
//!
//! Holds the same invariants as the Postgres backend: versioned identity
//! writes, idempotent ledger inserts, and a combined write that applies
//! both or neither. Faults can be injected to exercise fail-closed paths.

use super::{AuthStore, RevokedTokenStore, UserStore};
use crate::errors::AuthError;
use crate::models::{Identity, RevokedToken};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, Identity>,
    revoked: HashMap<String, RevokedToken>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    unavailable: AtomicBool,
    latency_ms: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or overwrite an identity, bypassing the version check.
    pub async fn insert_identity(&self, identity: Identity) {
        let mut state = self.state.lock().await;
        state.users.insert(identity.user_id, identity);
    }

    /// Make every subsequent call fail with `StorageUnavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delay every subsequent call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        let millis = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.latency_ms.store(millis, Ordering::SeqCst);
    }

    pub async fn revoked_count(&self) -> usize {
        self.state.lock().await.revoked.len()
    }

    async fn check_faults(&self) -> Result<(), AuthError> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AuthError::StorageUnavailable(
                "memory store marked unavailable".to_string(),
            ));
        }

        Ok(())
    }
}

/// Apply a versioned write to the map, bumping the stored version.
fn apply_update(state: &mut MemoryState, identity: &Identity) -> Result<(), AuthError> {
    let stored = state
        .users
        .get_mut(&identity.user_id)
        .ok_or_else(|| AuthError::NotFound("User".to_string()))?;

    if stored.version != identity.version {
        return Err(AuthError::Conflict);
    }

    let mut next = identity.clone();
    next.version = identity.version + 1;
    *stored = next;
    Ok(())
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get_by_id(&self, user_id: Uuid) -> Result<Option<Identity>, AuthError> {
        self.check_faults().await?;
        Ok(self.state.lock().await.users.get(&user_id).cloned())
    }

    async fn get_by_credential_handle(
        &self,
        handle: &str,
    ) -> Result<Option<Identity>, AuthError> {
        self.check_faults().await?;
        let state = self.state.lock().await;
        // A username match wins over another identity's email
        let by_username = state.users.values().find(|u| u.username == handle);
        Ok(by_username
            .or_else(|| {
                state
                    .users
                    .values()
                    .find(|u| u.email.eq_ignore_ascii_case(handle))
            })
            .cloned())
    }

    async fn create(&self, identity: &Identity) -> Result<(), AuthError> {
        self.check_faults().await?;
        let mut state = self.state.lock().await;
        let taken = state.users.values().any(|u| {
            u.user_id == identity.user_id
                || u.username == identity.username
                || u.email.eq_ignore_ascii_case(&identity.email)
        });
        if taken {
            return Err(AuthError::AlreadyExists("User".to_string()));
        }
        state.users.insert(identity.user_id, identity.clone());
        Ok(())
    }

    async fn update(&self, identity: &Identity) -> Result<(), AuthError> {
        self.check_faults().await?;
        let mut state = self.state.lock().await;
        apply_update(&mut state, identity)
    }
}

#[async_trait]
impl RevokedTokenStore for MemoryStore {
    async fn insert(&self, record: &RevokedToken) -> Result<(), AuthError> {
        self.check_faults().await?;
        let mut state = self.state.lock().await;
        state
            .revoked
            .entry(record.token_id.clone())
            .or_insert_with(|| record.clone());
        Ok(())
    }

    async fn exists_by_id(&self, token_id: &str) -> Result<bool, AuthError> {
        self.check_faults().await?;
        Ok(self.state.lock().await.revoked.contains_key(token_id))
    }
}

#[async_trait]
impl AuthStore for MemoryStore {
    async fn update_with_revocation(
        &self,
        identity: &Identity,
        record: &RevokedToken,
    ) -> Result<(), AuthError> {
        self.check_faults().await?;
        let mut state = self.state.lock().await;

        // Identity first: a version conflict must leave the ledger untouched
        apply_update(&mut state, identity)?;
        state
            .revoked
            .entry(record.token_id.clone())
            .or_insert_with(|| record.clone());
        Ok(())
    }

    async fn ping(&self) -> Result<(), AuthError> {
        self.check_faults().await
    }
}
