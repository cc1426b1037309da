//! In-memory identity provider for local development and tests.

use crate::identity::{Identity, IdentityError, IdentityProvider, SessionCredentials};
use crate::models::Role;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

/// Identity provider backed by a fixed token-to-identity table.
///
/// Used when the real provider is disabled. Tests seed sessions up front and
/// inspect the recorded role metadata pushes afterwards.
#[derive(Default)]
pub struct StaticIdentityProvider {
    sessions: Mutex<HashMap<String, Identity>>,
    role_updates: Mutex<Vec<(String, Role)>>,
    fail_role_updates: AtomicBool,
    lookup_count: AtomicU64,
}

impl StaticIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session token resolving to the given identity.
    pub fn insert_session(&self, token: impl Into<String>, identity: Identity) {
        self.sessions.lock().unwrap().insert(token.into(), identity);
    }

    /// Invalidate a session token.
    pub fn remove_session(&self, token: &str) {
        self.sessions.lock().unwrap().remove(token);
    }

    /// Recorded role metadata pushes, in call order.
    pub fn role_updates(&self) -> Vec<(String, Role)> {
        self.role_updates.lock().unwrap().clone()
    }

    /// Make subsequent role metadata pushes fail with an upstream error.
    pub fn fail_role_updates(&self, fail: bool) {
        self.fail_role_updates.store(fail, Ordering::SeqCst);
    }

    /// Number of session lookups performed against this provider.
    pub fn lookup_count(&self) -> u64 {
        self.lookup_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn current_identity(
        &self,
        credentials: &SessionCredentials,
    ) -> Result<Option<Identity>, IdentityError> {
        self.lookup_count.fetch_add(1, Ordering::SeqCst);

        let Some(token) = credentials.token() else {
            return Ok(None);
        };

        Ok(self.sessions.lock().unwrap().get(token).cloned())
    }

    async fn update_role_metadata(&self, user_id: &str, role: Role) -> Result<(), IdentityError> {
        if self.fail_role_updates.load(Ordering::SeqCst) {
            return Err(IdentityError::Upstream { status: 503 });
        }

        tracing::info!(
            user_id = %user_id,
            role = %role,
            "[STATIC] Role metadata would be pushed to the identity provider"
        );

        self.role_updates
            .lock()
            .unwrap()
            .push((user_id.to_string(), role));
        Ok(())
    }
}
