// src/session.rs

use async_trait::async_trait;
use moka::future::Cache;
use std::fmt;
use std::time::Duration;

const DEFAULT_LOGIN_TTL: Duration = Duration::from_secs(10 * 60);

/// The correlation values of a login attempt that is waiting for its callback.
#[derive(Clone, PartialEq, Eq)]
pub struct PendingLogin {
    pub state: String,
    pub nonce: String,
}

impl fmt::Debug for PendingLogin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingLogin").finish_non_exhaustive()
    }
}

/// Storage for pending logins, keyed by an opaque browser session id.
///
/// `take` must hand a stored value out at most once: it reads and deletes in
/// one step, so a replayed callback finds nothing.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn put(&self, session_id: &str, pending: PendingLogin);

    async fn take(&self, session_id: &str) -> Option<PendingLogin>;
}

/// An in-process [`SessionStore`]. Entries expire after the login TTL.
#[derive(Clone)]
pub struct InMemorySessionStore {
    pending: Cache<String, PendingLogin>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_LOGIN_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            pending: Cache::builder()
                .max_capacity(100_000)
                .time_to_live(ttl)
                .build(),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn put(&self, session_id: &str, pending: PendingLogin) {
        self.pending.insert(session_id.to_string(), pending).await;
    }

    async fn take(&self, session_id: &str) -> Option<PendingLogin> {
        self.pending.remove(session_id).await
    }
}
