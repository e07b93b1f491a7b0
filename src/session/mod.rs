//! Opaque bearer-token sessions.
//!
//! The store is the one piece of state shared across concurrent requests.
//! It is constructed once at startup and injected into the dispatcher and
//! the login handler; it is never a process-wide singleton.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::atom::AtomError;
use crate::entities::user;

/// Short-lived authenticated context bound to one username.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user_name: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_admin: bool,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Process-wide table of active sessions, keyed by token.
pub struct SessionStore {
    ttl: Duration,
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Validate credentials and issue a session.
    ///
    /// Returns `None` for an unknown user and for a wrong password alike;
    /// callers cannot tell whether the username existed.
    pub async fn create(
        &self,
        pool: &PgPool,
        user_name: &str,
        password: &str,
    ) -> Result<Option<Session>, AtomError> {
        match user::verify_credentials(pool, user_name, password).await? {
            Some(is_admin) => Ok(Some(self.issue(user_name, is_admin).await)),
            None => Ok(None),
        }
    }

    /// Insert a session for an already-verified identity.
    pub async fn issue(&self, user_name: &str, is_admin: bool) -> Session {
        let now = Utc::now();
        let session = Session {
            token: Uuid::new_v4().simple().to_string(),
            user_name: user_name.to_string(),
            issued_at: now,
            expires_at: now + self.ttl,
            is_admin,
        };

        let mut sessions = self.sessions.write().await;
        sessions.insert(session.token.clone(), session.clone());
        session
    }

    /// `None` for unknown, malformed or expired tokens. Expired entries are
    /// purged lazily on lookup.
    pub async fn resolve(&self, token: &str) -> Option<Session> {
        let now = Utc::now();
        {
            let sessions = self.sessions.read().await;
            match sessions.get(token) {
                Some(session) if !session.is_expired(now) => return Some(session.clone()),
                Some(_) => {} // expired, fall through to purge
                None => return None,
            }
        }

        self.sessions.write().await.remove(token);
        None
    }

    /// Remove an entry; absence is not an error.
    pub async fn revoke(&self, token: &str) {
        self.sessions.write().await.remove(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn issues_distinct_tokens() {
        let store = SessionStore::new(Duration::hours(1));
        let a = store.issue("alice", false).await;
        let b = store.issue("alice", false).await;
        assert_ne!(a.token, b.token);

        // Both remain resolvable
        assert!(store.resolve(&a.token).await.is_some());
        assert!(store.resolve(&b.token).await.is_some());
    }

    #[tokio::test]
    async fn resolve_unknown_token_is_none() {
        let store = SessionStore::new(Duration::hours(1));
        assert!(store.resolve("no-such-token").await.is_none());
        assert!(store.resolve("").await.is_none());
    }

    #[tokio::test]
    async fn expired_sessions_are_purged_on_lookup() {
        let store = SessionStore::new(Duration::seconds(-1));
        let session = store.issue("alice", false).await;
        assert!(store.resolve(&session.token).await.is_none());
        // Purged, not merely hidden
        assert!(store.sessions.read().await.is_empty());
    }

    #[tokio::test]
    async fn revoke_is_idempotent() {
        let store = SessionStore::new(Duration::hours(1));
        let session = store.issue("alice", true).await;
        store.revoke(&session.token).await;
        store.revoke(&session.token).await;
        assert!(store.resolve(&session.token).await.is_none());
    }

    #[tokio::test]
    async fn session_carries_identity_and_role() {
        let store = SessionStore::new(Duration::hours(1));
        let session = store.issue("root", true).await;
        let resolved = store.resolve(&session.token).await.unwrap();
        assert_eq!(resolved.user_name, "root");
        assert!(resolved.is_admin);
        assert!(resolved.expires_at > resolved.issued_at);
    }
}
