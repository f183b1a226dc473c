//! Session storage
//!
//! Maps opaque session IDs to [`SessionRecord`]s. The in-memory store is
//! volatile and cleared on restart, which signs everyone out.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::Result;

/// What the store keeps for one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    /// Codec-encoded user profile, set once authenticated
    pub user: Option<String>,
    /// CSRF state of an OAuth handshake in flight
    pub oauth_state: Option<String>,
    /// When the session stops being valid
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Server-side session persistence
///
/// Implementations must be safe to share across requests; each ID is only
/// touched by the request holding its cookie.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Look up a live session. Expired records are treated as missing.
    async fn load(&self, id: &str) -> Result<Option<SessionRecord>>;

    /// Insert or replace a session
    async fn save(&self, id: &str, record: SessionRecord) -> Result<()>;

    /// Push back the expiry of a live session
    ///
    /// Never creates a record: returns `false` when the ID is unknown or
    /// already expired.
    async fn touch(&self, id: &str, expires_at: DateTime<Utc>) -> Result<bool>;

    /// Remove a session. Unknown IDs are ignored.
    async fn destroy(&self, id: &str) -> Result<()>;

    /// Drop every expired record, returning how many were removed
    async fn prune_expired(&self) -> Result<usize>;
}

/// In-memory session store
#[derive(Default)]
pub struct MemorySessionStore {
    /// Session ID -> record
    sessions: Arc<RwLock<HashMap<String, SessionRecord>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records, expired ones included
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    fn record_size(count: usize) {
        use crate::metrics::SESSIONS_ACTIVE;
        SESSIONS_ACTIVE.set(i64::try_from(count).unwrap_or(i64::MAX));
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, id: &str) -> Result<Option<SessionRecord>> {
        {
            let sessions = self.sessions.read().await;
            match sessions.get(id) {
                Some(record) if !record.is_expired() => return Ok(Some(record.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }

        // Expired: drop it now rather than waiting for the sweeper
        let mut sessions = self.sessions.write().await;
        if sessions.get(id).is_some_and(SessionRecord::is_expired) {
            sessions.remove(id);
            crate::metrics::SESSIONS_EXPIRED_TOTAL.inc();
            Self::record_size(sessions.len());
        }
        Ok(None)
    }

    async fn save(&self, id: &str, record: SessionRecord) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(id.to_string(), record);
        Self::record_size(sessions.len());
        Ok(())
    }

    async fn touch(&self, id: &str, expires_at: DateTime<Utc>) -> Result<bool> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(id) {
            Some(record) if !record.is_expired() => {
                record.expires_at = record.expires_at.max(expires_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn destroy(&self, id: &str) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(id);
        Self::record_size(sessions.len());
        Ok(())
    }

    async fn prune_expired(&self) -> Result<usize> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, record| !record.is_expired());
        let removed = before - sessions.len();

        if removed > 0 {
            crate::metrics::SESSIONS_EXPIRED_TOTAL.inc_by(removed as u64);
            tracing::info!(removed, "Pruned expired sessions");
        }
        Self::record_size(sessions.len());
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(expires_in: Duration) -> SessionRecord {
        SessionRecord {
            user: Some("encoded-user".to_string()),
            oauth_state: None,
            expires_at: Utc::now() + expires_in,
        }
    }

    #[tokio::test]
    async fn test_save_load_destroy() {
        let store = MemorySessionStore::new();
        let live = record(Duration::minutes(5));

        store.save("sid-1", live.clone()).await.unwrap();
        assert_eq!(store.load("sid-1").await.unwrap(), Some(live));

        store.destroy("sid-1").await.unwrap();
        assert_eq!(store.load("sid-1").await.unwrap(), None);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_unknown_id_is_missing() {
        let store = MemorySessionStore::new();
        assert_eq!(store.load("nope").await.unwrap(), None);
        store.destroy("nope").await.unwrap();
    }

    #[tokio::test]
    async fn test_touch_extends_live_sessions_only() {
        let store = MemorySessionStore::new();
        let live = record(Duration::minutes(5));
        store.save("sid-1", live.clone()).await.unwrap();

        let later = Utc::now() + Duration::hours(1);
        assert!(store.touch("sid-1", later).await.unwrap());
        assert_eq!(
            store.load("sid-1").await.unwrap().map(|r| r.expires_at),
            Some(later)
        );

        // Destroyed sessions stay destroyed
        store.destroy("sid-1").await.unwrap();
        assert!(!store.touch("sid-1", later).await.unwrap());
        assert_eq!(store.load("sid-1").await.unwrap(), None);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_touch_does_not_revive_expired_sessions() {
        let store = MemorySessionStore::new();
        store
            .save("stale", record(Duration::seconds(-1)))
            .await
            .unwrap();

        assert!(
            !store
                .touch("stale", Utc::now() + Duration::hours(1))
                .await
                .unwrap()
        );
        assert_eq!(store.load("stale").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_record_is_dropped_on_load() {
        let store = MemorySessionStore::new();
        store
            .save("stale", record(Duration::seconds(-1)))
            .await
            .unwrap();
        assert_eq!(store.len().await, 1);

        assert_eq!(store.load("stale").await.unwrap(), None);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_prune_expired_keeps_live_sessions() {
        let store = MemorySessionStore::new();
        store
            .save("stale-1", record(Duration::seconds(-10)))
            .await
            .unwrap();
        store
            .save("stale-2", record(Duration::seconds(-1)))
            .await
            .unwrap();
        store
            .save("live", record(Duration::minutes(5)))
            .await
            .unwrap();

        assert_eq!(store.prune_expired().await.unwrap(), 2);
        assert_eq!(store.len().await, 1);
        assert!(store.load("live").await.unwrap().is_some());
    }
}
