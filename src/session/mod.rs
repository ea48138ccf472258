//! Session registry and refresh-token persistence.
//!
//! One session entry per issued access token, keyed by the token's hash and
//! expiring with it. A per-user index set makes "list my sessions" and
//! "revoke everything" O(own sessions) instead of a store-wide scan. The
//! refresh token is a singleton per user: storing a new one silently
//! replaces the old, which is how rotation invalidates the previous token.

use crate::store::{KeyValueStore, StoreError};
use crate::token::hash_token;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use uuid::Uuid;

/// What we remember about one live session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub user_id: Uuid,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// A session record plus its id (the token hash) as surfaced to the owner.
#[derive(Debug, Clone)]
pub struct SessionEntry {
    pub id: String,
    pub record: SessionRecord,
}

#[derive(Clone)]
pub struct SessionRegistry {
    store: Arc<dyn KeyValueStore>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn session_key(id: &str) -> String {
        format!("session:{id}")
    }

    fn index_key(user_id: Uuid) -> String {
        format!("sessions:{user_id}")
    }

    fn refresh_key(user_id: Uuid) -> String {
        format!("refresh:{user_id}")
    }

    /// Record a session for a freshly issued access token. The entry's TTL
    /// mirrors the token's expiry, so abandoned sessions disappear on their
    /// own.
    ///
    /// # Errors
    /// Propagates store failures; session writes fail closed.
    pub async fn register(&self, token: &str, record: &SessionRecord) -> Result<String, StoreError> {
        let id = hash_token(token);
        let ttl = record
            .expires_at
            .signed_duration_since(Utc::now())
            .to_std()
            .unwrap_or(Duration::from_secs(1));
        let payload = serde_json::to_string(record)
            .map_err(|err| StoreError::Malformed(err.to_string()))?;

        self.store
            .set_ex(&Self::session_key(&id), &payload, ttl)
            .await?;
        self.store
            .sadd(&Self::index_key(record.user_id), &id)
            .await?;
        Ok(id)
    }

    /// List a user's live sessions, pruning index members whose record has
    /// already expired.
    ///
    /// # Errors
    /// Propagates store failures.
    pub async fn list(&self, user_id: Uuid) -> Result<Vec<SessionEntry>, StoreError> {
        let index = Self::index_key(user_id);
        let mut entries = Vec::new();
        for id in self.store.smembers(&index).await? {
            match self.store.get(&Self::session_key(&id)).await? {
                Some(payload) => {
                    let record: SessionRecord = serde_json::from_str(&payload)
                        .map_err(|_| StoreError::Malformed(Self::session_key(&id)))?;
                    entries.push(SessionEntry { id, record });
                }
                None => {
                    // Record expired; drop the dangling index member.
                    self.store.srem(&index, &id).await?;
                }
            }
        }
        entries.sort_by(|a, b| b.record.created_at.cmp(&a.record.created_at));
        Ok(entries)
    }

    /// Revoke one session by id. Returns `false` when no such session
    /// belongs to the user.
    ///
    /// # Errors
    /// Propagates store failures.
    pub async fn revoke(&self, user_id: Uuid, session_id: &str) -> Result<bool, StoreError> {
        let index = Self::index_key(user_id);
        let owned = self.store.smembers(&index).await?.contains(&session_id.to_string());
        if !owned {
            return Ok(false);
        }
        self.store.del(&Self::session_key(session_id)).await?;
        self.store.srem(&index, session_id).await?;
        Ok(true)
    }

    /// Revoke every session and the stored refresh token. Used by logout,
    /// password change, and admin-forced revocation.
    ///
    /// # Errors
    /// Propagates store failures.
    pub async fn revoke_all(&self, user_id: Uuid) -> Result<usize, StoreError> {
        let index = Self::index_key(user_id);
        let ids = self.store.smembers(&index).await?;
        for id in &ids {
            self.store.del(&Self::session_key(id)).await?;
        }
        self.store.del(&index).await?;
        self.store.del(&Self::refresh_key(user_id)).await?;
        Ok(ids.len())
    }

    /// Persist the hash of a user's refresh token, replacing any previous
    /// one. At most one refresh token per user is ever valid.
    ///
    /// # Errors
    /// Propagates store failures.
    pub async fn store_refresh_token(
        &self,
        user_id: Uuid,
        token: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.store
            .set_ex(&Self::refresh_key(user_id), &hash_token(token), ttl)
            .await
    }

    /// Compare a presented refresh token against the stored hash.
    ///
    /// # Errors
    /// Propagates store failures; refresh fails closed.
    pub async fn verify_refresh_token(
        &self,
        user_id: Uuid,
        token: &str,
    ) -> Result<bool, StoreError> {
        match self.store.get(&Self::refresh_key(user_id)).await? {
            Some(stored) => Ok(stored == hash_token(token)),
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn registry() -> SessionRegistry {
        SessionRegistry::new(Arc::new(MemoryStore::new()))
    }

    fn record(user_id: Uuid, ttl_secs: i64) -> SessionRecord {
        SessionRecord {
            user_id,
            ip: Some("10.0.0.1".to_string()),
            user_agent: Some("test-agent".to_string()),
            created_at: Utc::now(),
            expires_at: Utc::now() + chrono::Duration::seconds(ttl_secs),
        }
    }

    #[tokio::test]
    async fn register_then_list() -> Result<(), StoreError> {
        let registry = registry();
        let user_id = Uuid::new_v4();

        let id_a = registry.register("token-a", &record(user_id, 60)).await?;
        let id_b = registry.register("token-b", &record(user_id, 60)).await?;
        assert_ne!(id_a, id_b);

        let sessions = registry.list(user_id).await?;
        assert_eq!(sessions.len(), 2);
        assert!(sessions.iter().all(|s| s.record.user_id == user_id));
        Ok(())
    }

    #[tokio::test]
    async fn expired_sessions_are_pruned_from_listing() -> Result<(), StoreError> {
        let registry = registry();
        let user_id = Uuid::new_v4();

        registry.register("short", &record(user_id, 1)).await?;
        registry.register("long", &record(user_id, 60)).await?;

        tokio::time::sleep(Duration::from_millis(1100)).await;
        let sessions = registry.list(user_id).await?;
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, hash_token("long"));
        Ok(())
    }

    #[tokio::test]
    async fn revoke_single_session() -> Result<(), StoreError> {
        let registry = registry();
        let user_id = Uuid::new_v4();
        let id = registry.register("token-a", &record(user_id, 60)).await?;
        registry.register("token-b", &record(user_id, 60)).await?;

        assert!(registry.revoke(user_id, &id).await?);
        assert_eq!(registry.list(user_id).await?.len(), 1);

        // Second revoke of the same id is a miss.
        assert!(!registry.revoke(user_id, &id).await?);
        Ok(())
    }

    #[tokio::test]
    async fn revoke_rejects_foreign_sessions() -> Result<(), StoreError> {
        let registry = registry();
        let alice = Uuid::new_v4();
        let mallory = Uuid::new_v4();
        let id = registry.register("token-a", &record(alice, 60)).await?;

        assert!(!registry.revoke(mallory, &id).await?);
        assert_eq!(registry.list(alice).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn revoke_all_clears_sessions_and_refresh_token() -> Result<(), StoreError> {
        let registry = registry();
        let user_id = Uuid::new_v4();
        registry.register("token-a", &record(user_id, 60)).await?;
        registry.register("token-b", &record(user_id, 60)).await?;
        registry
            .store_refresh_token(user_id, "refresh", Duration::from_secs(60))
            .await?;

        assert_eq!(registry.revoke_all(user_id).await?, 2);
        assert!(registry.list(user_id).await?.is_empty());
        assert!(!registry.verify_refresh_token(user_id, "refresh").await?);
        Ok(())
    }

    #[tokio::test]
    async fn refresh_token_is_a_singleton() -> Result<(), StoreError> {
        let registry = registry();
        let user_id = Uuid::new_v4();

        registry
            .store_refresh_token(user_id, "first", Duration::from_secs(60))
            .await?;
        assert!(registry.verify_refresh_token(user_id, "first").await?);

        registry
            .store_refresh_token(user_id, "second", Duration::from_secs(60))
            .await?;
        assert!(!registry.verify_refresh_token(user_id, "first").await?);
        assert!(registry.verify_refresh_token(user_id, "second").await?);
        Ok(())
    }
}
