//! Login lockout after repeated failed attempts.
//!
//! Two counters per login: one on the targeted identity, one on the client
//! address, with independent thresholds sharing one window. Both use
//! EXPIRE-on-first-increment, so the window's TTL is the only path out of a
//! lockout; there is no manual unlock. Failures are recorded only after a
//! confirmed password mismatch, never for unknown emails, so attackers
//! cannot lock accounts they merely guess at. The guard fails open on store
//! outages.

use crate::store::{KeyValueStore, StoreError};
use std::{sync::Arc, time::Duration};
use tracing::warn;
use uuid::Uuid;

/// Thresholds before the guard starts rejecting. Defaults: 5 per identity,
/// 10 per origin, 15-minute window.
#[derive(Debug, Clone, Copy)]
pub struct GuardConfig {
    pub identity_threshold: i64,
    pub origin_threshold: i64,
    pub window: Duration,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            identity_threshold: 5,
            origin_threshold: 10,
            window: Duration::from_secs(15 * 60),
        }
    }
}

/// Answer to "may this login attempt proceed?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardStatus {
    Clear,
    Locked { retry_after_seconds: u64 },
}

#[derive(Clone)]
pub struct FailedAttemptGuard {
    store: Arc<dyn KeyValueStore>,
    config: GuardConfig,
}

impl FailedAttemptGuard {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, config: GuardConfig) -> Self {
        Self { store, config }
    }

    fn identity_key(id: Uuid) -> String {
        format!("lockout:user:{id}")
    }

    fn origin_key(origin: &str) -> String {
        format!("lockout:ip:{origin}")
    }

    /// Consulted before credential verification. Infallible by policy: a
    /// store outage logs and reports `Clear`.
    pub async fn check(&self, identity: Option<Uuid>, origin: Option<&str>) -> GuardStatus {
        match self.check_inner(identity, origin).await {
            Ok(status) => status,
            Err(err) => {
                warn!("Lockout store unavailable, allowing login attempt: {err}");
                GuardStatus::Clear
            }
        }
    }

    async fn check_inner(
        &self,
        identity: Option<Uuid>,
        origin: Option<&str>,
    ) -> Result<GuardStatus, StoreError> {
        if let Some(id) = identity {
            if let Some(status) = self
                .check_counter(&Self::identity_key(id), self.config.identity_threshold)
                .await?
            {
                return Ok(status);
            }
        }
        if let Some(origin) = origin {
            if let Some(status) = self
                .check_counter(&Self::origin_key(origin), self.config.origin_threshold)
                .await?
            {
                return Ok(status);
            }
        }
        Ok(GuardStatus::Clear)
    }

    async fn check_counter(
        &self,
        key: &str,
        threshold: i64,
    ) -> Result<Option<GuardStatus>, StoreError> {
        let count = match self.store.get(key).await? {
            Some(value) => value
                .parse::<i64>()
                .map_err(|_| StoreError::Malformed(key.to_string()))?,
            None => return Ok(None),
        };
        if count < threshold {
            return Ok(None);
        }
        let retry_after = match self.store.ttl(key).await? {
            Some(remaining) => remaining,
            None => {
                // The EXPIRE after the opening INCR was lost; without a TTL
                // the lockout never ends, so re-arm the window.
                self.store.expire(key, self.config.window).await?;
                self.config.window
            }
        }
        .as_secs()
        .max(1);
        Ok(Some(GuardStatus::Locked {
            retry_after_seconds: retry_after,
        }))
    }

    /// Count a confirmed password mismatch against both counters. Infallible
    /// by policy.
    pub async fn record_failure(&self, identity: Option<Uuid>, origin: Option<&str>) {
        if let Err(err) = self.record_inner(identity, origin).await {
            warn!("Lockout store unavailable, failed attempt not recorded: {err}");
        }
    }

    async fn record_inner(
        &self,
        identity: Option<Uuid>,
        origin: Option<&str>,
    ) -> Result<(), StoreError> {
        if let Some(id) = identity {
            self.bump(&Self::identity_key(id)).await?;
        }
        if let Some(origin) = origin {
            self.bump(&Self::origin_key(origin)).await?;
        }
        Ok(())
    }

    async fn bump(&self, key: &str) -> Result<(), StoreError> {
        let count = self.store.incr(key).await?;
        if count == 1 {
            self.store.expire(key, self.config.window).await?;
        }
        Ok(())
    }

    /// Clear both counters after a successful authentication.
    pub async fn reset(&self, identity: Option<Uuid>, origin: Option<&str>) {
        if let Some(id) = identity {
            if let Err(err) = self.store.del(&Self::identity_key(id)).await {
                warn!("Lockout store unavailable, counter not reset: {err}");
            }
        }
        if let Some(origin) = origin {
            if let Err(err) = self.store.del(&Self::origin_key(origin)).await {
                warn!("Lockout store unavailable, counter not reset: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, NullStore};

    fn guard() -> FailedAttemptGuard {
        FailedAttemptGuard::new(Arc::new(MemoryStore::new()), GuardConfig::default())
    }

    #[tokio::test]
    async fn five_failures_lock_the_identity() {
        let guard = guard();
        let alice = Uuid::new_v4();

        for _ in 0..4 {
            guard.record_failure(Some(alice), Some("10.0.0.1")).await;
            assert_eq!(
                guard.check(Some(alice), Some("10.0.0.1")).await,
                GuardStatus::Clear
            );
        }
        guard.record_failure(Some(alice), Some("10.0.0.1")).await;

        assert!(matches!(
            guard.check(Some(alice), Some("10.0.0.1")).await,
            GuardStatus::Locked { .. }
        ));
    }

    #[tokio::test]
    async fn origin_counter_governs_other_identities_at_ten() {
        let guard = guard();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        for _ in 0..5 {
            guard.record_failure(Some(alice), Some("10.0.0.1")).await;
        }
        // Alice is locked, but the origin is at 5 of 10: Bob still clears.
        assert!(matches!(
            guard.check(Some(alice), Some("10.0.0.1")).await,
            GuardStatus::Locked { .. }
        ));
        assert_eq!(
            guard.check(Some(bob), Some("10.0.0.1")).await,
            GuardStatus::Clear
        );

        for _ in 0..5 {
            guard.record_failure(Some(bob), Some("10.0.0.1")).await;
        }
        // Origin now at 10: everyone behind it is locked, even fresh names.
        assert!(matches!(
            guard.check(None, Some("10.0.0.1")).await,
            GuardStatus::Locked { .. }
        ));
    }

    #[tokio::test]
    async fn reset_clears_both_counters() {
        let guard = guard();
        let alice = Uuid::new_v4();

        for _ in 0..5 {
            guard.record_failure(Some(alice), Some("10.0.0.1")).await;
        }
        guard.reset(Some(alice), Some("10.0.0.1")).await;
        assert_eq!(
            guard.check(Some(alice), Some("10.0.0.1")).await,
            GuardStatus::Clear
        );
    }

    #[tokio::test]
    async fn lockout_expires_with_the_window() {
        let guard = FailedAttemptGuard::new(
            Arc::new(MemoryStore::new()),
            GuardConfig {
                identity_threshold: 2,
                origin_threshold: 10,
                window: Duration::from_millis(50),
            },
        );
        let alice = Uuid::new_v4();

        guard.record_failure(Some(alice), None).await;
        guard.record_failure(Some(alice), None).await;
        assert!(matches!(
            guard.check(Some(alice), None).await,
            GuardStatus::Locked { .. }
        ));

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(guard.check(Some(alice), None).await, GuardStatus::Clear);
    }

    #[tokio::test]
    async fn lockout_counter_without_ttl_gets_the_window_rearmed(
    ) -> Result<(), StoreError> {
        let store = Arc::new(MemoryStore::new());
        let guard = FailedAttemptGuard::new(store.clone(), GuardConfig::default());
        let alice = Uuid::new_v4();
        let key = format!("lockout:user:{alice}");

        // Counter over the threshold with no expiry, as if the EXPIRE after
        // the opening INCR never landed.
        for _ in 0..5 {
            store.incr(&key).await?;
        }
        assert_eq!(store.ttl(&key).await?, None);

        assert!(matches!(
            guard.check(Some(alice), None).await,
            GuardStatus::Locked {
                retry_after_seconds: 900
            }
        ));
        // The window is armed again; the lockout is no longer permanent.
        assert!(store.ttl(&key).await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn store_outage_fails_open() {
        let guard = FailedAttemptGuard::new(Arc::new(NullStore), GuardConfig::default());
        let alice = Uuid::new_v4();

        for _ in 0..20 {
            guard.record_failure(Some(alice), Some("10.0.0.1")).await;
        }
        assert_eq!(
            guard.check(Some(alice), Some("10.0.0.1")).await,
            GuardStatus::Clear
        );
    }
}
