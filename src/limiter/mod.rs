//! Counter-per-window rate limiting.
//!
//! One counter per `(route class, subject)` pair; the window TTL is attached
//! on the first increment, so windows roll from first use rather than
//! aligning to the clock. Rejected requests still consume budget. The
//! limiter fails open: a store outage admits traffic and logs, it never
//! turns into a denial of service by the cache.

use crate::store::{KeyValueStore, StoreError};
use std::{sync::Arc, time::Duration};
use tracing::warn;

/// Route family a request is billed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteClass {
    General,
    Auth,
    Upload,
    Analysis,
}

impl RouteClass {
    /// Classify a request path. Unknown paths fall into the general tier.
    #[must_use]
    pub fn classify(path: &str) -> Self {
        if path.starts_with("/v1/auth/") {
            Self::Auth
        } else if path.starts_with("/v1/uploads") {
            Self::Upload
        } else if path.starts_with("/v1/analysis") {
            Self::Analysis
        } else {
            Self::General
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Auth => "auth",
            Self::Upload => "upload",
            Self::Analysis => "analysis",
        }
    }

    /// Machine-readable code attached to this tier's 429 responses.
    #[must_use]
    pub const fn limit_code(self) -> &'static str {
        match self {
            Self::General => "RATE_LIMITED",
            Self::Auth => "AUTH_RATE_LIMITED",
            Self::Upload => "UPLOAD_RATE_LIMITED",
            Self::Analysis => "ANALYSIS_RATE_LIMITED",
        }
    }
}

/// Budget for one route class.
#[derive(Debug, Clone, Copy)]
pub struct TierPolicy {
    pub max: i64,
    pub window: Duration,
}

/// Per-class budgets. Defaults match the platform gateway; every tier is
/// CLI-tunable.
#[derive(Debug, Clone, Copy)]
pub struct LimiterConfig {
    pub general: TierPolicy,
    pub auth: TierPolicy,
    pub upload: TierPolicy,
    pub analysis: TierPolicy,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            general: TierPolicy {
                max: 1000,
                window: Duration::from_secs(15 * 60),
            },
            auth: TierPolicy {
                max: 20,
                window: Duration::from_secs(15 * 60),
            },
            upload: TierPolicy {
                max: 50,
                window: Duration::from_secs(60),
            },
            analysis: TierPolicy {
                max: 20,
                window: Duration::from_secs(5 * 60),
            },
        }
    }
}

impl LimiterConfig {
    #[must_use]
    pub const fn policy(&self, class: RouteClass) -> TierPolicy {
        match class {
            RouteClass::General => self.general,
            RouteClass::Auth => self.auth,
            RouteClass::Upload => self.upload,
            RouteClass::Analysis => self.analysis,
        }
    }

    #[must_use]
    pub const fn with_general(mut self, policy: TierPolicy) -> Self {
        self.general = policy;
        self
    }

    #[must_use]
    pub const fn with_auth(mut self, policy: TierPolicy) -> Self {
        self.auth = policy;
        self
    }

    #[must_use]
    pub const fn with_upload(mut self, policy: TierPolicy) -> Self {
        self.upload = policy;
        self
    }

    #[must_use]
    pub const fn with_analysis(mut self, policy: TierPolicy) -> Self {
        self.analysis = policy;
        self
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: i64,
    pub remaining: i64,
    pub retry_after_seconds: u64,
}

/// Counter-backed limiter shared by all request handlers.
#[derive(Clone)]
pub struct SlidingWindowLimiter {
    store: Arc<dyn KeyValueStore>,
    config: LimiterConfig,
}

impl SlidingWindowLimiter {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, config: LimiterConfig) -> Self {
        Self { store, config }
    }

    /// Admit or reject one request from `subject` against `class`.
    ///
    /// Infallible by policy: any store error is logged and the request is
    /// admitted with a full remaining budget.
    pub async fn admit(&self, subject: &str, class: RouteClass) -> RateDecision {
        let policy = self.config.policy(class);
        match self.count(subject, class, policy).await {
            Ok(decision) => decision,
            Err(err) => {
                warn!(
                    subject,
                    class = class.as_str(),
                    "Rate limit store unavailable, admitting request: {err}"
                );
                RateDecision {
                    allowed: true,
                    limit: policy.max,
                    remaining: policy.max,
                    retry_after_seconds: 0,
                }
            }
        }
    }

    async fn count(
        &self,
        subject: &str,
        class: RouteClass,
        policy: TierPolicy,
    ) -> Result<RateDecision, StoreError> {
        let key = format!("rl:{}:{subject}", class.as_str());
        let count = self.store.incr(&key).await?;
        if count == 1 {
            // First hit opens the window; all later hits inherit its TTL.
            self.store.expire(&key, policy.window).await?;
        }

        if count > policy.max {
            let retry_after = match self.store.ttl(&key).await? {
                Some(remaining) => remaining,
                None => {
                    // The EXPIRE after the opening INCR was lost; without a
                    // TTL the counter never resets, so re-arm the window.
                    self.store.expire(&key, policy.window).await?;
                    policy.window
                }
            }
            .as_secs()
            .max(1);
            return Ok(RateDecision {
                allowed: false,
                limit: policy.max,
                remaining: 0,
                retry_after_seconds: retry_after,
            });
        }

        Ok(RateDecision {
            allowed: true,
            limit: policy.max,
            remaining: policy.max - count,
            retry_after_seconds: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, NullStore};

    fn tiny_config() -> LimiterConfig {
        LimiterConfig::default().with_auth(TierPolicy {
            max: 2,
            window: Duration::from_secs(2),
        })
    }

    #[test]
    fn paths_map_to_classes() {
        assert_eq!(RouteClass::classify("/v1/auth/login"), RouteClass::Auth);
        assert_eq!(RouteClass::classify("/v1/uploads"), RouteClass::Upload);
        assert_eq!(
            RouteClass::classify("/v1/analysis/runs"),
            RouteClass::Analysis
        );
        assert_eq!(RouteClass::classify("/v1/me"), RouteClass::General);
        assert_eq!(RouteClass::classify("/health"), RouteClass::General);
    }

    #[tokio::test]
    async fn budget_exhausts_then_rejects() {
        let limiter = SlidingWindowLimiter::new(Arc::new(MemoryStore::new()), tiny_config());

        let first = limiter.admit("user:alice", RouteClass::Auth).await;
        assert!(first.allowed);
        assert_eq!(first.remaining, 1);

        let second = limiter.admit("user:alice", RouteClass::Auth).await;
        assert!(second.allowed);
        assert_eq!(second.remaining, 0);

        let third = limiter.admit("user:alice", RouteClass::Auth).await;
        assert!(!third.allowed);
        assert!(third.retry_after_seconds >= 1);
    }

    #[tokio::test]
    async fn subjects_are_independent() {
        let limiter = SlidingWindowLimiter::new(Arc::new(MemoryStore::new()), tiny_config());

        limiter.admit("user:alice", RouteClass::Auth).await;
        limiter.admit("user:alice", RouteClass::Auth).await;
        assert!(!limiter.admit("user:alice", RouteClass::Auth).await.allowed);

        assert!(limiter.admit("user:bob", RouteClass::Auth).await.allowed);
        assert!(limiter.admit("ip:10.0.0.1", RouteClass::Auth).await.allowed);
    }

    #[tokio::test]
    async fn classes_are_billed_separately() {
        let limiter = SlidingWindowLimiter::new(Arc::new(MemoryStore::new()), tiny_config());

        limiter.admit("user:alice", RouteClass::Auth).await;
        limiter.admit("user:alice", RouteClass::Auth).await;
        assert!(!limiter.admit("user:alice", RouteClass::Auth).await.allowed);

        // Same subject, different tier, fresh budget.
        assert!(
            limiter
                .admit("user:alice", RouteClass::General)
                .await
                .allowed
        );
    }

    #[tokio::test]
    async fn rejected_requests_keep_consuming_budget() {
        let limiter = SlidingWindowLimiter::new(Arc::new(MemoryStore::new()), tiny_config());

        for _ in 0..5 {
            limiter.admit("user:alice", RouteClass::Auth).await;
        }
        // Still rejected; over-limit traffic never re-opens the window early.
        assert!(!limiter.admit("user:alice", RouteClass::Auth).await.allowed);
    }

    #[tokio::test]
    async fn window_expiry_resets_the_counter() {
        let limiter = SlidingWindowLimiter::new(
            Arc::new(MemoryStore::new()),
            LimiterConfig::default().with_auth(TierPolicy {
                max: 2,
                window: Duration::from_millis(50),
            }),
        );

        limiter.admit("user:alice", RouteClass::Auth).await;
        limiter.admit("user:alice", RouteClass::Auth).await;
        assert!(!limiter.admit("user:alice", RouteClass::Auth).await.allowed);

        tokio::time::sleep(Duration::from_millis(80)).await;
        let decision = limiter.admit("user:alice", RouteClass::Auth).await;
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 1);
    }

    #[tokio::test]
    async fn over_limit_counter_without_ttl_gets_the_window_rearmed(
    ) -> Result<(), StoreError> {
        let store = Arc::new(MemoryStore::new());
        let limiter = SlidingWindowLimiter::new(store.clone(), tiny_config());

        // Counter over the limit with no expiry, as if the EXPIRE after the
        // opening INCR never landed.
        for _ in 0..3 {
            store.incr("rl:auth:user:alice").await?;
        }
        assert_eq!(store.ttl("rl:auth:user:alice").await?, None);

        let decision = limiter.admit("user:alice", RouteClass::Auth).await;
        assert!(!decision.allowed);
        assert_eq!(decision.retry_after_seconds, 2);
        // The window is armed again; the rejection is no longer permanent.
        assert!(store.ttl("rl:auth:user:alice").await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn store_outage_fails_open() {
        // NullStore always answers 1, so every request looks like the first.
        let limiter = SlidingWindowLimiter::new(Arc::new(NullStore), tiny_config());
        for _ in 0..10 {
            assert!(limiter.admit("user:alice", RouteClass::Auth).await.allowed);
        }
    }
}
