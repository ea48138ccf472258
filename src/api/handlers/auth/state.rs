//! Auth configuration and shared request state.

use crate::guard::{FailedAttemptGuard, GuardConfig};
use crate::identity::IdentityStore;
use crate::limiter::{LimiterConfig, SlidingWindowLimiter};
use crate::session::SessionRegistry;
use crate::store::KeyValueStore;
use crate::token::{ProfileCache, TokenBlacklist, TokenIssuer, TokenVerifier};
use secrecy::SecretString;
use std::{sync::Arc, time::Duration};

const DEFAULT_ACCESS_TTL_SECONDS: u64 = 24 * 60 * 60;
const DEFAULT_REMEMBER_ACCESS_TTL_SECONDS: u64 = 7 * 24 * 60 * 60;
const DEFAULT_REFRESH_TTL_SECONDS: u64 = 7 * 24 * 60 * 60;
const DEFAULT_REMEMBER_REFRESH_TTL_SECONDS: u64 = 30 * 24 * 60 * 60;
const DEFAULT_PROFILE_CACHE_TTL_SECONDS: u64 = 60;
const DEFAULT_TOKEN_ISSUER: &str = "gatekeeper";
const DEFAULT_TOKEN_AUDIENCE: &str = "platform";

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    access_secret: SecretString,
    refresh_secret: SecretString,
    token_issuer: String,
    token_audience: String,
    access_ttl_seconds: u64,
    remember_access_ttl_seconds: u64,
    refresh_ttl_seconds: u64,
    remember_refresh_ttl_seconds: u64,
    profile_cache_ttl_seconds: u64,
    limiter: LimiterConfig,
    guard: GuardConfig,
}

impl AuthConfig {
    #[must_use]
    pub fn new(
        frontend_base_url: String,
        access_secret: SecretString,
        refresh_secret: SecretString,
    ) -> Self {
        Self {
            frontend_base_url,
            access_secret,
            refresh_secret,
            token_issuer: DEFAULT_TOKEN_ISSUER.to_string(),
            token_audience: DEFAULT_TOKEN_AUDIENCE.to_string(),
            access_ttl_seconds: DEFAULT_ACCESS_TTL_SECONDS,
            remember_access_ttl_seconds: DEFAULT_REMEMBER_ACCESS_TTL_SECONDS,
            refresh_ttl_seconds: DEFAULT_REFRESH_TTL_SECONDS,
            remember_refresh_ttl_seconds: DEFAULT_REMEMBER_REFRESH_TTL_SECONDS,
            profile_cache_ttl_seconds: DEFAULT_PROFILE_CACHE_TTL_SECONDS,
            limiter: LimiterConfig::default(),
            guard: GuardConfig::default(),
        }
    }

    #[must_use]
    pub fn with_token_issuer(mut self, issuer: String) -> Self {
        self.token_issuer = issuer;
        self
    }

    #[must_use]
    pub fn with_token_audience(mut self, audience: String) -> Self {
        self.token_audience = audience;
        self
    }

    #[must_use]
    pub const fn with_access_ttl_seconds(mut self, seconds: u64) -> Self {
        self.access_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub const fn with_remember_access_ttl_seconds(mut self, seconds: u64) -> Self {
        self.remember_access_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub const fn with_refresh_ttl_seconds(mut self, seconds: u64) -> Self {
        self.refresh_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub const fn with_remember_refresh_ttl_seconds(mut self, seconds: u64) -> Self {
        self.remember_refresh_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub const fn with_profile_cache_ttl_seconds(mut self, seconds: u64) -> Self {
        self.profile_cache_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub const fn with_limiter(mut self, limiter: LimiterConfig) -> Self {
        self.limiter = limiter;
        self
    }

    #[must_use]
    pub const fn with_guard(mut self, guard: GuardConfig) -> Self {
        self.guard = guard;
        self
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub const fn refresh_ttl_seconds(&self) -> u64 {
        self.refresh_ttl_seconds
    }

    #[must_use]
    pub const fn remember_refresh_ttl_seconds(&self) -> u64 {
        self.remember_refresh_ttl_seconds
    }

    #[must_use]
    pub const fn limiter(&self) -> &LimiterConfig {
        &self.limiter
    }
}

/// Everything a request handler needs, shared behind one `Arc` extension.
pub struct AuthState {
    config: AuthConfig,
    issuer: Arc<TokenIssuer>,
    verifier: TokenVerifier,
    blacklist: TokenBlacklist,
    sessions: SessionRegistry,
    guard: FailedAttemptGuard,
    limiter: SlidingWindowLimiter,
    identities: Arc<dyn IdentityStore>,
    store: Arc<dyn KeyValueStore>,
}

impl AuthState {
    #[must_use]
    pub fn new(
        config: AuthConfig,
        identities: Arc<dyn IdentityStore>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        let issuer = Arc::new(TokenIssuer::new(
            &config.access_secret,
            &config.refresh_secret,
            config.token_issuer.clone(),
            config.token_audience.clone(),
            Duration::from_secs(config.access_ttl_seconds),
            Duration::from_secs(config.remember_access_ttl_seconds),
            Duration::from_secs(config.refresh_ttl_seconds),
            Duration::from_secs(config.remember_refresh_ttl_seconds),
        ));
        let blacklist = TokenBlacklist::new(store.clone());
        let verifier = TokenVerifier::new(
            issuer.clone(),
            identities.clone(),
            blacklist.clone(),
            Arc::new(ProfileCache::new(Duration::from_secs(
                config.profile_cache_ttl_seconds,
            ))),
        );
        let sessions = SessionRegistry::new(store.clone());
        let guard = FailedAttemptGuard::new(store.clone(), config.guard);
        let limiter = SlidingWindowLimiter::new(store.clone(), config.limiter);

        Self {
            config,
            issuer,
            verifier,
            blacklist,
            sessions,
            guard,
            limiter,
            identities,
            store,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    #[must_use]
    pub fn verifier(&self) -> &TokenVerifier {
        &self.verifier
    }

    #[must_use]
    pub fn blacklist(&self) -> &TokenBlacklist {
        &self.blacklist
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    #[must_use]
    pub fn guard(&self) -> &FailedAttemptGuard {
        &self.guard
    }

    #[must_use]
    pub fn limiter(&self) -> &SlidingWindowLimiter {
        &self.limiter
    }

    #[must_use]
    pub fn identities(&self) -> &dyn IdentityStore {
        self.identities.as_ref()
    }

    #[must_use]
    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }
}
