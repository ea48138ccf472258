//! Access-token verification pipeline.

use super::{AccessClaims, TokenBlacklist, TokenError, TokenIssuer};
use crate::identity::{Identity, IdentityStore};
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// Why a structurally-processed token was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyFailure {
    Revoked,
    Expired,
    Malformed,
    IdentityNotFound,
    IdentityDisabled,
    PasswordChanged,
}

/// Verification error: a definite rejection, or a backend outage during a
/// check. Outages fail closed; callers map `Unavailable` to 503, never to a
/// silent pass.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("token rejected: {0:?}")]
    Rejected(VerifyFailure),
    #[error("verification backend unavailable: {0}")]
    Unavailable(String),
}

/// The verified caller: live identity record plus the claims it presented.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub identity: Identity,
    pub claims: AccessClaims,
}

/// Short-lived in-process cache of verified identities. Bounds the
/// per-request identity-store load; the TTL caps how long a deactivation can
/// go unnoticed, and password changes invalidate the entry explicitly.
pub struct ProfileCache {
    ttl: Duration,
    entries: Mutex<HashMap<Uuid, (Identity, Instant)>>,
}

impl ProfileCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get(&self, id: Uuid) -> Option<Identity> {
        let mut entries = self.entries.lock().await;
        match entries.get(&id) {
            Some((identity, cached_at)) if cached_at.elapsed() < self.ttl => {
                Some(identity.clone())
            }
            Some(_) => {
                entries.remove(&id);
                None
            }
            None => None,
        }
    }

    pub async fn put(&self, identity: Identity) {
        self.entries
            .lock()
            .await
            .insert(identity.id, (identity, Instant::now()));
    }

    pub async fn invalidate(&self, id: Uuid) {
        self.entries.lock().await.remove(&id);
    }
}

/// Full verification pipeline for bearer tokens.
#[derive(Clone)]
pub struct TokenVerifier {
    issuer: Arc<TokenIssuer>,
    identities: Arc<dyn IdentityStore>,
    blacklist: TokenBlacklist,
    cache: Arc<ProfileCache>,
}

impl TokenVerifier {
    #[must_use]
    pub fn new(
        issuer: Arc<TokenIssuer>,
        identities: Arc<dyn IdentityStore>,
        blacklist: TokenBlacklist,
        cache: Arc<ProfileCache>,
    ) -> Self {
        Self {
            issuer,
            identities,
            blacklist,
            cache,
        }
    }

    /// Verify a presented access token.
    ///
    /// Checks run cheapest-first and short-circuit: revocation entry,
    /// signature/expiry, identity existence, active flag, and finally
    /// issued-before-password-change staleness.
    ///
    /// # Errors
    /// `Rejected` with the first failed check; `Unavailable` when the
    /// revocation store or identity store cannot answer.
    pub async fn verify(&self, token: &str) -> Result<AuthContext, VerifyError> {
        let revoked = self
            .blacklist
            .is_revoked(token)
            .await
            .map_err(|err| VerifyError::Unavailable(err.to_string()))?;
        if revoked {
            return Err(VerifyError::Rejected(VerifyFailure::Revoked));
        }

        let claims = self.issuer.decode_access(token).map_err(|err| {
            VerifyError::Rejected(match err {
                TokenError::Expired => VerifyFailure::Expired,
                TokenError::Malformed => VerifyFailure::Malformed,
            })
        })?;

        let identity = match self.cache.get(claims.sub).await {
            Some(identity) => identity,
            None => {
                let identity = self
                    .identities
                    .find_by_id(claims.sub)
                    .await
                    .map_err(|err| VerifyError::Unavailable(err.to_string()))?
                    .ok_or(VerifyError::Rejected(VerifyFailure::IdentityNotFound))?;
                self.cache.put(identity.clone()).await;
                identity
            }
        };

        if !identity.is_active {
            return Err(VerifyError::Rejected(VerifyFailure::IdentityDisabled));
        }

        if let Some(changed_at) = identity.password_changed_at {
            if claims.iat < changed_at.timestamp() {
                debug!(user_id = %identity.id, "Rejecting token issued before password change");
                return Err(VerifyError::Rejected(VerifyFailure::PasswordChanged));
            }
        }

        Ok(AuthContext { identity, claims })
    }

    /// Drop the cached profile so the next verification re-reads the store.
    pub async fn invalidate_profile(&self, id: Uuid) {
        self.cache.invalidate(id).await;
    }
}
