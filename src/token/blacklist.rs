//! Early revocation of otherwise-stateless access tokens.

use super::hash_token;
use crate::store::{KeyValueStore, StoreError};
use std::{sync::Arc, time::Duration};

/// Revocation list keyed by token hash.
///
/// Entries carry the token's remaining lifetime as their TTL, so a
/// revocation never outlives the token it suppresses and the list stays
/// bounded by the volume of explicit logouts.
#[derive(Clone)]
pub struct TokenBlacklist {
    store: Arc<dyn KeyValueStore>,
}

impl TokenBlacklist {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn key(token: &str) -> String {
        format!("blacklist:{}", hash_token(token))
    }

    /// Revoke a token for the rest of its lifetime. A token that has already
    /// expired needs no entry and is skipped.
    ///
    /// # Errors
    /// Propagates store failures; revocation is a security-relevant write and
    /// must not silently no-op.
    pub async fn revoke(&self, token: &str, remaining: Option<Duration>) -> Result<(), StoreError> {
        let Some(remaining) = remaining else {
            return Ok(());
        };
        if remaining.is_zero() {
            return Ok(());
        }
        self.store.set_ex(&Self::key(token), "1", remaining).await
    }

    /// # Errors
    /// Propagates store failures so verification can fail closed.
    pub async fn is_revoked(&self, token: &str) -> Result<bool, StoreError> {
        Ok(self.store.get(&Self::key(token)).await?.is_some())
    }
}
