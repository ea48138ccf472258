//! Counter/key-value store boundary.
//!
//! Counters, sessions, revocation entries, and refresh-token hashes all live
//! behind [`KeyValueStore`]. Production uses Redis; when no Redis URL is
//! configured the service runs on a process-local [`MemoryStore`], and when
//! Redis is configured but unreachable at startup it degrades to the no-op
//! [`NullStore`] rather than refusing to boot. Atomic `INCR` is the only
//! concurrency primitive this subsystem relies on.

use async_trait::async_trait;
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};

mod memory;
mod null;
mod redis_store;

pub use memory::MemoryStore;
pub use null::NullStore;
pub use redis_store::RedisStore;

/// Bounded timeout applied to every store round-trip.
pub const STORE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("malformed store value for key {0}")]
    Malformed(String),
}

/// Minimal contract the token/limiter/session components need from the
/// shared store. Mirrors the Redis commands they map to.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Set `key` to `value` with an absolute TTL.
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Atomically increment `key`, returning the post-increment value.
    /// The store serializes concurrent increments on the same key.
    async fn incr(&self, key: &str) -> Result<i64, StoreError>;

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Remaining TTL, `None` when the key is missing or has no expiry.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError>;

    async fn del(&self, key: &str) -> Result<(), StoreError>;

    async fn sadd(&self, key: &str, member: &str) -> Result<(), StoreError>;

    async fn srem(&self, key: &str, member: &str) -> Result<(), StoreError>;

    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// Select a store implementation at startup.
///
/// A configured-but-unreachable Redis logs a warning and falls back to the
/// no-op store: rate limiting fails open and sessions degrade, but the
/// service keeps serving traffic.
pub async fn connect(redis_url: Option<&str>) -> Arc<dyn KeyValueStore> {
    match redis_url {
        Some(url) => match RedisStore::connect(url, STORE_TIMEOUT).await {
            Ok(store) => {
                info!("Connected to counter store");
                Arc::new(store)
            }
            Err(err) => {
                warn!("Counter store unreachable, continuing without one: {err}");
                Arc::new(NullStore)
            }
        },
        None => {
            warn!("No counter store configured; using in-process memory store");
            Arc::new(MemoryStore::new())
        }
    }
}
