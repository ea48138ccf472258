//! No-op store used when the configured backend is unreachable at startup.

use super::{KeyValueStore, StoreError};
use async_trait::async_trait;
use std::time::Duration;

/// Remembers nothing. Reads return empty, writes succeed silently, counters
/// always report 1, so limiters and lockouts fail open while the service
/// keeps answering.
pub struct NullStore;

#[async_trait]
impl KeyValueStore for NullStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Ok(None)
    }

    async fn set_ex(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), StoreError> {
        Ok(())
    }

    async fn incr(&self, _key: &str) -> Result<i64, StoreError> {
        Ok(1)
    }

    async fn expire(&self, _key: &str, _ttl: Duration) -> Result<(), StoreError> {
        Ok(())
    }

    async fn ttl(&self, _key: &str) -> Result<Option<Duration>, StoreError> {
        Ok(None)
    }

    async fn del(&self, _key: &str) -> Result<(), StoreError> {
        Ok(())
    }

    async fn sadd(&self, _key: &str, _member: &str) -> Result<(), StoreError> {
        Ok(())
    }

    async fn srem(&self, _key: &str, _member: &str) -> Result<(), StoreError> {
        Ok(())
    }

    async fn smembers(&self, _key: &str) -> Result<Vec<String>, StoreError> {
        Ok(Vec::new())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("null store".to_string()))
    }
}
