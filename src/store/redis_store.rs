//! Redis adapter for the shared key-value store.

use super::{KeyValueStore, StoreError};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::time::Duration;
use tokio::time::timeout;

/// Redis-backed store using a self-reconnecting connection manager.
///
/// Every command is wrapped in a bounded timeout; a slow or dead Redis
/// surfaces as [`StoreError::Unavailable`] so callers can apply their
/// fail-open or fail-closed policy instead of hanging.
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
    op_timeout: Duration,
}

impl RedisStore {
    /// Connect to Redis, bounding the initial handshake by `op_timeout`.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the server does not answer
    /// within the timeout.
    pub async fn connect(url: &str, op_timeout: Duration) -> Result<Self, StoreError> {
        let client =
            redis::Client::open(url).map_err(|err| StoreError::Unavailable(err.to_string()))?;
        let manager = timeout(op_timeout, client.get_connection_manager())
            .await
            .map_err(|_| StoreError::Unavailable("connect timed out".to_string()))?
            .map_err(|err| StoreError::Unavailable(err.to_string()))?;
        Ok(Self {
            manager,
            op_timeout,
        })
    }

    async fn run<T: redis::FromRedisValue>(&self, cmd: &redis::Cmd) -> Result<T, StoreError> {
        let mut conn = self.manager.clone();
        timeout(self.op_timeout, cmd.query_async(&mut conn))
            .await
            .map_err(|_| StoreError::Unavailable("command timed out".to_string()))?
            .map_err(|err| StoreError::Unavailable(err.to_string()))
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.run(redis::cmd("GET").arg(key)).await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.run(
            redis::cmd("SET")
                .arg(key)
                .arg(value)
                .arg("EX")
                .arg(ttl.as_secs().max(1)),
        )
        .await
    }

    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        self.run(redis::cmd("INCR").arg(key)).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let _: i64 = self
            .run(redis::cmd("EXPIRE").arg(key).arg(ttl.as_secs().max(1)))
            .await?;
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let seconds: i64 = self.run(redis::cmd("TTL").arg(key)).await?;
        // -2 means missing, -1 means no expiry attached.
        if seconds < 0 {
            return Ok(None);
        }
        Ok(Some(Duration::from_secs(seconds.unsigned_abs())))
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        let _: i64 = self.run(redis::cmd("DEL").arg(key)).await?;
        Ok(())
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let _: i64 = self.run(redis::cmd("SADD").arg(key).arg(member)).await?;
        Ok(())
    }

    async fn srem(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let _: i64 = self.run(redis::cmd("SREM").arg(key).arg(member)).await?;
        Ok(())
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        self.run(redis::cmd("SMEMBERS").arg(key)).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let _: String = self.run(&redis::cmd("PING")).await?;
        Ok(())
    }
}
