//! In-process store used for development and tests.

use super::{KeyValueStore, StoreError};
use async_trait::async_trait;
use std::{
    collections::{HashMap, HashSet},
    time::{Duration, Instant},
};
use tokio::sync::Mutex;

enum Value {
    Scalar(String),
    Set(HashSet<String>),
}

struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// `HashMap` behind a mutex with lazy expiry. Single-process only; matches
/// Redis semantics closely enough for every caller in this crate.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.expired() => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => match &entry.value {
                Value::Scalar(value) => Ok(Some(value.clone())),
                Value::Set(_) => Err(StoreError::Malformed(key.to_string())),
            },
            None => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Scalar(value.to_string()),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        let mut entries = self.entries.lock().await;
        if entries.get(key).is_some_and(Entry::expired) {
            entries.remove(key);
        }
        match entries.get_mut(key) {
            Some(entry) => match &mut entry.value {
                Value::Scalar(value) => {
                    let current: i64 = value
                        .parse()
                        .map_err(|_| StoreError::Malformed(key.to_string()))?;
                    let next = current + 1;
                    *value = next.to_string();
                    Ok(next)
                }
                Value::Set(_) => Err(StoreError::Malformed(key.to_string())),
            },
            None => {
                entries.insert(
                    key.to_string(),
                    Entry {
                        value: Value::Scalar("1".to_string()),
                        expires_at: None,
                    },
                );
                Ok(1)
            }
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get_mut(key) {
            if !entry.expired() {
                entry.expires_at = Some(Instant::now() + ttl);
            }
        }
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.expired() => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(entry
                .expires_at
                .map(|at| at.saturating_duration_since(Instant::now()))),
            None => Ok(None),
        }
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        if entries.get(key).is_some_and(Entry::expired) {
            entries.remove(key);
        }
        match entries.get_mut(key) {
            Some(entry) => match &mut entry.value {
                Value::Set(members) => {
                    members.insert(member.to_string());
                    Ok(())
                }
                Value::Scalar(_) => Err(StoreError::Malformed(key.to_string())),
            },
            None => {
                let mut members = HashSet::new();
                members.insert(member.to_string());
                entries.insert(
                    key.to_string(),
                    Entry {
                        value: Value::Set(members),
                        expires_at: None,
                    },
                );
                Ok(())
            }
        }
    }

    async fn srem(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get_mut(key) {
            if let Value::Set(members) = &mut entry.value {
                members.remove(member);
                if members.is_empty() {
                    entries.remove(key);
                }
            }
        }
        Ok(())
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.expired() => {
                entries.remove(key);
                Ok(Vec::new())
            }
            Some(entry) => match &entry.value {
                Value::Set(members) => Ok(members.iter().cloned().collect()),
                Value::Scalar(_) => Err(StoreError::Malformed(key.to_string())),
            },
            None => Ok(Vec::new()),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
