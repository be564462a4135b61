//! Read-through, write-invalidate cache for the shared category table
//!
//! `CategoryCache` only needs two operations from its backend, so any key-value
//! store with expiry can stand behind [`CacheStore`].

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::error::Result;

/// Minimal key-value backend with per-entry expiry
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Stored bytes, or `None` when absent or expired
    async fn get(&self, key: &str) -> Option<Vec<u8>>;
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration);
    /// Returns whether an entry was removed
    async fn forget(&self, key: &str) -> bool;
}

struct CacheEntry {
    value: Vec<u8>,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// In-process backend: a map with expiry timestamps
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired entry
    pub async fn purge_expired(&self) {
        self.entries
            .write()
            .await
            .retain(|_, entry| !entry.is_expired());
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value.clone())
    }

    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().await.insert(key.to_string(), entry);
    }

    async fn forget(&self, key: &str) -> bool {
        self.entries.write().await.remove(key).is_some()
    }
}

/// Cache in front of category reads
///
/// Population is not single-flight: concurrent misses may both run the loader
/// and store the same value.
#[derive(Clone)]
pub struct CategoryCache {
    backend: Arc<dyn CacheStore>,
}

impl CategoryCache {
    pub fn new(backend: Arc<dyn CacheStore>) -> Self {
        Self { backend }
    }

    /// Cached value for `key`, running `loader` and storing its result on a miss
    ///
    /// Loader errors are returned as-is and nothing is stored.
    pub async fn get<T, F, Fut>(&self, key: &str, loader: F, ttl: Duration) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(bytes) = self.backend.get(key).await {
            match serde_json::from_slice(&bytes) {
                Ok(value) => {
                    tracing::debug!("Cache hit: {}", key);
                    return Ok(value);
                }
                Err(e) => {
                    tracing::warn!("Discarding unreadable cache entry {}: {}", key, e);
                    self.backend.forget(key).await;
                }
            }
        }

        tracing::debug!("Cache miss: {}", key);
        let value = loader().await?;
        let bytes = serde_json::to_vec(&value)?;
        self.backend.put(key, bytes, ttl).await;

        Ok(value)
    }

    pub async fn invalidate(&self, key: &str) {
        if self.backend.forget(key).await {
            tracing::debug!("Cache invalidated: {}", key);
        }
    }
}
