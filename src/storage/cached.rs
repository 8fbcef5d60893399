use crate::models::{MatchTuple, VisitorRecord};
use crate::storage::{Storage, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Read-through cache in front of another storage backend.
///
/// Only found records are cached. A visitor's user id never changes once
/// written, so a cached hit cannot go stale; misses always reach the
/// underlying storage so a freshly inserted visitor is seen immediately.
pub struct CachedStorage {
    /// Underlying storage implementation
    inner: Arc<dyn Storage>,
    /// Records by match tuple (Moka cache)
    read_cache: Cache<MatchTuple, VisitorRecord>,
}

impl CachedStorage {
    pub fn new(inner: Arc<dyn Storage>, max_cache_entries: u64, ttl_secs: u64) -> Self {
        let read_cache = Cache::builder()
            .max_capacity(max_cache_entries)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();

        Self { inner, read_cache }
    }

    /// Number of cached visitors (approximate, pending maintenance)
    pub fn cached_entries(&self) -> u64 {
        self.read_cache.entry_count()
    }
}

#[async_trait]
impl Storage for CachedStorage {
    async fn init(&self) -> Result<()> {
        self.inner.init().await
    }

    async fn find_exact(&self, tuple: &MatchTuple) -> StorageResult<Option<VisitorRecord>> {
        if let Some(cached) = self.read_cache.get(tuple).await {
            return Ok(Some(cached));
        }

        let result = self.inner.find_exact(tuple).await?;

        if let Some(ref record) = result {
            self.read_cache.insert(tuple.clone(), record.clone()).await;
        }

        Ok(result)
    }

    async fn insert(&self, tuple: &MatchTuple, user_id: &str) -> StorageResult<VisitorRecord> {
        let record = self.inner.insert(tuple, user_id).await?;

        self.read_cache.insert(tuple.clone(), record.clone()).await;

        Ok(record)
    }

    async fn count_matching(&self, tuple: &MatchTuple) -> Result<i64> {
        self.inner.count_matching(tuple).await
    }
}
