//! Process-wide embedding cache keyed by normalized text.
//!
//! Backed by [`moka`]; entries expire by TTL or are evicted by capacity,
//! whichever triggers first. Cloning shares the underlying cache.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use crate::normalize::normalize;

#[derive(Clone)]
pub struct EmbeddingCache {
    inner: Cache<String, Arc<Vec<f32>>>,
}

impl EmbeddingCache {
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        let inner = Cache::builder().max_capacity(capacity).time_to_live(ttl).build();
        Self { inner }
    }

    /// Look up an already-normalized key.
    pub async fn get(&self, key: &str) -> Option<Arc<Vec<f32>>> {
        self.inner.get(key).await
    }

    pub async fn insert(&self, key: String, vector: Arc<Vec<f32>>) {
        self.inner.insert(key, vector).await;
    }

    /// Drop the entry for `text`, normalizing it first.
    pub async fn invalidate(&self, text: &str) {
        self.inner.invalidate(&normalize(text)).await;
    }

    pub fn clear(&self) {
        self.inner.invalidate_all();
    }

    /// Entry count after pending maintenance has been applied.
    pub async fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks().await;
        self.inner.entry_count()
    }
}

impl std::fmt::Debug for EmbeddingCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingCache").field("entries", &self.inner.entry_count()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn invalidate_normalizes_the_key() {
        let cache = EmbeddingCache::new(10, Duration::from_secs(60));
        cache.insert("pool house".into(), Arc::new(vec![1.0])).await;
        assert!(cache.get("pool house").await.is_some());
        cache.invalidate("  POOL   house ").await;
        assert!(cache.get("pool house").await.is_none());
    }

    #[tokio::test]
    async fn clear_empties_cache() {
        let cache = EmbeddingCache::new(10, Duration::from_secs(60));
        cache.insert("a".into(), Arc::new(vec![1.0])).await;
        cache.insert("b".into(), Arc::new(vec![2.0])).await;
        assert_eq!(cache.entry_count().await, 2);
        cache.clear();
        assert_eq!(cache.entry_count().await, 0);
    }
}
