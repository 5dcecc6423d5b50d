//! Embedding provider wrapper using Moka
//!
//! Repeated texts skip the inner provider. Keys are the SHA-256 of the text.

use async_trait::async_trait;
use moka::future::Cache;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::embedding::{EmbeddingError, EmbeddingProvider};

#[derive(Debug, Clone)]
pub struct EmbedCacheConfig {
    pub max_entries: u64,
    pub ttl: Duration,
}

impl Default for EmbedCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl: Duration::from_secs(3600),
        }
    }
}

fn cache_key(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Memoizing wrapper around any [`EmbeddingProvider`]
#[derive(Debug)]
pub struct CachedEmbedder<P: EmbeddingProvider> {
    inner: P,
    cache: Cache<String, Arc<Vec<f32>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<P: EmbeddingProvider> CachedEmbedder<P> {
    pub fn new(provider: P, config: EmbedCacheConfig) -> Self {
        Self {
            inner: provider,
            cache: Cache::builder()
                .max_capacity(config.max_entries)
                .time_to_live(config.ttl)
                .build(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn wrap(provider: P) -> Self {
        Self::new(provider, EmbedCacheConfig::default())
    }

    /// (hits, misses)
    pub fn stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}

#[async_trait]
impl<P: EmbeddingProvider + 'static> EmbeddingProvider for CachedEmbedder<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let key = cache_key(text);
        if let Some(cached) = self.cache.get(&key).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(cached.as_ref().clone());
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let vector = self.inner.embed(text).await?;
        if vector.len() != self.inner.dimensions() {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.inner.dimensions(),
                actual: vector.len(),
            });
        }
        self.cache.insert(key, Arc::new(vector.clone())).await;
        Ok(vector)
    }
}
