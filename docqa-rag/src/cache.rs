//! Content-addressed embedding cache.
//!
//! [`CachedEmbeddingProvider`] wraps any [`EmbeddingProvider`] and remembers
//! vectors by the SHA-256 digest of the exact input text. It is a pure
//! performance layer: results are identical with or without it.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::debug;

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

/// Default number of cached vectors.
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// Hit/miss counters for a [`CachedEmbeddingProvider`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

#[derive(Default)]
struct CacheState {
    vectors: HashMap<String, Vec<f32>>,
    /// Insertion order, oldest first.
    order: VecDeque<String>,
    hits: u64,
    misses: u64,
}

impl CacheState {
    fn insert(&mut self, key: String, vector: Vec<f32>, capacity: usize) {
        if self.vectors.contains_key(&key) {
            return;
        }
        while self.vectors.len() >= capacity {
            let Some(oldest) = self.order.pop_front() else { break };
            self.vectors.remove(&oldest);
        }
        self.order.push_back(key.clone());
        self.vectors.insert(key, vector);
    }
}

/// An [`EmbeddingProvider`] decorator that caches vectors by content hash.
///
/// Eviction is first-in, first-out once `capacity` entries are stored.
pub struct CachedEmbeddingProvider {
    inner: Arc<dyn EmbeddingProvider>,
    capacity: usize,
    state: Mutex<CacheState>,
}

impl CachedEmbeddingProvider {
    /// Wrap `inner` with a cache of [`DEFAULT_CACHE_CAPACITY`] entries.
    pub fn new(inner: Arc<dyn EmbeddingProvider>) -> Self {
        Self::with_capacity(inner, DEFAULT_CACHE_CAPACITY)
    }

    /// Wrap `inner` with a cache holding at most `capacity` vectors.
    pub fn with_capacity(inner: Arc<dyn EmbeddingProvider>, capacity: usize) -> Self {
        Self { inner, capacity: capacity.max(1), state: Mutex::new(CacheState::default()) }
    }

    /// Current hit/miss counters.
    pub async fn stats(&self) -> CacheStats {
        let state = self.state.lock().await;
        CacheStats { hits: state.hits, misses: state.misses, entries: state.vectors.len() }
    }

    /// Drop every cached vector. Counters are kept.
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.vectors.clear();
        state.order.clear();
    }
}

/// Hex-encoded SHA-256 of the text.
pub fn content_key(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[async_trait]
impl EmbeddingProvider for CachedEmbeddingProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let key = content_key(text);
        {
            let mut state = self.state.lock().await;
            if let Some(vector) = state.vectors.get(&key).cloned() {
                state.hits += 1;
                return Ok(vector);
            }
            state.misses += 1;
        }

        let vector = self.inner.embed(text).await?;
        self.state.lock().await.insert(key, vector.clone(), self.capacity);
        Ok(vector)
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let keys: Vec<String> = texts.iter().map(|t| content_key(t)).collect();
        let mut results: Vec<Option<Vec<f32>>> = Vec::with_capacity(texts.len());
        let mut missing = Vec::new();
        {
            let mut state = self.state.lock().await;
            for (i, key) in keys.iter().enumerate() {
                let cached = state.vectors.get(key).cloned();
                if cached.is_some() {
                    state.hits += 1;
                } else {
                    state.misses += 1;
                    missing.push(i);
                }
                results.push(cached);
            }
        }

        if !missing.is_empty() {
            debug!(
                provider = self.inner.name(),
                cached = texts.len() - missing.len(),
                missing = missing.len(),
                "embedding cache lookup"
            );
            let missing_texts: Vec<&str> = missing.iter().map(|&i| texts[i]).collect();
            let fresh = self.inner.embed_batch(&missing_texts).await?;
            if fresh.len() != missing.len() {
                return Err(RagError::Embedding {
                    provider: self.inner.name().to_string(),
                    message: format!(
                        "expected {} embeddings, received {}",
                        missing.len(),
                        fresh.len()
                    ),
                });
            }
            let mut state = self.state.lock().await;
            for (&i, vector) in missing.iter().zip(fresh) {
                state.insert(keys[i].clone(), vector.clone(), self.capacity);
                results[i] = Some(vector);
            }
        }

        Ok(results.into_iter().map(Option::unwrap_or_default).collect())
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }
}
