//! Embedding cache for repeated lookups.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::Embedding;
use crate::error::{EmbeddingError, Result};
use crate::provider::{EmbeddingProvider, EmbeddingRequest, EmbeddingResponse};

/// Cache entry for an embedding.
#[derive(Debug, Clone)]
struct CacheEntry {
    /// The embedding vector.
    embedding: Embedding,

    /// Insertion sequence number, used to find the oldest entry.
    inserted: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<(String, String), CacheEntry>,
    next_seq: u64,
}

/// Bounded in-memory cache keyed by (model, text).
#[derive(Clone)]
pub struct EmbeddingCache {
    state: Arc<RwLock<CacheState>>,

    /// Maximum cache size.
    max_entries: usize,
}

impl EmbeddingCache {
    /// Create a new in-memory cache.
    pub fn new(max_entries: usize) -> Self {
        Self {
            state: Arc::new(RwLock::new(CacheState::default())),
            max_entries,
        }
    }

    fn key(text: &str, model: &str) -> (String, String) {
        (model.to_string(), text.to_string())
    }

    /// Get an embedding from the cache.
    pub async fn get(&self, text: &str, model: &str) -> Option<Embedding> {
        let state = self.state.read().await;
        state
            .entries
            .get(&Self::key(text, model))
            .map(|e| e.embedding.clone())
    }

    /// Put an embedding in the cache, evicting the oldest entry when full.
    pub async fn put(&self, text: &str, model: &str, embedding: Embedding) {
        if self.max_entries == 0 {
            return;
        }

        let mut state = self.state.write().await;
        let key = Self::key(text, model);

        if !state.entries.contains_key(&key) && state.entries.len() >= self.max_entries {
            if let Some(oldest_key) = state
                .entries
                .iter()
                .min_by_key(|(_, v)| v.inserted)
                .map(|(k, _)| k.clone())
            {
                state.entries.remove(&oldest_key);
            }
        }

        let inserted = state.next_seq;
        state.next_seq += 1;
        state.entries.insert(key, CacheEntry { embedding, inserted });
    }
}

/// A provider wrapper that serves repeated texts from an [`EmbeddingCache`].
pub struct CachedProvider<P> {
    provider: P,
    cache: EmbeddingCache,
}

impl<P> CachedProvider<P>
where
    P: EmbeddingProvider,
{
    /// Create a new cached provider.
    pub fn new(provider: P, cache: EmbeddingCache) -> Self {
        Self { provider, cache }
    }

    fn model_for(&self, request: &EmbeddingRequest) -> String {
        request
            .model
            .clone()
            .unwrap_or_else(|| self.provider.default_model().to_string())
    }
}

#[async_trait]
impl<P> EmbeddingProvider for CachedProvider<P>
where
    P: EmbeddingProvider,
{
    fn name(&self) -> &str {
        self.provider.name()
    }

    fn default_model(&self) -> &str {
        self.provider.default_model()
    }

    fn default_dimension(&self) -> usize {
        self.provider.default_dimension()
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        let model = self.model_for(&request);

        if let Some(embedding) = self.cache.get(&request.text, &model).await {
            debug!("Cache hit for embedding");
            return Ok(EmbeddingResponse {
                dimension: embedding.len(),
                embedding,
                model,
                tokens_used: None,
            });
        }

        let text = request.text.clone();
        let response = self.provider.embed(request).await?;
        self.cache
            .put(&text, &model, response.embedding.clone())
            .await;

        Ok(response)
    }

    async fn embed_batch(&self, requests: Vec<EmbeddingRequest>) -> Result<Vec<EmbeddingResponse>> {
        let mut results: Vec<Option<EmbeddingResponse>> = Vec::with_capacity(requests.len());
        let mut misses = Vec::new();
        let mut miss_slots = Vec::new();

        for request in requests {
            let model = self.model_for(&request);
            match self.cache.get(&request.text, &model).await {
                Some(embedding) => results.push(Some(EmbeddingResponse {
                    dimension: embedding.len(),
                    embedding,
                    model,
                    tokens_used: None,
                })),
                None => {
                    miss_slots.push(results.len());
                    results.push(None);
                    misses.push(request);
                }
            }
        }

        if !misses.is_empty() {
            debug!("Cache miss for {} of {} texts", misses.len(), results.len());
            let keys: Vec<(String, String)> = misses
                .iter()
                .map(|r| (r.text.clone(), self.model_for(r)))
                .collect();
            let generated = self.provider.embed_batch(misses).await?;
            if generated.len() != keys.len() {
                return Err(EmbeddingError::InvalidResponse(format!(
                    "expected {} embeddings, got {}",
                    keys.len(),
                    generated.len()
                )));
            }

            for ((slot, (text, model)), response) in
                miss_slots.into_iter().zip(keys).zip(generated)
            {
                self.cache
                    .put(&text, &model, response.embedding.clone())
                    .await;
                results[slot] = Some(response);
            }
        }

        Ok(results.into_iter().flatten().collect())
    }

    fn is_available(&self) -> bool {
        self.provider.is_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::HashingProvider;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_cache_put_get() {
        let cache = EmbeddingCache::new(100);
        let embedding = vec![1.0, 2.0, 3.0];

        cache.put("hello", "model-1", embedding.clone()).await;

        assert_eq!(cache.get("hello", "model-1").await, Some(embedding));
        assert_eq!(cache.get("hello", "model-2").await, None);
    }

    #[tokio::test]
    async fn test_cache_miss() {
        let cache = EmbeddingCache::new(100);
        let result = cache.get("not cached", "model-1").await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_cache_eviction_drops_oldest() {
        let cache = EmbeddingCache::new(2);

        cache.put("a", "model", vec![1.0]).await;
        cache.put("b", "model", vec![2.0]).await;
        cache.put("c", "model", vec![3.0]).await;

        assert_eq!(cache.get("a", "model").await, None);
        assert_eq!(cache.get("b", "model").await, Some(vec![2.0]));
        assert_eq!(cache.get("c", "model").await, Some(vec![3.0]));
    }

    #[tokio::test]
    async fn test_cached_provider_fills_cache() {
        let cache = EmbeddingCache::new(10);
        let provider = CachedProvider::new(HashingProvider::new(16), cache.clone());

        let first = provider.embed(EmbeddingRequest::new("hello")).await.unwrap();
        assert_eq!(
            cache.get("hello", "fnv1a-bag-of-words").await,
            Some(first.embedding.clone())
        );

        let second = provider.embed(EmbeddingRequest::new("hello")).await.unwrap();
        assert_eq!(first.embedding, second.embedding);
    }

    #[tokio::test]
    async fn test_cached_batch_preserves_order() {
        let provider = CachedProvider::new(HashingProvider::new(16), EmbeddingCache::new(10));
        provider.embed(EmbeddingRequest::new("b")).await.unwrap();

        let batch = provider
            .embed_batch(vec![
                EmbeddingRequest::new("a"),
                EmbeddingRequest::new("b"),
                EmbeddingRequest::new("c"),
            ])
            .await
            .unwrap();

        let direct = HashingProvider::new(16);
        for (text, response) in ["a", "b", "c"].into_iter().zip(&batch) {
            let expected = direct.embed(EmbeddingRequest::new(text)).await.unwrap();
            assert_eq!(response.embedding, expected.embedding);
        }
    }
}
