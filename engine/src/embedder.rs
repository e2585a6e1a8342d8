//! Adapter between the engine and an embedding provider.
//!
//! Every vector leaving this module is L2-normalized, and every provider
//! call is bounded by the configured deadline.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use qsim_embeddings::{
    CachedProvider, Embedding, EmbeddingCache, EmbeddingError, EmbeddingProvider,
    EmbeddingRequest, HashingProvider, OpenAIProvider, normalize,
};
use tracing::debug;

use crate::config::{EmbeddingConfig, EmbeddingProviderType};

type EmbedResult<T> = std::result::Result<T, EmbeddingError>;

/// Build the provider described by the configuration.
pub fn provider_from_config(config: &EmbeddingConfig) -> Arc<dyn EmbeddingProvider> {
    match config.provider {
        EmbeddingProviderType::OpenAI => {
            let mut provider = OpenAIProvider::new();
            if let Some(model) = &config.model {
                provider = provider.with_model(model);
            }
            if let Some(url) = &config.base_url {
                provider = provider.with_base_url(url);
            }
            if let Some(dimension) = config.dimension {
                provider = provider.with_dimensions(dimension);
            }
            wrap_cache(provider, config)
        }
        EmbeddingProviderType::Hashing => {
            let provider = config
                .dimension
                .map_or_else(HashingProvider::default, HashingProvider::new);
            wrap_cache(provider, config)
        }
    }
}

fn wrap_cache<P>(provider: P, config: &EmbeddingConfig) -> Arc<dyn EmbeddingProvider>
where
    P: EmbeddingProvider + 'static,
{
    if config.cache_enabled {
        Arc::new(CachedProvider::new(
            provider,
            EmbeddingCache::new(config.cache_max_entries),
        ))
    } else {
        Arc::new(provider)
    }
}

/// Normalizing, deadline-aware handle on a provider.
#[derive(Clone)]
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
    timeout: Option<Duration>,
    batch_size: usize,
}

impl Embedder {
    /// Wrap a provider with no deadline and the default batch size.
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            timeout: None,
            batch_size: 64,
        }
    }

    /// Build an embedder from configuration.
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        let mut embedder =
            Self::new(provider_from_config(config)).with_batch_size(config.batch_size);
        embedder.timeout = config.embed_timeout();
        embedder
    }

    /// Bound every provider call by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set how many texts go into one provider call.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Name of the wrapped provider.
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Embed one text and normalize the result.
    pub async fn embed_one(&self, text: &str) -> EmbedResult<Embedding> {
        let response = self
            .with_deadline(self.provider.embed(EmbeddingRequest::new(text)))
            .await?;

        let mut embedding = response.embedding;
        if embedding.is_empty() {
            return Err(EmbeddingError::InvalidResponse(
                "provider returned an empty vector".to_string(),
            ));
        }
        normalize(&mut embedding);
        Ok(embedding)
    }

    /// Embed many texts in batches, preserving order, and normalize each.
    ///
    /// Fails if the provider returns the wrong number of vectors or vectors
    /// of differing dimension.
    pub async fn embed_all(&self, texts: &[String]) -> EmbedResult<Vec<Embedding>> {
        let mut embeddings: Vec<Embedding> = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(self.batch_size) {
            let requests = chunk.iter().map(EmbeddingRequest::new).collect();
            let responses = self
                .with_deadline(self.provider.embed_batch(requests))
                .await?;

            if responses.len() != chunk.len() {
                return Err(EmbeddingError::InvalidResponse(format!(
                    "expected {} embeddings, got {}",
                    chunk.len(),
                    responses.len()
                )));
            }

            for response in responses {
                let mut embedding = response.embedding;
                if let Some(first) = embeddings.first() {
                    if first.len() != embedding.len() {
                        return Err(EmbeddingError::DimensionMismatch {
                            expected: first.len(),
                            actual: embedding.len(),
                        });
                    }
                }
                normalize(&mut embedding);
                embeddings.push(embedding);
            }

            debug!("Embedded {} of {} texts", embeddings.len(), texts.len());
        }

        Ok(embeddings)
    }

    async fn with_deadline<T, F>(&self, future: F) -> EmbedResult<T>
    where
        F: Future<Output = EmbedResult<T>>,
    {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, future)
                .await
                .map_err(|_| EmbeddingError::Timeout {
                    millis: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                })?,
            None => future.await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use qsim_embeddings::EmbeddingResponse;

    struct SlowProvider;

    #[async_trait]
    impl EmbeddingProvider for SlowProvider {
        fn name(&self) -> &str {
            "slow"
        }

        fn default_model(&self) -> &str {
            "slow"
        }

        fn default_dimension(&self) -> usize {
            2
        }

        async fn embed(&self, _request: EmbeddingRequest) -> EmbedResult<EmbeddingResponse> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(EmbeddingResponse {
                embedding: vec![1.0, 0.0],
                model: "slow".to_string(),
                dimension: 2,
                tokens_used: None,
            })
        }

        fn is_available(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn test_embed_one_is_normalized() {
        let embedder = Embedder::new(Arc::new(HashingProvider::new(64)));
        let embedding = embedder.embed_one("a b c").await.unwrap();

        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_embed_all_batches_in_order() {
        let provider = Arc::new(HashingProvider::new(32));
        let embedder = Embedder::new(provider).with_batch_size(2);
        let texts: Vec<String> = ["one", "two", "three", "four", "five"]
            .into_iter()
            .map(String::from)
            .collect();

        let all = embedder.embed_all(&texts).await.unwrap();

        assert_eq!(all.len(), 5);
        for (text, embedding) in texts.iter().zip(&all) {
            assert_eq!(&embedder.embed_one(text).await.unwrap(), embedding);
        }
    }

    #[tokio::test]
    async fn test_deadline_maps_to_timeout() {
        let embedder =
            Embedder::new(Arc::new(SlowProvider)).with_timeout(Duration::from_millis(50));

        let err = embedder.embed_one("anything").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Timeout { millis: 50 }));
    }

    #[test]
    fn test_provider_from_config() {
        let config = EmbeddingConfig {
            dimension: Some(12),
            ..EmbeddingConfig::default()
        };
        let provider = provider_from_config(&config);

        assert_eq!(provider.name(), "hashing");
        assert_eq!(provider.default_dimension(), 12);
    }
}
