//! Configuration for the similarity engine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Configuration for the similarity engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Candidate corpus files, tried in order.
    pub corpus_paths: Vec<PathBuf>,

    /// Embedding provider configuration.
    pub embedding: EmbeddingConfig,

    /// Search defaults.
    pub search: SearchConfig,
}

impl EngineConfig {
    /// Create a configuration that reads the corpus from a single file.
    pub fn new(corpus_path: impl Into<PathBuf>) -> Self {
        Self {
            corpus_paths: vec![corpus_path.into()],
            ..Self::default()
        }
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML configuration file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Add a candidate corpus path, tried after the existing ones.
    pub fn with_corpus_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.corpus_paths.push(path.into());
        self
    }

    /// Set the embedding configuration.
    pub fn with_embedding(mut self, config: EmbeddingConfig) -> Self {
        self.embedding = config;
        self
    }

    /// Set the search configuration.
    pub fn with_search(mut self, config: SearchConfig) -> Self {
        self.search = config;
        self
    }

    /// Reject values that would make every search meaningless.
    pub fn validate(&self) -> Result<()> {
        let search = &self.search;
        if search.top_k == 0 {
            return Err(EngineError::Config("search.top_k must be positive".to_string()));
        }
        if search.overfetch_factor == 0 {
            return Err(EngineError::Config(
                "search.overfetch_factor must be positive".to_string(),
            ));
        }
        if !(-1.0..=1.0).contains(&search.threshold) {
            return Err(EngineError::Config(format!(
                "search.threshold must be within [-1, 1], got {}",
                search.threshold
            )));
        }
        if !(-1.0..=1.0).contains(&search.exact_match_threshold) {
            return Err(EngineError::Config(format!(
                "search.exact_match_threshold must be within [-1, 1], got {}",
                search.exact_match_threshold
            )));
        }
        if self.embedding.batch_size == 0 {
            return Err(EngineError::Config(
                "embedding.batch_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            corpus_paths: vec![
                PathBuf::from("question.json"),
                PathBuf::from("questions.json"),
            ],
            embedding: EmbeddingConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

/// Configuration for the embedding provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Which provider to use.
    pub provider: EmbeddingProviderType,

    /// Model to use for embeddings.
    pub model: Option<String>,

    /// Base URL for OpenAI-compatible APIs.
    pub base_url: Option<String>,

    /// Output dimension (hashing size, or shortened API output).
    pub dimension: Option<usize>,

    /// Number of texts per provider call while building the index.
    pub batch_size: usize,

    /// Whether to cache embeddings.
    pub cache_enabled: bool,

    /// Maximum cache size.
    pub cache_max_entries: usize,

    /// Deadline for a single provider call, in milliseconds.
    pub embed_timeout_ms: Option<u64>,
}

impl EmbeddingConfig {
    /// Deadline for a single provider call.
    pub fn embed_timeout(&self) -> Option<Duration> {
        self.embed_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderType::Hashing,
            model: None,
            base_url: None,
            dimension: None,
            batch_size: 64,
            cache_enabled: true,
            cache_max_entries: 10000,
            embed_timeout_ms: None,
        }
    }
}

/// Type of embedding provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProviderType {
    /// OpenAI-compatible embeddings API.
    #[serde(rename = "open_ai")]
    OpenAI,
    /// Offline feature-hashing model.
    Hashing,
}

/// Default search parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Minimum cosine similarity for a result.
    pub threshold: f32,

    /// Maximum number of results to return.
    pub top_k: usize,

    /// Cosine similarity at which two differently written texts count as
    /// the same question.
    pub exact_match_threshold: f32,

    /// Drop exact matches from the result list (they are still reported).
    pub exclude_exact: bool,

    /// Candidates fetched per requested result.
    pub overfetch_factor: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            threshold: 0.8,
            top_k: 10,
            exact_match_threshold: 0.99,
            exclude_exact: true,
            overfetch_factor: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();

        assert_eq!(config.embedding.provider, EmbeddingProviderType::Hashing);
        assert_eq!(config.search.threshold, 0.8);
        assert_eq!(config.search.top_k, 10);
        assert!(config.search.exclude_exact);
        assert_eq!(config.search.overfetch_factor, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            corpus_paths = ["data/question.json"]

            [embedding]
            provider = "open_ai"
            model = "text-embedding-3-small"
            embed_timeout_ms = 2500

            [search]
            top_k = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.corpus_paths, vec![PathBuf::from("data/question.json")]);
        assert_eq!(config.embedding.provider, EmbeddingProviderType::OpenAI);
        assert_eq!(
            config.embedding.embed_timeout(),
            Some(Duration::from_millis(2500))
        );
        assert_eq!(config.embedding.batch_size, 64);
        assert_eq!(config.search.top_k, 5);
        assert_eq!(config.search.threshold, 0.8);
    }

    #[test]
    fn test_rejects_zero_top_k() {
        let result = EngineConfig::from_toml_str("[search]\ntop_k = 0\n");
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[test]
    fn test_rejects_out_of_range_threshold() {
        let result = EngineConfig::from_toml_str("[search]\nthreshold = 1.5\n");
        assert!(matches!(result, Err(EngineError::Config(_))));
    }
}
