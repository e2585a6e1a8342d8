//! Similarity engine implementation.

use std::sync::Arc;

use qsim_embeddings::EmbeddingError;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::config::{EngineConfig, SearchConfig};
use crate::corpus::{CorpusStore, Record};
use crate::embedder::Embedder;
use crate::error::{EngineError, Result};
use crate::exact::ExactMatchDetector;
use crate::snapshot::CorpusSnapshot;

/// Per-call search parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FindOptions {
    /// Minimum cosine similarity for a result.
    pub threshold: f32,

    /// Maximum number of results.
    pub top_k: usize,

    /// Leave exact matches out of the result list.
    pub exclude_exact: bool,
}

impl FindOptions {
    /// Set the minimum similarity.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the maximum number of results.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Set whether exact matches are left out of the results.
    pub fn with_exclude_exact(mut self, exclude_exact: bool) -> Self {
        self.exclude_exact = exclude_exact;
        self
    }
}

impl Default for FindOptions {
    fn default() -> Self {
        Self::from(&SearchConfig::default())
    }
}

impl From<&SearchConfig> for FindOptions {
    fn from(config: &SearchConfig) -> Self {
        Self {
            threshold: config.threshold,
            top_k: config.top_k,
            exclude_exact: config.exclude_exact,
        }
    }
}

/// One corpus question close to the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityMatch {
    /// The matched record.
    #[serde(flatten)]
    pub record: Record,

    /// Cosine similarity to the query.
    #[serde(rename = "similarity")]
    pub score: f32,

    /// Whether the record is the same question as the query.
    pub is_exact_match: bool,
}

/// Why a result carries no signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradedReason {
    /// Nothing was indexed.
    EmptyIndex,
    /// The query could not be embedded.
    EmbeddingUnavailable,
    /// The index rejected the query vector or is out of step with the corpus.
    SearchFailed,
}

/// Outcome of a similarity search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Matches ordered by descending score.
    pub results: Vec<SimilarityMatch>,

    /// Whether any candidate above the threshold was the same question.
    pub exact_match_found: bool,

    /// Id of the highest-scoring exact match.
    pub exact_match_id: Option<i64>,

    /// Set when the search could not run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degraded: Option<DegradedReason>,
}

impl QueryResult {
    fn degraded(reason: DegradedReason) -> Self {
        Self {
            degraded: Some(reason),
            ..Self::default()
        }
    }

    /// Whether this result came from a failed or impossible search.
    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }
}

/// Finds corpus questions similar to a query and flags duplicates.
///
/// Searches run against an immutable [`CorpusSnapshot`]; a rebuild swaps in
/// a new snapshot while in-flight searches finish on the old one.
pub struct SimilarityEngine {
    embedder: Embedder,
    detector: ExactMatchDetector,
    search: SearchConfig,
    snapshot: RwLock<Arc<CorpusSnapshot>>,
}

impl SimilarityEngine {
    /// Create a new engine builder.
    pub fn builder() -> SimilarityEngineBuilder {
        SimilarityEngineBuilder::new()
    }

    /// Build an engine over `store`.
    ///
    /// If indexing fails the engine starts with an empty snapshot.
    pub async fn new(store: CorpusStore, embedder: Embedder, search: SearchConfig) -> Self {
        let snapshot = match CorpusSnapshot::build(store, &embedder).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("Error building index: {e}");
                CorpusSnapshot::empty()
            }
        };

        info!("Similarity engine ready with {} indexed questions", snapshot.len());

        Self {
            embedder,
            detector: ExactMatchDetector::new(search.exact_match_threshold),
            search,
            snapshot: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// Load the corpus and provider described by `config` and build.
    pub async fn from_config(config: &EngineConfig) -> Self {
        let store = CorpusStore::load_first(&config.corpus_paths);
        let embedder = Embedder::from_config(&config.embedding);
        Self::new(store, embedder, config.search.clone()).await
    }

    /// The snapshot new searches run against.
    pub async fn snapshot(&self) -> Arc<CorpusSnapshot> {
        Arc::clone(&*self.snapshot.read().await)
    }

    /// Search with the engine's default options.
    pub async fn find_similar_default(&self, query: &str) -> QueryResult {
        self.find_similar(query, FindOptions::from(&self.search))
            .await
    }

    /// Find corpus questions similar to `query`.
    ///
    /// Never fails: an empty index or an unavailable provider produce an
    /// empty result marked as degraded.
    pub async fn find_similar(&self, query: &str, options: FindOptions) -> QueryResult {
        let snapshot = self.snapshot().await;

        match self.search_snapshot(&snapshot, query, options).await {
            Ok(result) => result,
            Err(EngineError::Embedding(EmbeddingError::EmptyIndex)) => {
                warn!("Index not available, returning empty results");
                QueryResult::degraded(DegradedReason::EmptyIndex)
            }
            Err(EngineError::Embedding(e)) if e.is_unavailable() => {
                warn!("Embedding provider unavailable: {e}");
                QueryResult::degraded(DegradedReason::EmbeddingUnavailable)
            }
            Err(e) => {
                error!("Similarity search failed: {e}");
                QueryResult::degraded(DegradedReason::SearchFailed)
            }
        }
    }

    async fn search_snapshot(
        &self,
        snapshot: &CorpusSnapshot,
        query: &str,
        options: FindOptions,
    ) -> Result<QueryResult> {
        if snapshot.is_empty() {
            return Err(EmbeddingError::EmptyIndex.into());
        }
        if options.top_k == 0 {
            return Ok(QueryResult::default());
        }

        let query_embedding = self.embedder.embed_one(query).await?;

        // Exact matches may be dropped below, so ask for more than top_k.
        let k = options
            .top_k
            .saturating_mul(self.search.overfetch_factor)
            .min(snapshot.len());
        let hits = snapshot.index().search(&query_embedding, k)?;

        let matcher = self.detector.for_query(&self.embedder, query);
        let mut result = QueryResult::default();

        for hit in hits {
            if hit.score < options.threshold {
                continue;
            }

            let record = snapshot.record(hit.position).ok_or(EngineError::Misaligned {
                records: snapshot.store().len(),
                vectors: snapshot.len(),
            })?;

            let is_exact_match = matcher.classify(&record.question).await.is_some();
            if is_exact_match && !result.exact_match_found {
                debug!("Found exact match: question ID {}", record.id);
                result.exact_match_found = true;
                result.exact_match_id = Some(record.id);
            }

            if is_exact_match && options.exclude_exact {
                continue;
            }

            result.results.push(SimilarityMatch {
                record: record.clone(),
                score: hit.score,
                is_exact_match,
            });

            if result.results.len() >= options.top_k {
                break;
            }
        }

        // Stable, so equal scores keep index order.
        result
            .results
            .sort_by(|a, b| b.score.total_cmp(&a.score));

        info!(
            "Found {} similar questions above threshold {} (exact match found: {}, excluded: {})",
            result.results.len(),
            options.threshold,
            result.exact_match_found,
            options.exclude_exact
        );

        Ok(result)
    }

    /// Replace the corpus.
    ///
    /// The new snapshot is built before the swap; on failure the current one
    /// stays in place. Returns the number of indexed questions.
    pub async fn rebuild(&self, store: CorpusStore) -> Result<usize> {
        let snapshot = CorpusSnapshot::build(store, &self.embedder).await?;
        let count = snapshot.len();

        *self.snapshot.write().await = Arc::new(snapshot);

        info!("Swapped in rebuilt index with {count} questions");
        Ok(count)
    }

    /// Get engine statistics.
    pub async fn stats(&self) -> EngineStats {
        let snapshot = self.snapshot().await;
        EngineStats {
            records: snapshot.store().len(),
            indexed_vectors: snapshot.len(),
            dimension: snapshot.index().dimension(),
            provider: self.embedder.provider_name().to_string(),
        }
    }
}

/// Builder for [`SimilarityEngine`].
pub struct SimilarityEngineBuilder {
    config: EngineConfig,
    store: Option<CorpusStore>,
    embedder: Option<Embedder>,
}

impl SimilarityEngineBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            store: None,
            embedder: None,
        }
    }

    /// Use a full configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Use in-memory records instead of loading from disk.
    pub fn with_records(mut self, records: impl IntoIterator<Item = Record>) -> Self {
        self.store = Some(CorpusStore::from_records(records));
        self
    }

    /// Use an already loaded store.
    pub fn with_store(mut self, store: CorpusStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Use a specific embedder instead of the configured provider.
    pub fn with_embedder(mut self, embedder: Embedder) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Set the search defaults.
    pub fn with_search(mut self, search: SearchConfig) -> Self {
        self.config.search = search;
        self
    }

    /// Build the engine.
    pub async fn build(self) -> SimilarityEngine {
        let store = self
            .store
            .unwrap_or_else(|| CorpusStore::load_first(&self.config.corpus_paths));
        let embedder = self
            .embedder
            .unwrap_or_else(|| Embedder::from_config(&self.config.embedding));

        SimilarityEngine::new(store, embedder, self.config.search).await
    }
}

impl Default for SimilarityEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about the similarity engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStats {
    /// Number of loaded records.
    pub records: usize,

    /// Number of vectors in the index.
    pub indexed_vectors: usize,

    /// Embedding dimension, zero when nothing is indexed.
    pub dimension: usize,

    /// Name of the embedding provider.
    pub provider: String,
}
