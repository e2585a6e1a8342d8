//! Duplicate detection between a query and a corpus question.
//!
//! Two texts are the same question when their normalized surface forms are
//! equal, or failing that, when the embeddings of those normalized forms
//! are nearly identical.

use qsim_embeddings::{Embedding, Result as EmbedResult, dot_product};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::embedder::Embedder;

/// Collapse whitespace runs to one space, trim, and lowercase.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Which test classified a pair as an exact match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    /// Normalized texts are equal.
    Surface,
    /// Normalized texts embed to near-identical vectors.
    Semantic,
}

/// Two-tier exact-match classifier.
#[derive(Debug, Clone, Copy)]
pub struct ExactMatchDetector {
    threshold: f32,
}

impl ExactMatchDetector {
    /// Similarity at which the semantic tier reports a match.
    pub const DEFAULT_THRESHOLD: f32 = 0.99;

    /// Create a detector with a custom semantic threshold.
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    /// Classify a pair of texts. Symmetric in its arguments.
    ///
    /// Embedding failures in the semantic tier yield `None`.
    pub async fn classify(&self, embedder: &Embedder, a: &str, b: &str) -> Option<MatchTier> {
        self.for_query(embedder, a).classify(b).await
    }

    /// Whether two texts are the same question.
    pub async fn is_exact_match(&self, embedder: &Embedder, a: &str, b: &str) -> bool {
        self.classify(embedder, a, b).await.is_some()
    }

    /// Prepare a matcher that compares one query against many candidates,
    /// embedding the normalized query at most once.
    pub fn for_query<'a>(&self, embedder: &'a Embedder, query: &str) -> QueryMatcher<'a> {
        QueryMatcher {
            embedder,
            threshold: self.threshold,
            normalized: normalize_text(query),
            embedding: OnceCell::new(),
        }
    }
}

impl Default for ExactMatchDetector {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THRESHOLD)
    }
}

/// Exact-match state for one query.
pub struct QueryMatcher<'a> {
    embedder: &'a Embedder,
    threshold: f32,
    normalized: String,
    embedding: OnceCell<Option<Embedding>>,
}

impl QueryMatcher<'_> {
    /// Classify a candidate text against the query.
    pub async fn classify(&self, candidate: &str) -> Option<MatchTier> {
        let candidate = normalize_text(candidate);
        if candidate == self.normalized {
            return Some(MatchTier::Surface);
        }

        match self.semantic_similarity(&candidate).await {
            Ok(Some(similarity)) if similarity >= self.threshold => Some(MatchTier::Semantic),
            Ok(_) => None,
            Err(e) => {
                debug!("Semantic duplicate check unavailable: {e}");
                None
            }
        }
    }

    async fn semantic_similarity(&self, candidate: &str) -> EmbedResult<Option<f32>> {
        let query = self
            .embedding
            .get_or_init(|| async {
                match self.embedder.embed_one(&self.normalized).await {
                    Ok(embedding) => Some(embedding),
                    Err(e) => {
                        debug!("Could not embed normalized query: {e}");
                        None
                    }
                }
            })
            .await;

        let Some(query) = query else {
            return Ok(None);
        };

        let candidate = self.embedder.embed_one(candidate).await?;
        // Both sides come out of the embedder normalized.
        dot_product(query, &candidate).map(Some)
    }
}
