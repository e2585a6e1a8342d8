//! Aligned corpus and vector index pair.

use qsim_embeddings::FlatIndex;
use tracing::info;

use crate::corpus::{CorpusStore, Record};
use crate::embedder::Embedder;
use crate::error::{EngineError, Result};

/// A corpus together with the index built from it.
///
/// Position `n` in the index is the `n`th record of the store. The pair is
/// only ever built together and never mutated afterwards.
#[derive(Debug, Default)]
pub struct CorpusSnapshot {
    store: CorpusStore,
    index: FlatIndex,
}

impl CorpusSnapshot {
    /// A snapshot with no records.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Embed every question in the store and index the vectors.
    pub async fn build(store: CorpusStore, embedder: &Embedder) -> Result<Self> {
        if store.is_empty() {
            info!("No questions to index");
            return Ok(Self::empty());
        }

        info!(
            "Generating embeddings for {} questions with provider {}",
            store.len(),
            embedder.provider_name()
        );
        let vectors = embedder.embed_all(&store.questions()).await?;
        let index = FlatIndex::build(&vectors)?;

        if index.len() != store.len() {
            return Err(EngineError::Misaligned {
                records: store.len(),
                vectors: index.len(),
            });
        }

        Ok(Self { store, index })
    }

    /// The record at an index position.
    pub fn record(&self, position: usize) -> Option<&Record> {
        self.store.get(position)
    }

    /// The corpus side of the pair.
    pub fn store(&self) -> &CorpusStore {
        &self.store
    }

    /// The index side of the pair.
    pub fn index(&self) -> &FlatIndex {
        &self.index
    }

    /// Number of searchable records.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Check if nothing is searchable.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}
