//! Error types for the similarity engine.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur while loading, building or searching.
///
/// None of these reach callers of `find_similar`; they are mapped to a
/// degraded `QueryResult` at that boundary.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Corpus source missing or not a JSON array.
    #[error("failed to load corpus from {}: {message}", path.display())]
    CorpusLoad { path: PathBuf, message: String },

    /// A single corpus entry could not be turned into a record.
    #[error("malformed record at source index {index}: {reason}")]
    MalformedRecord { index: usize, reason: String },

    /// Embedding error.
    #[error("embedding error: {0}")]
    Embedding(#[from] qsim_embeddings::EmbeddingError),

    /// Vector count does not match record count.
    #[error("index holds {vectors} vectors for {records} records")]
    Misaligned { records: usize, vectors: usize },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parse error.
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
