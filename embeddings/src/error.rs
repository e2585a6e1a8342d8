//! Error types for the embeddings system.

use thiserror::Error;

/// Result type alias for embedding operations.
pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Errors that can occur in the embeddings system.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// Provider not configured.
    #[error("embedding provider not configured")]
    ProviderNotConfigured,

    /// API request failed.
    #[error("API request failed: {0}")]
    ApiRequest(String),

    /// Invalid response from provider.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Provider did not answer within the deadline.
    #[error("embedding request timed out after {millis}ms")]
    Timeout { millis: u64 },

    /// Dimension mismatch.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Search against an index holding no vectors.
    #[error("index holds no vectors")]
    EmptyIndex,

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl EmbeddingError {
    /// Whether this error means the provider could not produce vectors,
    /// as opposed to a caller mistake such as a dimension mismatch.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::ProviderNotConfigured
                | Self::ApiRequest(_)
                | Self::InvalidResponse(_)
                | Self::RateLimited { .. }
                | Self::Timeout { .. }
                | Self::Serialization(_)
                | Self::Http(_)
        )
    }
}
