//! # Embeddings
//!
//! This crate provides embedding generation and nearest-neighbor search
//! for the question similarity engine.
//!
//! ## Features
//!
//! - **Embedding Generation**: Convert text to dense vectors via a provider
//! - **Flat Index**: Exact inner-product search over normalized vectors
//! - **Multiple Providers**: OpenAI-compatible APIs and an offline hashing model
//! - **Caching**: Bounded caching of computed embeddings
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings System                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EmbeddingProvider ──► Embedding ──► FlatIndex                  │
//! │       │                    │              │                     │
//! │       ▼                    ▼              ▼                     │
//! │  OpenAI/Hashing      normalize()     IndexHit                   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod error;
pub mod index;
pub mod provider;
pub mod similarity;

pub use cache::{CachedProvider, EmbeddingCache};
pub use error::{EmbeddingError, Result};
pub use index::{FlatIndex, IndexHit};
pub use provider::{
    EmbeddingProvider, EmbeddingRequest, EmbeddingResponse, HashingProvider, OpenAIProvider,
};
pub use similarity::{cosine_similarity, dot_product, normalize};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;

/// Dimension of embeddings produced by the offline hashing provider.
pub const DEFAULT_DIMENSION: usize = 384;
