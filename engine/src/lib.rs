//! # Similarity Engine
//!
//! This crate checks a newly written question against a fixed corpus of
//! recorded questions. It returns the corpus entries that are semantically
//! close and separately reports whether the question already exists.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Similarity Engine                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐   texts    ┌──────────────┐                  │
//! │  │ CorpusStore  │ ─────────► │   Embedder   │                  │
//! │  └──────────────┘            └──────────────┘                  │
//! │         │                           │ vectors                   │
//! │         ▼                           ▼                           │
//! │  ┌─────────────────────────────────────────┐                   │
//! │  │     CorpusSnapshot (store + FlatIndex)  │                   │
//! │  └─────────────────────────────────────────┘                   │
//! │                          │                                      │
//! │                          ▼                                      │
//! │  ┌──────────────┐  ┌──────────────┐                            │
//! │  │  Overfetch + │──│  ExactMatch  │                            │
//! │  │  threshold   │  │  Detector    │                            │
//! │  └──────────────┘  └──────────────┘                            │
//! │                          │                                      │
//! │                          ▼                                      │
//! │                    QueryResult                                  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use qsim_engine::{EngineConfig, FindOptions, SimilarityEngine};
//!
//! let engine = SimilarityEngine::builder()
//!     .with_config(EngineConfig::new("question.json"))
//!     .build()
//!     .await;
//!
//! let result = engine.find_similar("What is 2+2?", FindOptions::default()).await;
//! if result.exact_match_found {
//!     println!("duplicate of {:?}", result.exact_match_id);
//! }
//! ```

pub mod config;
pub mod corpus;
pub mod embedder;
pub mod engine;
pub mod error;
pub mod exact;
pub mod snapshot;

pub use config::{EmbeddingConfig, EmbeddingProviderType, EngineConfig, SearchConfig};
pub use corpus::{CorpusStore, Record, UNKNOWN};
pub use embedder::{Embedder, provider_from_config};
pub use engine::{
    DegradedReason, EngineStats, FindOptions, QueryResult, SimilarityEngine,
    SimilarityEngineBuilder, SimilarityMatch,
};
pub use error::{EngineError, Result};
pub use exact::{ExactMatchDetector, MatchTier, QueryMatcher, normalize_text};
pub use snapshot::CorpusSnapshot;

// Re-export from dependencies for convenience
pub use qsim_embeddings::{EmbeddingProvider, HashingProvider, OpenAIProvider};
