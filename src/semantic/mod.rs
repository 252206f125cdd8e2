//! Semantic search over notes.
//!
//! Embeddings are maintained lazily: each search checks every note's cached
//! vector, re-embeds the stale ones through a remote embedding API and ranks
//! notes by cosine similarity to the query.
//!
//! # Architecture
//!
//! - `preprocess`: Markup stripping and embedding input composition
//! - `retry`: Exponential backoff for transient API failures
//! - `embeddings`: Embedding client and the HTTP provider
//! - `freshness`: Decides whether a cached vector can be reused
//! - `index`: Cosine similarity ranking
//! - `service`: High-level semantic search service

pub mod embeddings;
mod freshness;
mod index;
mod preprocess;
mod retry;
mod service;
mod types;

pub use embeddings::{
    EmbeddingError, EmbeddingProvider, OpenAiEmbeddings, DEFAULT_CONCURRENCY,
    EMBEDDING_DIMENSIONS, EMBEDDING_MAX_LENGTH, REQUEST_TIMEOUT_SECS,
};
pub use freshness::{classify, StaleReason};
pub use index::{MAX_SEARCH_RESULTS, SIMILARITY_THRESHOLD};
pub use retry::{BASE_DELAY_MS, MAX_RETRIES};
pub use service::{SearchOptions, SemanticSearchError, SemanticSearchService};
pub use types::{NoteSearchRecord, PendingEmbedding, SearchResponse};

/// Default embedding model name
pub const DEFAULT_MODEL: &str = "text-embedding-3-small";
