//! Semantic search service for note similarity search.
//!
//! Coordinates one search call:
//! - Classifies every note's cached embedding as fresh or stale
//! - Regenerates stale embeddings in bounded-concurrency batches
//! - Embeds the query and ranks notes by cosine similarity
//! - Reports timings, API usage and the vectors the caller must persist

use std::time::Instant;

use chrono::Utc;

use crate::config::SemanticSearchConfig;
use crate::semantic::embeddings::{EmbeddingClient, EmbeddingError, EmbeddingProvider};
use crate::semantic::freshness::{classify, Freshness};
use crate::semantic::index::{rank, IndexError, MAX_SEARCH_RESULTS, SIMILARITY_THRESHOLD};
use crate::semantic::preprocess::prepare_for_embedding;
use crate::semantic::types::{
    NoteSearchRecord, NoteSummary, PendingEmbedding, SearchResponse, SearchResult,
    SearchStatistics,
};
use crate::semantic::DEFAULT_CONCURRENCY;

/// Errors that can occur during semantic search operations.
#[derive(Debug, thiserror::Error)]
pub enum SemanticSearchError {
    #[error("search query must not be empty")]
    InvalidQuery,

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),
}

/// Per-call search options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchOptions {
    /// Minimum similarity score [0.0, 1.0]
    pub min_similarity: f32,
    pub max_results: usize,
    /// When false, stale notes are left out of this round instead of being
    /// re-embedded.
    pub regenerate_stale: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            min_similarity: SIMILARITY_THRESHOLD,
            max_results: MAX_SEARCH_RESULTS,
            regenerate_stale: true,
        }
    }
}

impl SearchOptions {
    pub fn from_config(config: &SemanticSearchConfig) -> Self {
        Self {
            min_similarity: config.default_threshold,
            max_results: config.max_results,
            regenerate_stale: true,
        }
    }
}

/// Service for performing semantic search over notes.
pub struct SemanticSearchService<P> {
    client: EmbeddingClient<P>,
    batch_concurrency: usize,
}

impl<P: EmbeddingProvider> SemanticSearchService<P> {
    pub fn new(client: EmbeddingClient<P>) -> Self {
        Self {
            client,
            batch_concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_batch_concurrency(mut self, concurrency: usize) -> Self {
        self.batch_concurrency = concurrency.max(1);
        self
    }

    pub fn from_config(provider: P, config: &SemanticSearchConfig) -> Self {
        Self::new(EmbeddingClient::from_config(provider, config))
            .with_batch_concurrency(config.batch_concurrency)
    }

    /// Expected embedding dimensions
    pub fn dimensions(&self) -> usize {
        self.client.dimensions()
    }

    /// Search `notes` for `query`.
    ///
    /// `notes` is borrowed mutably for the duration of the call: every note
    /// whose embedding is regenerated gets the new vector and timestamp
    /// assigned in place. The same assignments are listed in
    /// `pending_persistence`; storing them is up to the caller.
    pub async fn search(
        &self,
        query: &str,
        notes: &mut [NoteSearchRecord],
        options: &SearchOptions,
    ) -> Result<SearchResponse, SemanticSearchError> {
        if query.trim().is_empty() {
            return Err(SemanticSearchError::InvalidQuery);
        }

        if notes.is_empty() {
            log::debug!("no notes to search");
            return Ok(SearchResponse::empty(query));
        }

        let start = Instant::now();
        let dimensions = self.dimensions();
        let mut stats = SearchStatistics {
            total_notes_considered: notes.len(),
            ..Default::default()
        };

        // Partition
        let mut reusable = Vec::new();
        let mut to_regenerate = Vec::new();
        let mut skipped = 0;
        for (idx, note) in notes.iter().enumerate() {
            match classify(note, dimensions) {
                Freshness::Fresh => {
                    reusable.push(idx);
                    stats.reused_count += 1;
                }
                Freshness::Stale(reason) if options.regenerate_stale => {
                    log::debug!("note {} needs regeneration: {reason:?}", note.id);
                    to_regenerate.push(idx);
                }
                Freshness::Stale(_) => skipped += 1,
            }
        }

        log::info!(
            "partitioned notes={} fresh={} stale={} skipped={}",
            notes.len(),
            reusable.len(),
            to_regenerate.len(),
            skipped
        );

        // Regenerate
        let embedding_start = Instant::now();
        let mut regenerated = Vec::new();
        let mut pending_persistence = Vec::new();
        if !to_regenerate.is_empty() {
            let max_length = self.client.max_input_length();
            let texts: Vec<String> = to_regenerate
                .iter()
                .map(|&idx| {
                    let note = &notes[idx];
                    prepare_for_embedding(&note.title, &note.body, &note.tags, max_length)
                })
                .collect();

            let batch = self.client.embed_batch(&texts, self.batch_concurrency).await;
            let generated_at = Utc::now();

            stats.embedding_api_call_count += batch.request_count;
            stats.tokens_consumed += batch.total_tokens;
            stats.regeneration_failures += batch.failure_count;

            for (&idx, vector) in to_regenerate.iter().zip(batch.vectors) {
                let Some(vector) = vector else {
                    continue;
                };

                let note = &mut notes[idx];
                note.embedding = Some(vector.clone());
                note.embedding_generated_at = Some(generated_at);

                pending_persistence.push(PendingEmbedding {
                    id: note.id.clone(),
                    embedding: vector,
                    embedding_generated_at: generated_at,
                });
                regenerated.push(idx);
                stats.regenerated_count += 1;
            }

            if batch.failure_count > 0 {
                log::warn!(
                    "{} of {} embeddings failed to regenerate",
                    batch.failure_count,
                    texts.len()
                );
            }
        }

        // Embed query
        let query_embedding = self.client.embed_one(query).await?;
        stats.embedding_api_call_count += 1;
        stats.tokens_consumed += u64::from(query_embedding.token_count.unwrap_or(0));
        stats.embedding_phase_duration_ms = embedding_start.elapsed().as_millis() as u64;

        // Rank
        let similarity_start = Instant::now();
        let mut candidates = reusable;
        candidates.extend(regenerated);
        let notes = &*notes;
        let ranked = rank(
            &query_embedding.vector,
            candidates.into_iter().filter_map(|idx| {
                notes[idx]
                    .embedding
                    .as_deref()
                    .map(|vector| (idx, vector))
            }),
            options.min_similarity,
            options.max_results,
        )?;
        stats.similarity_phase_duration_ms = similarity_start.elapsed().as_millis() as u64;

        // Assemble
        let results = ranked
            .into_iter()
            .map(|m| SearchResult {
                note: NoteSummary::from(&notes[m.key]),
                similarity: m.similarity,
            })
            .collect::<Vec<_>>();

        stats.total_duration_ms = start.elapsed().as_millis() as u64;

        log::info!(
            "search results={} regenerated={} reused={} api_calls={} tokens={} total={}ms embedding={}ms similarity={}ms",
            results.len(),
            stats.regenerated_count,
            stats.reused_count,
            stats.embedding_api_call_count,
            stats.tokens_consumed,
            stats.total_duration_ms,
            stats.embedding_phase_duration_ms,
            stats.similarity_phase_duration_ms
        );

        Ok(SearchResponse {
            results,
            stats,
            query: query.to_string(),
            executed_at: Utc::now(),
            pending_persistence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::embeddings::{ProviderEmbedding, ProviderError};

    struct UnreachableProvider;

    impl EmbeddingProvider for UnreachableProvider {
        async fn embed(&self, _input: &str) -> Result<ProviderEmbedding, ProviderError> {
            Err(ProviderError::Status {
                status: 500,
                body: "should not be called".to_string(),
            })
        }
    }

    fn service() -> SemanticSearchService<UnreachableProvider> {
        SemanticSearchService::from_config(UnreachableProvider, &SemanticSearchConfig::default())
    }

    #[test]
    fn test_default_options() {
        let options = SearchOptions::default();
        assert!((options.min_similarity - 0.3).abs() < f32::EPSILON);
        assert_eq!(options.max_results, 20);
        assert!(options.regenerate_stale);
    }

    #[test]
    fn test_options_from_config() {
        let config = SemanticSearchConfig {
            default_threshold: 0.5,
            max_results: 7,
            ..Default::default()
        };
        let options = SearchOptions::from_config(&config);
        assert!((options.min_similarity - 0.5).abs() < f32::EPSILON);
        assert_eq!(options.max_results, 7);
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let mut notes = vec![NoteSearchRecord::default()];
        let result = service().search("   ", &mut notes, &SearchOptions::default()).await;
        assert!(matches!(result, Err(SemanticSearchError::InvalidQuery)));
    }

    #[tokio::test]
    async fn test_empty_notes_short_circuits() {
        let response = service()
            .search("anything", &mut [], &SearchOptions::default())
            .await
            .unwrap();

        assert!(response.results.is_empty());
        assert!(response.pending_persistence.is_empty());
        assert_eq!(response.stats, SearchStatistics::default());
        assert_eq!(response.query, "anything");
    }

    #[tokio::test]
    async fn test_query_failure_is_fatal() {
        let mut notes = vec![NoteSearchRecord {
            id: "a".to_string(),
            title: "A".to_string(),
            ..Default::default()
        }];
        let options = SearchOptions {
            regenerate_stale: false,
            ..Default::default()
        };
        let result = service().search("query", &mut notes, &options).await;
        assert!(matches!(result, Err(SemanticSearchError::Embedding(_))));
    }
}
