use crate::{
    app::errors::AppError,
    notes::NoteStore,
    semantic::{
        classify, EmbeddingProvider, PendingEmbedding, SearchOptions, SearchResponse,
        SemanticSearchService, StaleReason,
    },
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// What to do with the embeddings a search regenerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistMode {
    /// Store them before returning; a failure is logged, not returned.
    Await,
    /// Store them on a blocking task and return right away.
    Detach,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreshnessReport {
    pub id: String,
    pub title: String,
    pub needs_regeneration: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<StaleReason>,
}

/// Glue between the note store and the semantic search service.
pub struct NotesApp<P> {
    store: Arc<dyn NoteStore>,
    engine: Arc<SemanticSearchService<P>>,
    defaults: SearchOptions,
}

impl<P> Clone for NotesApp<P> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            engine: self.engine.clone(),
            defaults: self.defaults,
        }
    }
}

impl<P: EmbeddingProvider + 'static> NotesApp<P> {
    pub fn new(
        store: Arc<dyn NoteStore>,
        engine: SemanticSearchService<P>,
        defaults: SearchOptions,
    ) -> Self {
        Self {
            store,
            engine: Arc::new(engine),
            defaults,
        }
    }

    #[cfg(test)]
    pub fn engine(&self) -> &SemanticSearchService<P> {
        &self.engine
    }

    /// Apply per-call overrides on top of the configured defaults.
    pub fn options_with(
        &self,
        min_similarity: Option<f32>,
        max_results: Option<usize>,
        regenerate_stale: Option<bool>,
    ) -> Result<SearchOptions, AppError> {
        let mut options = self.defaults;

        if let Some(min_similarity) = min_similarity {
            if !(0.0..=1.0).contains(&min_similarity) {
                return Err(AppError::InvalidOptions(format!(
                    "min_similarity must be between 0.0 and 1.0, got {min_similarity}"
                )));
            }
            options.min_similarity = min_similarity;
        }

        if let Some(max_results) = max_results {
            if max_results == 0 {
                return Err(AppError::InvalidOptions(
                    "max_results must be greater than 0".to_string(),
                ));
            }
            options.max_results = max_results;
        }

        if let Some(regenerate_stale) = regenerate_stale {
            options.regenerate_stale = regenerate_stale;
        }

        Ok(options)
    }

    /// Run a search over the stored notes, optionally limited to a folder.
    ///
    /// Each call works on its own copy of the notes, so concurrent searches
    /// never share records.
    pub async fn search(
        &self,
        query: &str,
        folder_id: Option<&str>,
        options: SearchOptions,
        persist: PersistMode,
    ) -> Result<SearchResponse, AppError> {
        let mut notes = self.store.list(folder_id)?;

        let response = self.engine.search(query, &mut notes, &options).await?;

        match persist {
            PersistMode::Await => {
                if let Err(err) = self.persist(&response.pending_persistence) {
                    log::error!("failed to persist embeddings: {err:?}");
                }
            }
            PersistMode::Detach => {
                self.persist_in_background(response.pending_persistence.clone());
            }
        }

        Ok(response)
    }

    /// Store regenerated embeddings now.
    pub fn persist(&self, pending: &[PendingEmbedding]) -> anyhow::Result<usize> {
        let updated = self.store.save_embeddings(pending)?;
        if updated > 0 {
            log::info!("persisted {updated} embeddings");
        }
        Ok(updated)
    }

    /// Store regenerated embeddings on a blocking task. Failures are only
    /// logged; the next search re-classifies those notes as stale.
    pub fn persist_in_background(&self, pending: Vec<PendingEmbedding>) -> Option<JoinHandle<()>> {
        if pending.is_empty() {
            return None;
        }

        let store = self.store.clone();
        Some(tokio::task::spawn_blocking(move || {
            match store.save_embeddings(&pending) {
                Ok(updated) => log::info!("persisted {updated} embeddings in background"),
                Err(err) => log::error!("background embedding persistence failed: {err:?}"),
            }
        }))
    }

    /// Freshness of every stored note, without calling the embedding API.
    pub fn status(&self, folder_id: Option<&str>) -> Result<Vec<FreshnessReport>, AppError> {
        status(self.store.as_ref(), folder_id, self.engine.dimensions())
    }
}

/// Freshness of the notes in `store` against the expected vector length.
pub fn status(
    store: &dyn NoteStore,
    folder_id: Option<&str>,
    dimensions: usize,
) -> Result<Vec<FreshnessReport>, AppError> {
    let notes = store.list(folder_id)?;

    Ok(notes
        .iter()
        .map(|note| {
            let freshness = classify(note, dimensions);
            FreshnessReport {
                id: note.id.clone(),
                title: note.title.clone(),
                needs_regeneration: freshness.needs_regeneration(),
                reason: freshness.reason(),
            }
        })
        .collect())
}
