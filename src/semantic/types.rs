use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A note as seen by the search engine.
///
/// `embedding` is `None` until the note is first embedded. A vector of the
/// wrong length is treated as corrupted and regenerated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteSearchRecord {
    pub id: String,
    pub title: String,
    /// Rich-text body, may contain HTML-like markup.
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub folder_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub embedding_generated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub content_modified_at: Option<DateTime<Utc>>,
}

/// Display projection of a note returned with search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteSummary {
    pub id: String,
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
    pub folder_id: Option<String>,
    pub content_modified_at: Option<DateTime<Utc>>,
}

impl From<&NoteSearchRecord> for NoteSummary {
    fn from(record: &NoteSearchRecord) -> Self {
        Self {
            id: record.id.clone(),
            title: record.title.clone(),
            body: record.body.clone(),
            tags: record.tags.clone(),
            folder_id: record.folder_id.clone(),
            content_modified_at: record.content_modified_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub note: NoteSummary,
    /// Cosine similarity score (0.0 to 1.0)
    pub similarity: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStatistics {
    pub total_notes_considered: usize,
    pub regenerated_count: usize,
    pub reused_count: usize,
    /// Notes whose regeneration failed this round; they are left out of
    /// ranking and persistence.
    pub regeneration_failures: usize,
    pub total_duration_ms: u64,
    pub embedding_phase_duration_ms: u64,
    pub similarity_phase_duration_ms: u64,
    pub embedding_api_call_count: usize,
    pub tokens_consumed: u64,
}

/// A freshly computed vector the caller should store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingEmbedding {
    pub id: String,
    pub embedding: Vec<f32>,
    pub embedding_generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Ordered by similarity, highest first.
    pub results: Vec<SearchResult>,
    pub stats: SearchStatistics,
    pub query: String,
    pub executed_at: DateTime<Utc>,
    /// Exactly the notes regenerated during this call. Persisting them is
    /// the caller's job; the engine never writes to storage.
    pub pending_persistence: Vec<PendingEmbedding>,
}

impl SearchResponse {
    /// Response for a search over zero notes.
    pub fn empty(query: &str) -> Self {
        Self {
            results: vec![],
            stats: SearchStatistics::default(),
            query: query.to_string(),
            executed_at: Utc::now(),
            pending_persistence: vec![],
        }
    }
}
