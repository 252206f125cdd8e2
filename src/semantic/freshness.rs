//! Decides whether a note's cached embedding can be reused.
//!
//! Staleness is derived on every call from the vector and the two
//! timestamps; nothing is cached between searches.

use serde::{Deserialize, Serialize};

use crate::semantic::types::NoteSearchRecord;

/// Why a cached embedding has to be recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaleReason {
    /// Never embedded.
    NoEmbedding,
    /// Vector present but of the wrong length.
    Corrupted,
    /// Vector present but one of the timestamps is unknown.
    MissingTimestamp,
    /// Content changed after the vector was generated.
    ContentUpdated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale(StaleReason),
}

impl Freshness {
    pub fn needs_regeneration(&self) -> bool {
        matches!(self, Freshness::Stale(_))
    }

    pub fn reason(&self) -> Option<StaleReason> {
        match self {
            Freshness::Fresh => None,
            Freshness::Stale(reason) => Some(*reason),
        }
    }
}

/// Classify a record against the expected embedding `dimensions`.
pub fn classify(record: &NoteSearchRecord, dimensions: usize) -> Freshness {
    let Some(embedding) = &record.embedding else {
        return Freshness::Stale(StaleReason::NoEmbedding);
    };

    if embedding.len() != dimensions {
        return Freshness::Stale(StaleReason::Corrupted);
    }

    let (Some(generated_at), Some(modified_at)) =
        (record.embedding_generated_at, record.content_modified_at)
    else {
        return Freshness::Stale(StaleReason::MissingTimestamp);
    };

    if generated_at < modified_at {
        return Freshness::Stale(StaleReason::ContentUpdated);
    }

    Freshness::Fresh
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    const DIMS: usize = 1536;

    fn fresh_record() -> NoteSearchRecord {
        let modified = Utc::now() - Duration::hours(2);
        NoteSearchRecord {
            id: "n1".to_string(),
            title: "Note".to_string(),
            embedding: Some(vec![0.1; DIMS]),
            embedding_generated_at: Some(modified + Duration::minutes(5)),
            content_modified_at: Some(modified),
            ..Default::default()
        }
    }

    #[test]
    fn test_fresh() {
        let freshness = classify(&fresh_record(), DIMS);
        assert_eq!(freshness, Freshness::Fresh);
        assert!(!freshness.needs_regeneration());
        assert!(freshness.reason().is_none());
    }

    #[test]
    fn test_equal_timestamps_are_fresh() {
        let mut record = fresh_record();
        record.embedding_generated_at = record.content_modified_at;
        assert_eq!(classify(&record, DIMS), Freshness::Fresh);
    }

    #[test]
    fn test_no_embedding() {
        let mut record = fresh_record();
        record.embedding = None;
        assert_eq!(classify(&record, DIMS).reason(), Some(StaleReason::NoEmbedding));
    }

    #[test]
    fn test_corrupted_regardless_of_timestamps() {
        let mut record = fresh_record();
        record.embedding = Some(vec![0.1; 10]);
        assert_eq!(classify(&record, DIMS).reason(), Some(StaleReason::Corrupted));

        record.embedding_generated_at = None;
        record.content_modified_at = None;
        assert_eq!(classify(&record, DIMS).reason(), Some(StaleReason::Corrupted));
    }

    #[test]
    fn test_missing_generated_at() {
        let mut record = fresh_record();
        record.embedding_generated_at = None;
        assert_eq!(
            classify(&record, DIMS).reason(),
            Some(StaleReason::MissingTimestamp)
        );
    }

    #[test]
    fn test_missing_modified_at() {
        let mut record = fresh_record();
        record.content_modified_at = None;
        assert_eq!(
            classify(&record, DIMS).reason(),
            Some(StaleReason::MissingTimestamp)
        );
    }

    #[test]
    fn test_content_updated() {
        let mut record = fresh_record();
        let generated = Utc::now() - Duration::hours(1);
        record.embedding_generated_at = Some(generated);
        record.content_modified_at = Some(generated + Duration::seconds(1));
        assert_eq!(
            classify(&record, DIMS).reason(),
            Some(StaleReason::ContentUpdated)
        );
    }

    #[test]
    fn test_totality() {
        // every combination yields either Fresh or exactly one reason
        let now = Utc::now();
        let vectors = [None, Some(vec![0.0; 3]), Some(vec![0.0; DIMS])];
        let stamps = [None, Some(now), Some(now - Duration::hours(1))];

        for vector in &vectors {
            for generated in &stamps {
                for modified in &stamps {
                    let record = NoteSearchRecord {
                        embedding: vector.clone(),
                        embedding_generated_at: *generated,
                        content_modified_at: *modified,
                        ..Default::default()
                    };
                    let freshness = classify(&record, DIMS);
                    assert_eq!(freshness.needs_regeneration(), freshness.reason().is_some());
                }
            }
        }
    }

    #[test]
    fn test_reason_serializes_snake_case() {
        let json = serde_json::to_string(&StaleReason::ContentUpdated).unwrap();
        assert_eq!(json, "\"content_updated\"");
    }
}
