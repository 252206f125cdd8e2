//! Cosine similarity ranking of candidate vectors against a query.

/// Default similarity threshold for semantic search
pub const SIMILARITY_THRESHOLD: f32 = 0.3;

/// Default cap on returned results
pub const MAX_SEARCH_RESULTS: usize = 20;

/// A ranked candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedMatch<K> {
    /// Caller-supplied key (note id, slice index, ...)
    pub key: K,
    /// Cosine similarity score (0.0 to 1.0)
    pub similarity: f32,
}

/// Errors that can occur during ranking.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum IndexError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Cosine similarity between two vectors, clamped to `[0, 1]`.
///
/// A zero vector on either side yields 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, IndexError> {
    if a.len() != b.len() {
        return Err(IndexError::DimensionMismatch {
            expected: a.len(),
            got: b.len(),
        });
    }

    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);
    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    Ok((dot_product / (norm_a * norm_b)).clamp(0.0, 1.0))
}

/// Score every candidate against `query`, drop those under
/// `min_similarity`, and return the best `max_results` (highest first).
///
/// The sort is stable so equal scores keep their input order.
pub fn rank<'a, K, I>(
    query: &[f32],
    candidates: I,
    min_similarity: f32,
    max_results: usize,
) -> Result<Vec<RankedMatch<K>>, IndexError>
where
    I: IntoIterator<Item = (K, &'a [f32])>,
{
    let mut results = Vec::new();
    for (key, vector) in candidates {
        let similarity = cosine_similarity(query, vector)?;
        if similarity >= min_similarity {
            results.push(RankedMatch { key, similarity });
        }
    }

    // Sort by score descending
    results.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    // Apply limit
    results.truncate(max_results);

    Ok(results)
}

/// Compute L2 norm of a vector.
fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}
