//! Vector index trait for storing chunk embeddings and searching them.

use std::cmp::Ordering;

use async_trait::async_trait;

use crate::document::{DocumentChunk, IndexStats, SearchResult};
use crate::error::Result;

/// A storage backend for chunk embeddings with cosine-similarity search.
///
/// Backends are selected at startup and used through this narrow interface.
/// Writes (`add`, `clear`) are serialized by the caller; searches may run
/// concurrently with each other.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{InMemoryVectorIndex, VectorIndex};
///
/// let index = InMemoryVectorIndex::new();
/// index.add(&chunks, &vectors).await?;
/// let results = index.search(&query_vector, 10).await?;
/// ```
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Short backend label used in logs and errors.
    fn name(&self) -> &str;

    /// Store `chunks[i]` with `vectors[i]`. The slices must have equal length.
    ///
    /// Identical content may be added more than once; no deduplication is done.
    async fn add(&self, chunks: &[DocumentChunk], vectors: &[Vec<f32>]) -> Result<()>;

    /// Return up to `k` stored chunks nearest to `query`.
    ///
    /// Results are ordered by descending similarity; equal scores keep
    /// insertion order.
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>>;

    /// Remove every stored chunk.
    async fn clear(&self) -> Result<()>;

    /// Count stored chunks and distinct source documents.
    async fn stats(&self) -> Result<IndexStats>;
}

/// Cosine similarity clamped into `[0, 1]`.
///
/// Returns 0.0 if either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
}

/// Sort `(score, sequence)` pairs by descending score, then ascending sequence.
pub(crate) fn rank_order(a: (f32, u64), b: (f32, u64)) -> Ordering {
    b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal).then(a.1.cmp(&b.1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_parallel_and_orthogonal_vectors() {
        assert!((cosine_similarity(&[1.0, 2.0], &[2.0, 4.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let mut ranked = vec![(0.5, 3), (0.9, 2), (0.5, 1)];
        ranked.sort_by(|a, b| rank_order(*a, *b));
        assert_eq!(ranked, vec![(0.9, 2), (0.5, 1), (0.5, 3)]);
    }
}
