//! Query-time retrieval: embed, search, threshold, truncate.

use std::sync::Arc;

use tracing::{debug, error};

use crate::config::RagConfig;
use crate::document::SearchResult;
use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::vectorstore::VectorIndex;

/// Keep results scoring at least `threshold`, up to `top_k` of them.
///
/// `results` must already be in rank order; the order is preserved.
pub fn filter_results(results: Vec<SearchResult>, threshold: f32, top_k: usize) -> Vec<SearchResult> {
    results.into_iter().filter(|r| r.similarity_score >= threshold).take(top_k).collect()
}

/// The outcome of one retrieval.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Retrieval {
    /// Chunks that passed the threshold, best first.
    pub results: Vec<SearchResult>,
    /// How many candidates the index returned before filtering.
    pub candidates: usize,
}

/// Finds the chunks relevant to a question.
///
/// Over-fetches `search_candidates` results from the index, filters them by
/// `similarity_threshold` (inclusive) and truncates to `top_k`. An empty
/// result means nothing in the index is relevant enough; it is not an error.
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    search_candidates: usize,
    similarity_threshold: f32,
    top_k: usize,
}

impl Retriever {
    /// Create a retriever using the retrieval settings of `config`.
    pub fn new(
        config: &RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            embedder,
            index,
            search_candidates: config.search_candidates,
            similarity_threshold: config.similarity_threshold,
            top_k: config.top_k,
        }
    }

    /// Retrieve the chunks relevant to `question`, best first.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<SearchResult>> {
        Ok(self.search(question).await?.results)
    }

    /// Like [`retrieve`](Self::retrieve), also reporting how many candidates
    /// the threshold rejected them from.
    pub async fn search(&self, question: &str) -> Result<Retrieval> {
        let query_vector = self.embedder.embed(question).await.inspect_err(|e| {
            error!(provider = self.embedder.name(), error = %e, "query embedding failed");
        })?;

        let candidates = self.index.search(&query_vector, self.search_candidates).await.inspect_err(
            |e| error!(backend = self.index.name(), error = %e, "vector search failed"),
        )?;
        let candidate_count = candidates.len();
        let results = filter_results(candidates, self.similarity_threshold, self.top_k);

        debug!(
            candidates = candidate_count,
            passed = results.len(),
            threshold = self.similarity_threshold,
            top_score = results.first().map(|r| r.similarity_score),
            "retrieved context"
        );
        Ok(Retrieval { results, candidates: candidate_count })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentChunk;

    fn result(score: f32) -> SearchResult {
        SearchResult {
            chunk: DocumentChunk {
                text: format!("score {score}"),
                filename: "a.pdf".into(),
                page_number: 1,
                section: None,
                chunk_index: 0,
                token_count: 2,
            },
            similarity_score: score,
        }
    }

    #[test]
    fn threshold_is_inclusive() {
        let kept = filter_results(vec![result(0.9), result(0.70), result(0.699)], 0.70, 5);
        let scores: Vec<f32> = kept.iter().map(|r| r.similarity_score).collect();
        assert_eq!(scores, vec![0.9, 0.70]);
    }

    #[test]
    fn truncates_to_top_k_after_filtering() {
        let results = vec![result(0.95), result(0.5), result(0.9), result(0.85), result(0.8)];
        let kept = filter_results(results, 0.70, 2);
        let scores: Vec<f32> = kept.iter().map(|r| r.similarity_score).collect();
        assert_eq!(scores, vec![0.95, 0.9]);
    }

    #[test]
    fn nothing_relevant_is_empty() {
        assert!(filter_results(vec![result(0.2), result(0.1)], 0.70, 5).is_empty());
        assert!(filter_results(Vec::new(), 0.70, 5).is_empty());
    }
}
