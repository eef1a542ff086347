//! In-memory vector index using brute-force cosine similarity.
//!
//! This module provides [`InMemoryVectorIndex`], a `Vec` of stored chunks
//! protected by a `tokio::sync::RwLock`. It is suitable for development,
//! testing, and the small document sets a single team uploads. With
//! [`InMemoryVectorIndex::persistent`] the contents are mirrored to a JSON
//! snapshot so separate CLI invocations share one index.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::document::{DocumentChunk, IndexStats, SearchResult};
use crate::error::{RagError, Result};
use crate::vectorstore::{VectorIndex, cosine_similarity, rank_order};

const BACKEND: &str = "InMemory";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredChunk {
    /// Insertion sequence number, the tie-breaker for equal scores.
    seq: u64,
    chunk: DocumentChunk,
    vector: Vec<f32>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    next_seq: u64,
    entries: Vec<StoredChunk>,
}

/// An in-memory vector index using cosine similarity for search.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{InMemoryVectorIndex, VectorIndex};
///
/// let index = InMemoryVectorIndex::persistent("vector_db/index.json").await?;
/// println!("{:?}", index.stats().await?);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryVectorIndex {
    state: RwLock<Snapshot>,
    path: Option<PathBuf>,
}

impl InMemoryVectorIndex {
    /// Create a new empty, non-persistent index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an index mirrored to the JSON snapshot at `path`.
    ///
    /// A missing file yields an empty index; the file is created on the first write.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Index`] if the file exists but cannot be read or parsed.
    pub async fn persistent(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let snapshot = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<Snapshot>(&bytes).map_err(|e| {
                RagError::index(BACKEND, format!("corrupt snapshot {}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Snapshot::default(),
            Err(e) => {
                return Err(RagError::index(
                    BACKEND,
                    format!("failed to read snapshot {}: {e}", path.display()),
                ));
            }
        };
        info!(path = %path.display(), chunks = snapshot.entries.len(), "opened vector index snapshot");
        Ok(Self { state: RwLock::new(snapshot), path: Some(path) })
    }

    /// The snapshot path, if the index is persistent.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Write the snapshot to a temporary file and rename it into place.
    async fn persist(&self, snapshot: &Snapshot) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let bytes = serde_json::to_vec(snapshot)
            .map_err(|e| RagError::index(BACKEND, format!("failed to encode snapshot: {e}")))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                RagError::index(BACKEND, format!("failed to create {}: {e}", parent.display()))
            })?;
        }
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes).await.map_err(|e| {
            RagError::index(BACKEND, format!("failed to write {}: {e}", tmp.display()))
        })?;
        tokio::fs::rename(&tmp, path).await.map_err(|e| {
            RagError::index(BACKEND, format!("failed to replace {}: {e}", path.display()))
        })?;
        debug!(path = %path.display(), bytes = bytes.len(), "persisted vector index snapshot");
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    fn name(&self) -> &str {
        BACKEND
    }

    async fn add(&self, chunks: &[DocumentChunk], vectors: &[Vec<f32>]) -> Result<()> {
        if chunks.len() != vectors.len() {
            return Err(RagError::index(
                BACKEND,
                format!("{} chunks but {} vectors", chunks.len(), vectors.len()),
            ));
        }
        if chunks.is_empty() {
            return Ok(());
        }

        let mut state = self.state.write().await;
        let dimension = state.entries.first().map_or(vectors[0].len(), |e| e.vector.len());
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
            return Err(RagError::index(
                BACKEND,
                format!("vector dimension {} does not match index dimension {dimension}", bad.len()),
            ));
        }

        let previous_len = state.entries.len();
        let previous_seq = state.next_seq;
        for (chunk, vector) in chunks.iter().zip(vectors) {
            let seq = state.next_seq;
            state.next_seq += 1;
            state.entries.push(StoredChunk { seq, chunk: chunk.clone(), vector: vector.clone() });
        }

        if let Err(e) = self.persist(&state).await {
            state.entries.truncate(previous_len);
            state.next_seq = previous_seq;
            return Err(e);
        }
        debug!(count = chunks.len(), total = state.entries.len(), "added chunks to in-memory index");
        Ok(())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let state = self.state.read().await;
        if let Some(dimension) = state.entries.first().map(|e| e.vector.len()) {
            if dimension != query.len() {
                return Err(RagError::index(
                    BACKEND,
                    format!(
                        "query dimension {} does not match index dimension {dimension}",
                        query.len()
                    ),
                ));
            }
        }

        let mut scored: Vec<(f32, u64, &DocumentChunk)> = state
            .entries
            .iter()
            .map(|entry| (cosine_similarity(&entry.vector, query), entry.seq, &entry.chunk))
            .collect();

        scored.sort_by(|a, b| rank_order((a.0, a.1), (b.0, b.1)));
        scored.truncate(k);
        Ok(scored
            .into_iter()
            .map(|(similarity_score, _, chunk)| SearchResult { chunk: chunk.clone(), similarity_score })
            .collect())
    }

    async fn clear(&self) -> Result<()> {
        let mut state = self.state.write().await;
        let cleared = std::mem::take(&mut *state);
        if let Err(e) = self.persist(&state).await {
            *state = cleared;
            return Err(e);
        }
        info!(removed = cleared.entries.len(), "cleared in-memory index");
        Ok(())
    }

    async fn stats(&self) -> Result<IndexStats> {
        let state = self.state.read().await;
        let documents: HashSet<&str> =
            state.entries.iter().map(|e| e.chunk.filename.as_str()).collect();
        Ok(IndexStats { total_chunks: state.entries.len(), total_documents: documents.len() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(filename: &str, index: u32) -> DocumentChunk {
        DocumentChunk {
            text: format!("chunk {index}"),
            filename: filename.to_string(),
            page_number: 1,
            section: None,
            chunk_index: index,
            token_count: 2,
        }
    }

    #[tokio::test]
    async fn search_ranks_by_similarity_with_stable_ties() {
        let index = InMemoryVectorIndex::new();
        let chunks = vec![chunk("a.pdf", 0), chunk("a.pdf", 1), chunk("b.pdf", 0)];
        let vectors = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0]];
        index.add(&chunks, &vectors).await.unwrap();

        let results = index.search(&[1.0, 0.0], 10).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].chunk, chunks[0]);
        assert_eq!(results[1].chunk, chunks[2]);
        assert_eq!(results[2].similarity_score, 0.0);

        let top = index.search(&[1.0, 0.0], 1).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].chunk, chunks[0]);
    }

    #[tokio::test]
    async fn rejects_mismatched_input() {
        let index = InMemoryVectorIndex::new();
        let err = index.add(&[chunk("a.pdf", 0)], &[]).await.unwrap_err();
        assert!(matches!(err, RagError::Index { .. }));

        index.add(&[chunk("a.pdf", 0)], &[vec![1.0, 0.0]]).await.unwrap();
        let err = index.add(&[chunk("a.pdf", 1)], &[vec![1.0, 0.0, 0.0]]).await.unwrap_err();
        assert!(err.to_string().contains("dimension"));
        assert_eq!(index.stats().await.unwrap().total_chunks, 1);
    }

    #[tokio::test]
    async fn query_of_another_dimension_is_an_index_error() {
        let index = InMemoryVectorIndex::new();
        assert!(index.search(&[1.0, 0.0, 0.0], 5).await.unwrap().is_empty());

        index.add(&[chunk("a.pdf", 0)], &[vec![1.0, 0.0]]).await.unwrap();
        let err = index.search(&[1.0, 0.0, 0.0], 5).await.unwrap_err();
        assert_eq!(err.kind(), "index_error");
        assert!(err.to_string().contains("query dimension 3"));
        assert_eq!(index.search(&[1.0, 0.0], 5).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stats_count_chunks_and_documents() {
        let index = InMemoryVectorIndex::new();
        let chunks = vec![chunk("a.pdf", 0), chunk("a.pdf", 1), chunk("b.pdf", 0)];
        index.add(&chunks, &[vec![1.0], vec![1.0], vec![1.0]]).await.unwrap();
        assert_eq!(
            index.stats().await.unwrap(),
            IndexStats { total_chunks: 3, total_documents: 2 }
        );

        index.clear().await.unwrap();
        assert_eq!(index.stats().await.unwrap(), IndexStats::default());
        assert!(index.search(&[1.0], 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db").join("index.json");

        let index = InMemoryVectorIndex::persistent(&path).await.unwrap();
        index.add(&[chunk("a.pdf", 0)], &[vec![0.6, 0.8]]).await.unwrap();
        drop(index);

        let reopened = InMemoryVectorIndex::persistent(&path).await.unwrap();
        assert_eq!(reopened.stats().await.unwrap().total_chunks, 1);
        let results = reopened.search(&[0.6, 0.8], 1).await.unwrap();
        assert!((results[0].similarity_score - 1.0).abs() < 1e-6);

        reopened.clear().await.unwrap();
        let cleared = InMemoryVectorIndex::persistent(&path).await.unwrap();
        assert_eq!(cleared.stats().await.unwrap().total_chunks, 0);
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_an_index_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        std::fs::write(&path, b"not json").unwrap();
        let err = InMemoryVectorIndex::persistent(&path).await.unwrap_err();
        assert_eq!(err.kind(), "index_error");
    }
}
