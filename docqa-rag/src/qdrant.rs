//! Qdrant vector index backend.
//!
//! Provides [`QdrantVectorIndex`] which implements [`VectorIndex`] using
//! the [qdrant-client](https://docs.rs/qdrant-client) crate over gRPC.
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_rag::qdrant::QdrantVectorIndex;
//!
//! let index = QdrantVectorIndex::new("http://localhost:6334", "documents")?;
//! index.add(&chunks, &vectors).await?;
//! let results = index.search(&query_embedding, 10).await?;
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    CountPointsBuilder, CreateCollectionBuilder, Distance, PointStruct, ScrollPointsBuilder,
    SearchPointsBuilder, UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::document::{DocumentChunk, IndexStats, SearchResult};
use crate::error::{RagError, Result};
use crate::vectorstore::{VectorIndex, rank_order};

const BACKEND: &str = "qdrant";
const SCROLL_PAGE: u32 = 256;
/// Extra points fetched beyond `k` so that ties at the cutoff are settled by
/// insertion order rather than by the server.
const TIE_SLACK: usize = 16;

/// How many points to request for a top-`k` search.
fn fetch_limit(k: usize) -> u64 {
    k.saturating_mul(2).max(k.saturating_add(TIE_SLACK)) as u64
}

/// Rank `(score, seq, chunk)` triples and keep the best `k`.
fn top_ranked(mut scored: Vec<(f32, u64, DocumentChunk)>, k: usize) -> Vec<SearchResult> {
    scored.sort_by(|a, b| rank_order((a.0, a.1), (b.0, b.1)));
    scored.truncate(k);
    scored
        .into_iter()
        .map(|(similarity_score, _, chunk)| SearchResult { chunk, similarity_score })
        .collect()
}

/// Default gRPC endpoint of a local Qdrant instance.
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";

/// A [`VectorIndex`] backed by [Qdrant](https://qdrant.tech/).
///
/// All chunks live in one collection with cosine distance, created on the first
/// write with the dimension of the first vector. Chunk fields and an insertion
/// sequence number are stored as payload; the sequence breaks score ties.
pub struct QdrantVectorIndex {
    client: Qdrant,
    collection: String,
    ready: AtomicBool,
    next_seq: Mutex<Option<u64>>,
}

impl QdrantVectorIndex {
    /// Connect to the Qdrant instance at `url` and use `collection`.
    pub fn new(url: &str, collection: impl Into<String>) -> Result<Self> {
        let client = Qdrant::from_url(url).build().map_err(Self::map_err)?;
        Ok(Self::from_client(client, collection))
    }

    /// Wrap an existing client.
    pub fn from_client(client: Qdrant, collection: impl Into<String>) -> Self {
        Self {
            client,
            collection: collection.into(),
            ready: AtomicBool::new(false),
            next_seq: Mutex::new(None),
        }
    }

    /// The collection name.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn map_err(e: qdrant_client::QdrantError) -> RagError {
        RagError::index(BACKEND, e.to_string())
    }

    async fn collection_exists(&self) -> Result<bool> {
        if self.ready.load(Ordering::Acquire) {
            return Ok(true);
        }
        let collections = self.client.list_collections().await.map_err(Self::map_err)?;
        let exists = collections.collections.iter().any(|c| c.name == self.collection);
        if exists {
            self.ready.store(true, Ordering::Release);
        }
        Ok(exists)
    }

    async fn ensure_collection(&self, dimensions: usize) -> Result<()> {
        if self.collection_exists().await? {
            return Ok(());
        }
        self.client
            .create_collection(
                CreateCollectionBuilder::new(self.collection.as_str())
                    .vectors_config(VectorParamsBuilder::new(dimensions as u64, Distance::Cosine)),
            )
            .await
            .map_err(Self::map_err)?;
        self.ready.store(true, Ordering::Release);
        info!(collection = %self.collection, dimensions, "created qdrant collection");
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        let response = self
            .client
            .count(CountPointsBuilder::new(self.collection.as_str()).exact(true))
            .await
            .map_err(Self::map_err)?;
        Ok(response.result.map(|r| r.count).unwrap_or(0))
    }

    fn payload_for(chunk: &DocumentChunk, seq: u64) -> Result<Payload> {
        let value = json!({
            "text": chunk.text,
            "filename": chunk.filename,
            "page_number": chunk.page_number,
            "section": chunk.section,
            "chunk_index": chunk.chunk_index,
            "token_count": chunk.token_count,
            "seq": seq,
        });
        Payload::try_from(value).map_err(Self::map_err)
    }

    fn extract_string(value: &QdrantValue) -> Option<String> {
        match &value.kind {
            Some(Kind::StringValue(s)) => Some(s.clone()),
            _ => None,
        }
    }

    fn extract_u64(value: &QdrantValue) -> Option<u64> {
        match &value.kind {
            Some(Kind::IntegerValue(n)) => u64::try_from(*n).ok(),
            Some(Kind::DoubleValue(n)) if *n >= 0.0 => Some(*n as u64),
            _ => None,
        }
    }

    fn chunk_from_payload(payload: &HashMap<String, QdrantValue>) -> (DocumentChunk, u64) {
        let string = |key: &str| payload.get(key).and_then(Self::extract_string);
        let number = |key: &str| payload.get(key).and_then(Self::extract_u64).unwrap_or(0);
        let chunk = DocumentChunk {
            text: string("text").unwrap_or_default(),
            filename: string("filename").unwrap_or_default(),
            page_number: number("page_number") as u32,
            section: string("section"),
            chunk_index: number("chunk_index") as u32,
            token_count: number("token_count") as u32,
        };
        (chunk, number("seq"))
    }
}

#[async_trait]
impl VectorIndex for QdrantVectorIndex {
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
        self.ensure_collection(vectors[0].len()).await?;

        let mut next_seq = self.next_seq.lock().await;
        let base = match *next_seq {
            Some(seq) => seq,
            None => self.count().await?,
        };

        let points = chunks
            .iter()
            .zip(vectors)
            .enumerate()
            .map(|(i, (chunk, vector))| {
                let payload = Self::payload_for(chunk, base + i as u64)?;
                Ok(PointStruct::new(uuid::Uuid::new_v4().to_string(), vector.clone(), payload))
            })
            .collect::<Result<Vec<PointStruct>>>()?;

        self.client
            .upsert_points(UpsertPointsBuilder::new(self.collection.as_str(), points).wait(true))
            .await
            .map_err(Self::map_err)?;

        *next_seq = Some(base + chunks.len() as u64);
        debug!(collection = %self.collection, count = chunks.len(), "upserted chunks to qdrant");
        Ok(())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        if k == 0 || !self.collection_exists().await? {
            return Ok(Vec::new());
        }
        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(
                    self.collection.as_str(),
                    query.to_vec(),
                    fetch_limit(k),
                )
                .with_payload(true),
            )
            .await
            .map_err(Self::map_err)?;

        let scored: Vec<(f32, u64, DocumentChunk)> = response
            .result
            .into_iter()
            .map(|point| {
                let (chunk, seq) = Self::chunk_from_payload(&point.payload);
                (point.score.clamp(0.0, 1.0), seq, chunk)
            })
            .collect();
        Ok(top_ranked(scored, k))
    }

    async fn clear(&self) -> Result<()> {
        let mut next_seq = self.next_seq.lock().await;
        if self.collection_exists().await? {
            self.client
                .delete_collection(self.collection.as_str())
                .await
                .map_err(Self::map_err)?;
        }
        self.ready.store(false, Ordering::Release);
        *next_seq = Some(0);
        info!(collection = %self.collection, "deleted qdrant collection");
        Ok(())
    }

    async fn stats(&self) -> Result<IndexStats> {
        if !self.collection_exists().await? {
            return Ok(IndexStats::default());
        }
        let total_chunks = self.count().await? as usize;

        let mut documents = HashSet::new();
        let mut offset = None;
        loop {
            let mut request = ScrollPointsBuilder::new(self.collection.as_str())
                .limit(SCROLL_PAGE)
                .with_payload(true)
                .with_vectors(false);
            if let Some(id) = offset.take() {
                request = request.offset(id);
            }
            let page = self.client.scroll(request).await.map_err(Self::map_err)?;
            documents.extend(
                page.result
                    .iter()
                    .filter_map(|point| point.payload.get("filename").and_then(Self::extract_string)),
            );
            match page.next_page_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        Ok(IndexStats { total_chunks, total_documents: documents.len() })
    }
}
