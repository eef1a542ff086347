//! Question-answering pipeline orchestrator.
//!
//! [`DocumentQa`] is the boundary of the library. It coordinates ingestion
//! (extract → chunk → embed → store) and queries (embed → search → threshold
//! → confidence → answer) over the components it is built from.
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_rag::{DocumentQa, InMemoryVectorIndex, RagConfig};
//!
//! let qa = DocumentQa::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(embedder))
//!     .vector_index(Arc::new(InMemoryVectorIndex::new()))
//!     .language_model(Arc::new(model))
//!     .build()?;
//!
//! qa.ingest(&pdf_bytes, "handbook.pdf").await?;
//! let response = qa.query("How many annual leave days do I get?").await?;
//! println!("{} ({})", response.answer, response.confidence);
//! ```

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info};

use crate::chunking::{Chunker, TokenWindowChunker};
use crate::composer::{AnswerComposer, LOW_RELEVANCE_ANSWER, unanswered};
use crate::confidence::confidence_for;
use crate::config::RagConfig;
use crate::document::{ChatResponse, ExtractedDocument, IndexStats, IngestReport, SearchResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::extract::{PdfExtractor, TextExtractor};
use crate::llm::LanguageModel;
use crate::retriever::{Retrieval, Retriever};
use crate::vectorstore::VectorIndex;

/// The document question-answering assistant.
///
/// Queries may run concurrently. Ingestion and clearing are serialized by an
/// internal writer lock, and a document is written to the index in a single
/// `add` only after all of its chunks were embedded, so a failed ingestion
/// leaves the index unchanged. Construct one via [`DocumentQa::builder()`].
pub struct DocumentQa {
    config: RagConfig,
    extractor: Arc<dyn TextExtractor>,
    chunker: Arc<dyn Chunker>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_index: Arc<dyn VectorIndex>,
    retriever: Retriever,
    composer: AnswerComposer,
    writer: Mutex<()>,
}

impl DocumentQa {
    /// Create a new [`DocumentQaBuilder`].
    pub fn builder() -> DocumentQaBuilder {
        DocumentQaBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the vector index.
    pub fn vector_index(&self) -> &Arc<dyn VectorIndex> {
        &self.vector_index
    }

    /// Extract, chunk, embed and store one uploaded file.
    ///
    /// # Errors
    ///
    /// - [`RagError::Extraction`] if the file cannot be read
    /// - [`RagError::Embedding`] if embedding fails; nothing is written
    /// - [`RagError::Index`] if the index rejects the write
    pub async fn ingest(&self, bytes: &[u8], filename: &str) -> Result<IngestReport> {
        let document = self.extractor.extract(bytes, filename).await.inspect_err(|e| {
            error!(filename, error = %e, "extraction failed during ingestion");
        })?;
        self.ingest_document(&document).await
    }

    /// Chunk, embed and store an already extracted document.
    ///
    /// # Errors
    ///
    /// Same as [`ingest`](Self::ingest), minus extraction.
    pub async fn ingest_document(&self, document: &ExtractedDocument) -> Result<IngestReport> {
        let filename = document.filename.as_str();
        let _writer = self.writer.lock().await;

        let chunks = self.chunker.chunk(document);
        if chunks.is_empty() {
            info!(filename, chunks_added = 0, "ingested document (no text)");
            return Ok(IngestReport { filename: filename.to_string(), chunks_added: 0 });
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let vectors = self.embedding_provider.embed_batch(&texts).await.inspect_err(|e| {
            error!(filename, error = %e, "embedding failed during ingestion");
        })?;
        if vectors.len() != chunks.len() {
            return Err(RagError::Embedding {
                provider: self.embedding_provider.name().to_string(),
                message: format!("expected {} embeddings, received {}", chunks.len(), vectors.len()),
            });
        }

        self.vector_index.add(&chunks, &vectors).await.inspect_err(|e| {
            error!(filename, backend = self.vector_index.name(), error = %e, "index write failed");
        })?;

        info!(
            filename,
            pages = document.pages.len(),
            chunks_added = chunks.len(),
            "ingested document"
        );
        Ok(IngestReport { filename: filename.to_string(), chunks_added: chunks.len() })
    }

    /// Retrieve the chunks that would be used as context for `question`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Embedding`] or [`RagError::Index`] on upstream failure.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<SearchResult>> {
        self.retriever.retrieve(question).await
    }

    /// Answer a question from the indexed documents.
    ///
    /// When nothing relevant is found the response carries a fallback answer
    /// with [`Confidence::Low`](crate::Confidence::Low); that is not an error.
    /// An empty index gives [`NOT_FOUND_ANSWER`](crate::NOT_FOUND_ANSWER);
    /// chunks that all score below the threshold give
    /// [`LOW_RELEVANCE_ANSWER`](crate::LOW_RELEVANCE_ANSWER).
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Embedding`], [`RagError::Index`] or
    /// [`RagError::Generation`] on upstream failure.
    pub async fn query(&self, question: &str) -> Result<ChatResponse> {
        let Retrieval { results, candidates } = self.retriever.search(question).await?;
        if results.is_empty() && candidates > 0 {
            info!(candidates, "no candidate passed the similarity threshold");
            return Ok(unanswered(LOW_RELEVANCE_ANSWER));
        }
        let confidence = confidence_for(&self.config, &results);
        let response = self.composer.compose(question, &results, confidence).await?;
        info!(
            context_chunks = response.context_chunks_used,
            confidence = %response.confidence,
            "query completed"
        );
        Ok(response)
    }

    /// Size of the index.
    pub async fn stats(&self) -> Result<IndexStats> {
        self.vector_index.stats().await
    }

    /// Remove every document from the index.
    pub async fn clear(&self) -> Result<()> {
        let _writer = self.writer.lock().await;
        self.vector_index.clear().await.inspect_err(|e| {
            error!(backend = self.vector_index.name(), error = %e, "failed to clear index");
        })?;
        info!(backend = self.vector_index.name(), "cleared index");
        Ok(())
    }
}

/// Builder for constructing a [`DocumentQa`].
///
/// The embedding provider, vector index and language model are required. The
/// config defaults to [`RagConfig::default()`], the extractor to
/// [`PdfExtractor`] and the chunker to a [`TokenWindowChunker`] sized from the
/// config.
#[derive(Default)]
pub struct DocumentQaBuilder {
    config: Option<RagConfig>,
    extractor: Option<Arc<dyn TextExtractor>>,
    chunker: Option<Arc<dyn Chunker>>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_index: Option<Arc<dyn VectorIndex>>,
    language_model: Option<Arc<dyn LanguageModel>>,
}

impl DocumentQaBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the text extractor.
    pub fn extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Set the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector index backend.
    pub fn vector_index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.vector_index = Some(index);
        self
    }

    /// Set the language model used to compose answers.
    pub fn language_model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.language_model = Some(model);
        self
    }

    /// Build the [`DocumentQa`], validating the config and required components.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if a required component is missing or the
    /// config is invalid.
    pub fn build(self) -> Result<DocumentQa> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::Config("embedding_provider is required".to_string()))?;
        let vector_index = self
            .vector_index
            .ok_or_else(|| RagError::Config("vector_index is required".to_string()))?;
        let language_model = self
            .language_model
            .ok_or_else(|| RagError::Config("language_model is required".to_string()))?;
        let extractor = self.extractor.unwrap_or_else(|| Arc::new(PdfExtractor::new()));
        let chunker: Arc<dyn Chunker> = match self.chunker {
            Some(chunker) => chunker,
            None => Arc::new(TokenWindowChunker::from_config(&config)?),
        };

        let retriever = Retriever::new(&config, embedding_provider.clone(), vector_index.clone());
        let composer = AnswerComposer::new(&config, language_model);

        Ok(DocumentQa {
            config,
            extractor,
            chunker,
            embedding_provider,
            vector_index,
            retriever,
            composer,
            writer: Mutex::new(()),
        })
    }
}
