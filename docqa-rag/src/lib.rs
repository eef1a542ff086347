//! # docqa-rag
//!
//! Retrieval-augmented question answering over PDF documents.
//!
//! ## Overview
//!
//! Documents are extracted, split into overlapping token windows, embedded and
//! stored in a vector index. A question is embedded, matched against the index,
//! filtered by a similarity threshold, labelled with a confidence level, and
//! answered by a language model that only sees the retrieved chunks.
//!
//! - [`DocumentQa`] - the ingest / query / stats / clear façade
//! - [`TokenWindowChunker`] - 800-token windows with 200 tokens of overlap
//! - [`InMemoryVectorIndex`] - brute-force cosine index, optionally persisted
//! - [`CachedEmbeddingProvider`] - SHA-256 keyed embedding cache
//! - `OpenAIEmbeddingProvider` / `OpenAIChatModel` - hosted services (feature `openai`)
//! - `QdrantVectorIndex` - Qdrant backend (feature `qdrant`)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docqa_rag::{DocumentQa, InMemoryVectorIndex, OpenAIChatModel, OpenAIEmbeddingProvider};
//!
//! let qa = DocumentQa::builder()
//!     .embedding_provider(Arc::new(OpenAIEmbeddingProvider::from_env()?))
//!     .vector_index(Arc::new(InMemoryVectorIndex::new()))
//!     .language_model(Arc::new(OpenAIChatModel::from_env()?))
//!     .build()?;
//!
//! qa.ingest(&std::fs::read("handbook.pdf")?, "handbook.pdf").await?;
//! let response = qa.query("How many annual leave days?").await?;
//! ```
//!
//! ## Features
//!
//! | Feature  | Enables |
//! |----------|---------|
//! | `openai` | OpenAI embeddings and chat completions (default) |
//! | `qdrant` | Qdrant vector index |
//! | `full`   | Everything |

pub mod cache;
pub mod chunking;
pub mod composer;
pub mod confidence;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod inmemory;
pub mod llm;
pub mod pipeline;
pub mod retriever;
pub mod retry;
pub mod section;
pub mod tokenizer;
pub mod vectorstore;

#[cfg(feature = "openai")]
pub mod openai;
#[cfg(feature = "qdrant")]
pub mod qdrant;

pub use cache::{CacheStats, CachedEmbeddingProvider};
pub use chunking::{Chunker, TokenWindowChunker};
pub use composer::{AnswerComposer, LOW_RELEVANCE_ANSWER, NOT_FOUND_ANSWER};
pub use confidence::score_confidence;
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{
    ChatResponse, Confidence, DocumentChunk, ExtractedDocument, IndexStats, IngestReport,
    PageText, SearchResult, Source,
};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use extract::{PdfExtractor, TextExtractor};
pub use inmemory::InMemoryVectorIndex;
pub use llm::{GenerationRequest, LanguageModel};
pub use pipeline::{DocumentQa, DocumentQaBuilder};
pub use retriever::{Retrieval, Retriever, filter_results};
pub use retry::RetryPolicy;
pub use tokenizer::{Cl100kTokenizer, Tokenizer};
pub use vectorstore::{VectorIndex, cosine_similarity};

#[cfg(feature = "openai")]
pub use openai::{OpenAIChatModel, OpenAIEmbeddingProvider};
#[cfg(feature = "qdrant")]
pub use qdrant::QdrantVectorIndex;
