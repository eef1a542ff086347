//! Data types for extracted documents, chunks, search results and answers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The text of a single PDF page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageText {
    /// 1-based page number in the source document.
    pub page_number: u32,
    /// The extracted text of the page.
    pub text: String,
}

/// Page-tagged text extracted from an uploaded document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractedDocument {
    /// The original file name.
    pub filename: String,
    /// Number of pages in the source, including pages without text.
    pub total_pages: u32,
    /// Pages that carry text, in page order.
    pub pages: Vec<PageText>,
}

impl ExtractedDocument {
    /// Build a document from `(page_number, text)` pairs, dropping blank pages.
    pub fn from_pages<I, S>(filename: impl Into<String>, pages: I) -> Self
    where
        I: IntoIterator<Item = (u32, S)>,
        S: Into<String>,
    {
        let pages: Vec<PageText> = pages
            .into_iter()
            .map(|(page_number, text)| PageText { page_number, text: text.into() })
            .collect();
        let total_pages = pages.iter().map(|p| p.page_number).max().unwrap_or(0);
        let pages = pages.into_iter().filter(|p| !p.text.trim().is_empty()).collect();
        Self { filename: filename.into(), total_pages, pages }
    }

    /// Returns `true` if no page carries text.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

/// A bounded, overlapping span of document text: the unit of retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentChunk {
    /// The chunk text, tokens joined by single spaces.
    pub text: String,
    /// The file the chunk came from.
    pub filename: String,
    /// The page on which the chunk starts.
    pub page_number: u32,
    /// Best-effort section heading in effect at the chunk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// 0-based position of the chunk within its document.
    pub chunk_index: u32,
    /// Number of tokens in the chunk.
    pub token_count: u32,
}

/// A retrieved [`DocumentChunk`] paired with its similarity to the query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: DocumentChunk,
    /// Cosine similarity in `[0, 1]` (higher is more relevant).
    pub similarity_score: f32,
}

/// A coarse label summarizing how reliable the retrieval was for a query.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        };
        f.write_str(label)
    }
}

/// A source attribution derived from a chunk that was used as context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Source {
    /// The document file name.
    pub document: String,
    /// The page the chunk starts on.
    pub page: u32,
    /// The section heading, if one was detected.
    pub section: Option<String>,
    /// The chunk's similarity score.
    pub similarity: f32,
}

/// The answer to a question, with its provenance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatResponse {
    /// The answer text.
    pub answer: String,
    /// Distinct sources in rank order.
    pub sources: Vec<Source>,
    /// Confidence label derived from the retrieval scores.
    pub confidence: Confidence,
    /// Number of chunks passed to the language model.
    pub context_chunks_used: usize,
}

/// Outcome of ingesting one document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestReport {
    /// The ingested file name.
    pub filename: String,
    /// Number of chunks written to the index.
    pub chunks_added: usize,
}

/// Size of the vector index.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexStats {
    /// Number of stored chunks.
    pub total_chunks: usize,
    /// Number of distinct source file names.
    pub total_documents: usize,
}
