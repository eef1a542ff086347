//! Text extraction from uploaded documents.

use async_trait::async_trait;
use lopdf::Document;
use tracing::{debug, warn};

use crate::document::ExtractedDocument;
use crate::error::{RagError, Result};

/// Turns raw uploaded bytes into page-tagged text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extract the text of every page that has any.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Extraction`] if the input cannot be parsed.
    async fn extract(&self, bytes: &[u8], filename: &str) -> Result<ExtractedDocument>;
}

/// Extractor for PDF files.
///
/// `lopdf` validates the file and counts its pages; `pdf-extract` lays out
/// the text of each page, starting a new line wherever the text cursor moves
/// down. Parsing runs on the blocking thread pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractor;

impl PdfExtractor {
    /// Create a new PDF extractor.
    pub fn new() -> Self {
        Self
    }
}

fn extract_pages(bytes: &[u8], filename: &str) -> Result<ExtractedDocument> {
    let failed = |message: String| RagError::Extraction { filename: filename.to_string(), message };

    let document = Document::load_mem(bytes).map_err(|e| failed(format!("not a readable PDF: {e}")))?;
    if document.is_encrypted() {
        return Err(failed("encrypted PDFs are not supported".to_string()));
    }
    let page_count = document.get_pages().len() as u32;

    let texts = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| failed(format!("failed to extract text: {e}")))?;
    if texts.len() as u32 != page_count {
        warn!(filename, pages = page_count, text_pages = texts.len(), "page count mismatch");
    }

    let mut extracted = ExtractedDocument::from_pages(
        filename,
        texts.into_iter().enumerate().map(|(i, text)| (i as u32 + 1, text)),
    );
    extracted.total_pages = extracted.total_pages.max(page_count);
    Ok(extracted)
}

#[async_trait]
impl TextExtractor for PdfExtractor {
    async fn extract(&self, bytes: &[u8], filename: &str) -> Result<ExtractedDocument> {
        debug!(filename, bytes = bytes.len(), "extracting PDF");
        let owned = bytes.to_vec();
        let name = filename.to_string();
        let document = tokio::task::spawn_blocking(move || extract_pages(&owned, &name))
            .await
            .map_err(|e| RagError::Extraction {
                filename: filename.to_string(),
                message: format!("extraction task failed: {e}"),
            })??;
        debug!(
            filename,
            total_pages = document.total_pages,
            text_pages = document.pages.len(),
            "extracted PDF"
        );
        Ok(document)
    }
}
