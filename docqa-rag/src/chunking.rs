//! Sliding-window document chunking.
//!
//! This module provides the [`Chunker`] trait and [`TokenWindowChunker`], which
//! splits a document's page-tagged text into fixed-size token windows that
//! overlap, so that a fact straddling a window boundary appears whole in at
//! least one chunk.

use std::sync::Arc;

use crate::config::RagConfig;
use crate::document::{DocumentChunk, ExtractedDocument};
use crate::error::Result;
use crate::section::detect_heading;
use crate::tokenizer::{Cl100kTokenizer, Tokenizer};

/// Tokens trimmed from either edge of a window whose text does not decode.
const MAX_EDGE_TRIM: usize = 3;

/// A strategy for splitting extracted documents into chunks.
///
/// Implementations must be deterministic: chunking the same document twice
/// yields identical chunks.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the document has no text.
    fn chunk(&self, document: &ExtractedDocument) -> Vec<DocumentChunk>;
}

/// Splits a document into windows of `chunk_size` model tokens, each sharing
/// `chunk_overlap` tokens with its predecessor.
///
/// All pages are tokenized into a single stream, so windows run across page
/// breaks; a chunk's `page_number` is the page of its first token. The final
/// window may be shorter than `chunk_size`. Chunk text is the decoded window
/// with runs of whitespace collapsed to one space.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{Chunker, TokenWindowChunker};
///
/// let chunker = TokenWindowChunker::new(800, 200)?;
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Clone)]
pub struct TokenWindowChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    tokenizer: Arc<dyn Tokenizer>,
}

impl std::fmt::Debug for TokenWindowChunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenWindowChunker")
            .field("chunk_size", &self.chunk_size)
            .field("chunk_overlap", &self.chunk_overlap)
            .field("tokenizer", &self.tokenizer.name())
            .finish()
    }
}

impl TokenWindowChunker {
    /// Create a chunker that counts `cl100k_base` tokens.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` - maximum number of tokens per chunk (at least 1)
    /// * `chunk_overlap` - tokens shared between consecutive chunks; clamped
    ///   below `chunk_size`
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`](crate::RagError::Config) if the encoding cannot be loaded.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        Ok(Self::with_tokenizer(chunk_size, chunk_overlap, Arc::new(Cl100kTokenizer::new()?)))
    }

    /// Create a chunker that counts tokens with `tokenizer`.
    pub fn with_tokenizer(
        chunk_size: usize,
        chunk_overlap: usize,
        tokenizer: Arc<dyn Tokenizer>,
    ) -> Self {
        let chunk_size = chunk_size.max(1);
        Self { chunk_size, chunk_overlap: chunk_overlap.min(chunk_size - 1), tokenizer }
    }

    /// Create a chunker from the pipeline configuration.
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// The configured window size in tokens.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// The configured overlap in tokens.
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Number of tokens in the document's token stream.
    pub fn count_tokens(&self, document: &ExtractedDocument) -> usize {
        self.tokenize(document).0.len()
    }

    fn tokenize(&self, document: &ExtractedDocument) -> (Vec<Token>, Vec<Heading>) {
        let mut tokens = Vec::new();
        let mut headings = Vec::new();
        for page in &document.pages {
            for line in page.text.lines().filter(|l| !l.trim().is_empty()) {
                let position = tokens.len();
                let ids = self.tokenizer.encode(&format!("{line}\n"));
                tokens.extend(ids.into_iter().map(|id| Token { id, page: page.page_number }));
                if tokens.len() == position {
                    continue;
                }
                if let Some(text) = detect_heading(line) {
                    headings.push(Heading { position, text });
                }
            }
        }
        (tokens, headings)
    }

    /// Decode a window, dropping a few edge tokens if they split a character.
    fn decode(&self, ids: &[u32]) -> String {
        let limit = MAX_EDGE_TRIM.min(ids.len().saturating_sub(1) / 2);
        for front in 0..=limit {
            for back in 0..=limit {
                if let Some(text) = self.tokenizer.decode(&ids[front..ids.len() - back]) {
                    return text;
                }
            }
        }
        ids.iter().filter_map(|&id| self.tokenizer.decode(&[id])).collect()
    }
}

/// A token id with the page it was read from.
struct Token {
    id: u32,
    page: u32,
}

/// A detected heading and the stream position of its first token.
struct Heading {
    position: usize,
    text: String,
}

/// The heading in effect for the window `[start, end)`: the last heading at or
/// before `start`, else the first heading inside the window.
fn section_for(headings: &[Heading], start: usize, end: usize) -> Option<String> {
    let after = headings.partition_point(|h| h.position <= start);
    if after > 0 {
        return Some(headings[after - 1].text.clone());
    }
    headings.first().filter(|h| h.position < end).map(|h| h.text.clone())
}

impl Chunker for TokenWindowChunker {
    fn chunk(&self, document: &ExtractedDocument) -> Vec<DocumentChunk> {
        let (tokens, headings) = self.tokenize(document);
        if tokens.is_empty() {
            return Vec::new();
        }

        let step = self.chunk_size - self.chunk_overlap;
        let mut chunks = Vec::new();
        let mut start = 0;

        loop {
            let end = (start + self.chunk_size).min(tokens.len());
            let window = &tokens[start..end];
            let ids: Vec<u32> = window.iter().map(|t| t.id).collect();
            let text = self.decode(&ids).split_whitespace().collect::<Vec<_>>().join(" ");

            if !text.is_empty() {
                chunks.push(DocumentChunk {
                    text,
                    filename: document.filename.clone(),
                    page_number: window[0].page,
                    section: section_for(&headings, start, end),
                    chunk_index: chunks.len() as u32,
                    token_count: window.len() as u32,
                });
            }

            if end == tokens.len() {
                break;
            }
            start += step;
        }

        chunks
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// One token per whitespace-separated word.
    #[derive(Default)]
    struct WordTokenizer {
        vocabulary: Mutex<(HashMap<String, u32>, Vec<String>)>,
    }

    impl Tokenizer for WordTokenizer {
        fn name(&self) -> &str {
            "words"
        }

        fn encode(&self, text: &str) -> Vec<u32> {
            let mut guard = self.vocabulary.lock().unwrap();
            let (ids, words) = &mut *guard;
            text.split_whitespace()
                .map(|word| {
                    *ids.entry(word.to_string()).or_insert_with(|| {
                        words.push(word.to_string());
                        words.len() as u32 - 1
                    })
                })
                .collect()
        }

        fn decode(&self, tokens: &[u32]) -> Option<String> {
            let guard = self.vocabulary.lock().unwrap();
            let words = tokens
                .iter()
                .map(|&t| guard.1.get(t as usize).map(String::as_str))
                .collect::<Option<Vec<_>>>()?;
            Some(words.join(" "))
        }
    }

    fn word_chunker(size: usize, overlap: usize) -> TokenWindowChunker {
        TokenWindowChunker::with_tokenizer(size, overlap, Arc::new(WordTokenizer::default()))
    }

    fn words(range: std::ops::Range<usize>) -> String {
        range.map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        let chunker = word_chunker(10, 2);
        let doc = ExtractedDocument::from_pages("empty.pdf", [(1, "   \n\t ")]);
        assert!(chunker.chunk(&doc).is_empty());
        let doc = ExtractedDocument::from_pages("none.pdf", Vec::<(u32, String)>::new());
        assert!(chunker.chunk(&doc).is_empty());
    }

    #[test]
    fn short_document_yields_one_chunk() {
        let chunker = word_chunker(800, 200);
        let doc = ExtractedDocument::from_pages("short.pdf", [(1, "one two"), (2, "three")]);
        let chunks = chunker.chunk(&doc);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "one two three");
        assert_eq!(chunks[0].token_count, 3);
        assert_eq!(chunks[0].page_number, 1);
    }

    #[test]
    fn windows_overlap_and_last_is_shorter() {
        let chunker = word_chunker(10, 4);
        let doc = ExtractedDocument::from_pages("doc.pdf", [(1, words(0..25))]);
        let chunks = chunker.chunk(&doc);

        // starts at 0, 6, 12, 18; the window at 18 reaches the end
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[1].text.split(' ').next(), Some("w6"));
        assert_eq!(chunks[3].token_count, 7);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index as usize, i);
        }
        let tail: Vec<&str> = chunks[0].text.split(' ').skip(6).collect();
        let head: Vec<&str> = chunks[1].text.split(' ').take(4).collect();
        assert_eq!(tail, head);
    }

    #[test]
    fn page_number_is_page_of_first_token() {
        let chunker = word_chunker(4, 1);
        let doc =
            ExtractedDocument::from_pages("doc.pdf", [(3, "a b c"), (4, "d e f"), (5, "g h")]);
        let pages: Vec<u32> = chunker.chunk(&doc).iter().map(|c| c.page_number).collect();
        // windows start at tokens a, d, g
        assert_eq!(pages, vec![3, 4, 5]);
    }

    #[test]
    fn section_follows_preceding_heading() {
        let chunker = word_chunker(5, 1);
        let text = "Leave Policy\nAnnual leave: 14 days per year of service\nCode Of Conduct\nbe kind";
        let doc = ExtractedDocument::from_pages("hr.pdf", [(12, text)]);
        let chunks = chunker.chunk(&doc);
        assert!(chunks.len() >= 2);
        assert_eq!(chunks[0].section.as_deref(), Some("Leave Policy"));
        assert!(chunks.iter().all(|c| c.section.is_some()));
        assert_eq!(chunks.last().and_then(|c| c.section.as_deref()), Some("Code Of Conduct"));
    }

    #[test]
    fn no_heading_means_no_section() {
        let chunker = word_chunker(50, 10);
        let doc = ExtractedDocument::from_pages("plain.pdf", [(1, "just some lowercase body text.")]);
        assert_eq!(chunker.chunk(&doc)[0].section, None);
    }

    #[test]
    fn overlap_is_clamped_below_size() {
        let chunker = word_chunker(3, 9);
        assert_eq!(chunker.chunk_overlap(), 2);
        let doc = ExtractedDocument::from_pages("d.pdf", [(1, words(0..6))]);
        assert_eq!(chunker.chunk(&doc).len(), 4);
    }

    #[test]
    fn model_tokens_outnumber_words() {
        let chunker = TokenWindowChunker::new(800, 200).unwrap();
        let doc = ExtractedDocument::from_pages("hr.pdf", [(1, "Annual leave: 14 days")]);
        let chunks = chunker.chunk(&doc);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Annual leave: 14 days");
        assert!(chunks[0].token_count >= 6, "token_count = {}", chunks[0].token_count);
    }

    #[test]
    fn multibyte_text_survives_small_windows() {
        let chunker = TokenWindowChunker::new(3, 1).unwrap();
        let text = "Congé annuel 日本語の休暇規定 für Mitarbeiter ✈️ Reisekosten";
        let doc = ExtractedDocument::from_pages("intl.pdf", [(2, text)]);
        let chunks = chunker.chunk(&doc);
        assert!(chunks.len() > 3);
        assert!(chunks.iter().all(|c| c.token_count <= 3 && !c.text.is_empty()));
        assert!(chunks.iter().all(|c| !c.text.contains('\u{FFFD}')));
    }
}
