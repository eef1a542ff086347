//! Deterministic stand-ins for the hosted embedding and language model services.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use docqa_rag::{
    DocumentQa, EmbeddingProvider, ExtractedDocument, GenerationRequest, InMemoryVectorIndex,
    LanguageModel, RagConfig, RagError, Result, TokenWindowChunker, Tokenizer,
};

pub const DIMS: usize = 256;

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "how", "many", "what", "is", "are", "do", "does", "i", "my", "of", "per",
    "to", "in", "for", "and", "or", "get", "can", "we",
];

fn fnv1a(word: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in word.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

/// Hashed bag-of-words embeddings: lowercase alphabetic words, stopwords removed.
#[derive(Default)]
pub struct BagOfWordsEmbedder {
    pub calls: AtomicUsize,
}

impl BagOfWordsEmbedder {
    pub fn vector(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; DIMS];
        for word in text.split(|c: char| !c.is_alphabetic()).filter(|w| !w.is_empty()) {
            let word = word.to_lowercase();
            if STOPWORDS.contains(&word.as_str()) {
                continue;
            }
            vector[(fnv1a(&word) % DIMS as u64) as usize] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for BagOfWordsEmbedder {
    fn name(&self) -> &str {
        "bag-of-words"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Self::vector(text))
    }

    fn dimensions(&self) -> usize {
        DIMS
    }
}

/// One token per whitespace-separated word, so window arithmetic is easy to read.
#[derive(Default)]
pub struct WordTokenizer {
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

pub fn word_chunker(size: usize, overlap: usize) -> TokenWindowChunker {
    TokenWindowChunker::with_tokenizer(size, overlap, Arc::new(WordTokenizer::default()))
}

/// An embedder whose every call fails, as if retries were exhausted.
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    fn name(&self) -> &str {
        "failing"
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(RagError::Embedding {
            provider: "failing".into(),
            message: "service unavailable (gave up after 4 attempts)".into(),
        })
    }

    fn dimensions(&self) -> usize {
        DIMS
    }
}

/// Records every request and replies with a fixed answer.
pub struct RecordingModel {
    pub answer: String,
    pub requests: Mutex<Vec<GenerationRequest>>,
}

impl RecordingModel {
    pub fn new(answer: impl Into<String>) -> Self {
        Self { answer: answer.into(), requests: Mutex::new(Vec::new()) }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<GenerationRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl LanguageModel for RecordingModel {
    fn name(&self) -> &str {
        "recording"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(self.answer.clone())
    }
}

/// A model that always fails.
pub struct BrokenModel;

#[async_trait]
impl LanguageModel for BrokenModel {
    fn name(&self) -> &str {
        "broken"
    }

    async fn generate(&self, _request: &GenerationRequest) -> Result<String> {
        Err(RagError::Generation { provider: "broken".into(), message: "HTTP 503".into() })
    }
}

pub fn leave_policy() -> ExtractedDocument {
    ExtractedDocument::from_pages("handbook.pdf", [(12, "Leave Policy\nAnnual leave: 14 days")])
}

pub fn handbook() -> ExtractedDocument {
    ExtractedDocument::from_pages(
        "handbook.pdf",
        [
            (11, "Travel Policy\nEconomy class flights are booked for trips under six hours.".to_string()),
            (12, "Leave Policy\nAnnual leave: 14 days".to_string()),
        ],
    )
}

pub struct Fixture {
    pub qa: DocumentQa,
    pub index: Arc<InMemoryVectorIndex>,
    pub embedder: Arc<BagOfWordsEmbedder>,
    pub model: Arc<RecordingModel>,
}

pub fn fixture(config: RagConfig) -> Fixture {
    let chunker = TokenWindowChunker::from_config(&config).unwrap();
    fixture_with_chunker(config, chunker)
}

/// Windows counted in whole words instead of model tokens.
pub fn word_fixture(config: RagConfig) -> Fixture {
    let chunker = word_chunker(config.chunk_size, config.chunk_overlap);
    fixture_with_chunker(config, chunker)
}

fn fixture_with_chunker(config: RagConfig, chunker: TokenWindowChunker) -> Fixture {
    let index = Arc::new(InMemoryVectorIndex::new());
    let embedder = Arc::new(BagOfWordsEmbedder::default());
    let model = Arc::new(RecordingModel::new(
        "Employees receive 14 days of annual leave (handbook.pdf, Page 12, Leave Policy).",
    ));
    let qa = DocumentQa::builder()
        .config(config)
        .chunker(Arc::new(chunker))
        .embedding_provider(embedder.clone())
        .vector_index(index.clone())
        .language_model(model.clone())
        .build()
        .unwrap();
    Fixture { qa, index, embedder, model }
}
