//! Grounded answer generation.
//!
//! [`AnswerComposer`] turns the retrieved chunks and the user's question into
//! a prompt, asks the [`LanguageModel`] for an answer, and attaches source
//! attributions taken from the chunks themselves, never from the model output.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::config::RagConfig;
use crate::document::{ChatResponse, Confidence, SearchResult, Source};
use crate::error::{RagError, Result};
use crate::llm::{GenerationRequest, LanguageModel};

/// The answer given when the index holds nothing to search.
pub const NOT_FOUND_ANSWER: &str = "I could not find this information in the provided documents.";

/// The answer given when chunks were found but none scored above the threshold.
pub const LOW_RELEVANCE_ANSWER: &str = "Sorry, I cannot retrieve relevant information from the \
documents. Please upload a more clear or complete version.";

const SYSTEM_PROMPT: &str = "You are a document question-answering assistant for company \
documents such as HR policies, contracts, procedures and guidelines.

Rules:
1. Answer ONLY from the CONTEXT supplied with the question.
2. If the context does not contain the answer, reply exactly: \"I could not find this information in the provided documents.\"
3. Do not guess and do not use outside knowledge.
4. Quote rules, numbers and clauses as written; do not reinterpret them.
5. Mention the document, page and section the answer comes from.
6. If several sections are relevant, summarize each of them.

Be concise, factual and neutral.";

/// Section label used when a chunk has no detected heading.
pub const GENERAL_SECTION: &str = "General";

/// Builds prompts from retrieved context and packages the model's answer.
pub struct AnswerComposer {
    model: Arc<dyn LanguageModel>,
    temperature: f32,
    max_tokens: u32,
}

impl AnswerComposer {
    /// Create a composer using the generation settings of `config`.
    pub fn new(config: &RagConfig, model: Arc<dyn LanguageModel>) -> Self {
        Self { model, temperature: config.temperature, max_tokens: config.max_tokens }
    }

    /// The system instruction sent with every request.
    pub fn system_prompt(&self) -> &'static str {
        SYSTEM_PROMPT
    }

    /// Build the generation request for `question` over `results`.
    pub fn build_request(&self, question: &str, results: &[SearchResult]) -> GenerationRequest {
        GenerationRequest {
            system: SYSTEM_PROMPT.to_string(),
            user: user_prompt(question, results),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    /// Answer `question` from `results`.
    ///
    /// With no results the model is not called and the not-found answer is
    /// returned with [`Confidence::Low`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Generation`] if the model fails or replies with
    /// empty text.
    pub async fn compose(
        &self,
        question: &str,
        results: &[SearchResult],
        confidence: Confidence,
    ) -> Result<ChatResponse> {
        if results.is_empty() {
            debug!("no relevant context, returning not-found answer");
            return Ok(unanswered(NOT_FOUND_ANSWER));
        }

        let request = self.build_request(question, results);
        let answer = self.model.generate(&request).await.inspect_err(|e| {
            error!(model = self.model.name(), error = %e, "answer generation failed");
        })?;
        let answer = answer.trim();
        if answer.is_empty() {
            return Err(RagError::Generation {
                provider: self.model.name().to_string(),
                message: "model returned an empty answer".to_string(),
            });
        }

        let sources = sources_for(results);
        info!(
            model = self.model.name(),
            context_chunks = results.len(),
            sources = sources.len(),
            %confidence,
            "composed answer"
        );
        Ok(ChatResponse {
            answer: answer.to_string(),
            sources,
            confidence,
            context_chunks_used: results.len(),
        })
    }
}

/// A low-confidence reply that cites nothing and never reached the model.
pub(crate) fn unanswered(answer: &str) -> ChatResponse {
    ChatResponse {
        answer: answer.to_string(),
        sources: Vec::new(),
        confidence: Confidence::Low,
        context_chunks_used: 0,
    }
}

/// The user message: numbered, attributed context blocks and the question.
fn user_prompt(question: &str, results: &[SearchResult]) -> String {
    let mut context = String::new();
    for (i, result) in results.iter().enumerate() {
        let chunk = &result.chunk;
        if i > 0 {
            context.push_str("\n---\n");
        }
        let _ = writeln!(
            context,
            "[Source {}: {} | Page {} | Section: {}]\n{}",
            i + 1,
            chunk.filename,
            chunk.page_number,
            chunk.section.as_deref().unwrap_or(GENERAL_SECTION),
            chunk.text
        );
    }

    format!(
        "CONTEXT (from PDF documents):\n{context}\n---\n\nUSER QUESTION:\n{question}\n\n---\n\n\
Answer using ONLY the context above. If it does not contain the answer, say: \
\"{NOT_FOUND_ANSWER}\" Cite the document, page and section you used."
    )
}

/// One source per distinct (document, page, section), in rank order.
pub fn sources_for(results: &[SearchResult]) -> Vec<Source> {
    let mut seen = HashSet::new();
    let mut sources = Vec::new();
    for result in results {
        let chunk = &result.chunk;
        if !seen.insert((chunk.filename.as_str(), chunk.page_number, chunk.section.as_deref())) {
            continue;
        }
        sources.push(Source {
            document: chunk.filename.clone(),
            page: chunk.page_number,
            section: chunk.section.clone(),
            similarity: result.similarity_score,
        });
    }
    sources
}
