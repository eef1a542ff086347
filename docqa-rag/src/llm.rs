//! Language model trait used by the answer composer.

use async_trait::async_trait;

use crate::error::Result;

/// A single-turn chat completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// System instruction.
    pub system: String,
    /// User message: retrieved context plus the question.
    pub user: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum tokens in the reply.
    pub max_tokens: u32,
}

/// A hosted language model that completes a system + user prompt.
///
/// Implementations bound each call with a timeout and retry transient failures;
/// a returned error is surfaced to the caller as-is and never replaced by a
/// made-up answer.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Model label used in logs and errors.
    fn name(&self) -> &str;

    /// Generate the assistant reply text.
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}
