//! Configuration for the question-answering pipeline.
//!
//! Every tunable the pipeline uses lives in [`RagConfig`]. Components receive
//! the config (or the slice of it they need) at construction time.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::retry::RetryPolicy;

/// Configuration parameters for chunking, retrieval, scoring and generation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Target chunk size in tokens.
    pub chunk_size: usize,
    /// Number of tokens shared between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of candidates requested from the vector index before filtering.
    pub search_candidates: usize,
    /// Maximum number of chunks handed to the language model.
    pub top_k: usize,
    /// Minimum similarity score (inclusive) for a chunk to be used as context.
    pub similarity_threshold: f32,
    /// Minimum top score for [`Confidence::High`](crate::Confidence::High).
    pub confidence_high: f32,
    /// Minimum top score for [`Confidence::Medium`](crate::Confidence::Medium).
    pub confidence_medium: f32,
    /// Sampling temperature for answer generation.
    pub temperature: f32,
    /// Token budget for the generated answer.
    pub max_tokens: u32,
    /// Embedding model name.
    pub embedding_model: String,
    /// Chat model name.
    pub llm_model: String,
    /// Maximum number of texts per embedding request.
    pub embedding_batch_size: usize,
    /// Per-request timeout for external service calls, in seconds.
    pub request_timeout_secs: u64,
    /// Retry policy for transient embedding and generation failures.
    pub retry: RetryPolicy,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 200,
            search_candidates: 10,
            top_k: 5,
            similarity_threshold: 0.70,
            confidence_high: 0.85,
            confidence_medium: 0.70,
            temperature: 0.1,
            max_tokens: 1000,
            embedding_model: "text-embedding-ada-002".to_string(),
            llm_model: "gpt-4".to_string(),
            embedding_batch_size: 64,
            request_timeout_secs: 30,
            retry: RetryPolicy::default(),
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// The per-request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Check that the parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if:
    /// - `chunk_size == 0` or `chunk_overlap >= chunk_size`
    /// - `top_k == 0` or `search_candidates < top_k`
    /// - any threshold is outside `[0, 1]`, or `confidence_medium > confidence_high`
    /// - `temperature` is outside `[0, 2]` or `max_tokens == 0`
    /// - `embedding_batch_size == 0` or `request_timeout_secs == 0`
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be greater than zero".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(RagError::Config("top_k must be greater than zero".to_string()));
        }
        if self.search_candidates < self.top_k {
            return Err(RagError::Config(format!(
                "search_candidates ({}) must be at least top_k ({})",
                self.search_candidates, self.top_k
            )));
        }
        for (name, value) in [
            ("similarity_threshold", self.similarity_threshold),
            ("confidence_high", self.confidence_high),
            ("confidence_medium", self.confidence_medium),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(RagError::Config(format!("{name} ({value}) must be within [0, 1]")));
            }
        }
        if self.confidence_medium > self.confidence_high {
            return Err(RagError::Config(format!(
                "confidence_medium ({}) must not exceed confidence_high ({})",
                self.confidence_medium, self.confidence_high
            )));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(RagError::Config(format!(
                "temperature ({}) must be within [0, 2]",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(RagError::Config("max_tokens must be greater than zero".to_string()));
        }
        if self.embedding_batch_size == 0 {
            return Err(RagError::Config(
                "embedding_batch_size must be greater than zero".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(RagError::Config(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Start from an existing configuration instead of the defaults.
    pub fn from_config(config: RagConfig) -> Self {
        Self { config }
    }

    /// Set the target chunk size in tokens.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in tokens.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set how many candidates are requested from the index before filtering.
    pub fn search_candidates(mut self, candidates: usize) -> Self {
        self.config.search_candidates = candidates;
        self
    }

    /// Set the maximum number of context chunks.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the minimum similarity threshold for filtering results.
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.config.similarity_threshold = threshold;
        self
    }

    /// Set the High / Medium confidence cut-offs.
    pub fn confidence_thresholds(mut self, high: f32, medium: f32) -> Self {
        self.config.confidence_high = high;
        self.config.confidence_medium = medium;
        self
    }

    /// Set the sampling temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    /// Set the answer token budget.
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.config.max_tokens = max_tokens;
        self
    }

    /// Set the embedding model name.
    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.config.embedding_model = model.into();
        self
    }

    /// Set the chat model name.
    pub fn llm_model(mut self, model: impl Into<String>) -> Self {
        self.config.llm_model = model.into();
        self
    }

    /// Set the maximum embedding batch size.
    pub fn embedding_batch_size(mut self, size: usize) -> Self {
        self.config.embedding_batch_size = size;
        self
    }

    /// Set the per-request timeout in seconds.
    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    /// Set the retry policy for external calls.
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.config.retry = retry;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
