//! Error types for the `docqa-rag` crate.

use thiserror::Error;

/// Errors that can occur while ingesting documents or answering questions.
///
/// "No relevant information" is not an error: a query that retrieves nothing
/// above the similarity threshold returns a normal [`ChatResponse`](crate::ChatResponse)
/// with [`Confidence::Low`](crate::Confidence::Low).
#[derive(Debug, Error)]
pub enum RagError {
    /// The uploaded document could not be read or parsed.
    #[error("Extraction error ({filename}): {message}")]
    Extraction {
        /// The name of the file that failed to extract.
        filename: String,
        /// A description of the failure.
        message: String,
    },

    /// The embedding service failed, after retries where applicable.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The vector index backend is unavailable or rejected an operation.
    #[error("Index error ({backend}): {message}")]
    Index {
        /// The vector index backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// The language model failed to produce an answer, after retries where applicable.
    #[error("Generation error ({provider}): {message}")]
    Generation {
        /// The language model provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RagError {
    /// A stable, snake_case label for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Extraction { .. } => "extraction_error",
            Self::Embedding { .. } => "embedding_error",
            Self::Index { .. } => "index_error",
            Self::Generation { .. } => "generation_error",
            Self::Config(_) => "config_error",
        }
    }

    /// Returns `true` when the failure came from an upstream service
    /// (embedding API, vector database, or language model).
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Embedding { .. } | Self::Index { .. } | Self::Generation { .. })
    }

    pub(crate) fn index(backend: &str, message: impl Into<String>) -> Self {
        Self::Index { backend: backend.to_string(), message: message.into() }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable_labels() {
        let err = RagError::Embedding { provider: "OpenAI".into(), message: "boom".into() };
        assert_eq!(err.kind(), "embedding_error");
        assert!(err.is_upstream());
        assert_eq!(err.to_string(), "Embedding error (OpenAI): boom");

        let err = RagError::Extraction { filename: "a.pdf".into(), message: "bad xref".into() };
        assert_eq!(err.kind(), "extraction_error");
        assert!(!err.is_upstream());
    }
}
