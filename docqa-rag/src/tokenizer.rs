//! Model tokenization for chunk sizing.
//!
//! Chunk windows are measured in the tokens the embedding and chat models
//! see. [`Cl100kTokenizer`] uses the `cl100k_base` byte-pair encoding shared
//! by the OpenAI embedding and GPT-4 family models.

use std::sync::{Arc, LazyLock};

use tiktoken_rs::CoreBPE;

use crate::error::{RagError, Result};

/// Converts text to model tokens and back.
pub trait Tokenizer: Send + Sync {
    /// Short encoding label used in logs.
    fn name(&self) -> &str;

    /// Encode `text` into token ids.
    fn encode(&self, text: &str) -> Vec<u32>;

    /// Decode token ids back into text.
    ///
    /// Returns `None` if the tokens split a multi-byte character.
    fn decode(&self, tokens: &[u32]) -> Option<String>;
}

/// Built once per process; loading the merge table takes tens of milliseconds.
static CL100K: LazyLock<std::result::Result<Arc<CoreBPE>, String>> =
    LazyLock::new(|| tiktoken_rs::cl100k_base().map(Arc::new).map_err(|e| e.to_string()));

/// The `cl100k_base` encoding.
#[derive(Clone)]
pub struct Cl100kTokenizer {
    bpe: Arc<CoreBPE>,
}

impl std::fmt::Debug for Cl100kTokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cl100kTokenizer").finish_non_exhaustive()
    }
}

impl Cl100kTokenizer {
    /// Load the shared encoding.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if the embedded merge table cannot be parsed.
    pub fn new() -> Result<Self> {
        match &*CL100K {
            Ok(bpe) => Ok(Self { bpe: Arc::clone(bpe) }),
            Err(e) => Err(RagError::Config(format!("failed to load cl100k_base encoding: {e}"))),
        }
    }
}

impl Tokenizer for Cl100kTokenizer {
    fn name(&self) -> &str {
        "cl100k_base"
    }

    fn encode(&self, text: &str) -> Vec<u32> {
        self.bpe.encode_ordinary(text).into_iter().map(|t| t as u32).collect()
    }

    fn decode(&self, tokens: &[u32]) -> Option<String> {
        self.bpe.decode(tokens.iter().map(|&t| t as _).collect()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_subword_tokens() {
        let tokenizer = Cl100kTokenizer::new().unwrap();
        let tokens = tokenizer.encode("Annual leave: 14 days");
        assert!(tokens.len() >= 6, "{tokens:?}");
        assert_eq!(tokenizer.decode(&tokens).as_deref(), Some("Annual leave: 14 days"));
    }
}
