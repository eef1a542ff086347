//! Runtime settings: optional JSON file, then environment overrides.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use docqa_rag::{
    CachedEmbeddingProvider, DocumentQa, EmbeddingProvider, InMemoryVectorIndex, OpenAIChatModel,
    OpenAIEmbeddingProvider, RagConfig, VectorIndex,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::server::DEFAULT_MAX_UPLOAD_BYTES;

/// Which vector index backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Brute-force in-memory index persisted to a JSON snapshot.
    #[default]
    Memory,
    /// A Qdrant server.
    Qdrant,
}

impl std::str::FromStr for StoreKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "qdrant" => Ok(Self::Qdrant),
            other => bail!("unknown store '{other}' (expected memory or qdrant)"),
        }
    }
}

/// Everything the binary needs to assemble a [`DocumentQa`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Pipeline tunables.
    pub rag: RagConfig,
    /// Vector index backend.
    pub store: StoreKind,
    /// Snapshot file for the in-memory index.
    pub index_path: PathBuf,
    /// Qdrant gRPC endpoint.
    pub qdrant_url: String,
    /// Qdrant collection name.
    pub qdrant_collection: String,
    /// Directory scanned by `ingest` and used for HTTP uploads.
    pub upload_dir: PathBuf,
    /// Largest accepted HTTP upload, in bytes.
    pub max_upload_bytes: usize,
    /// Cache embeddings by content hash.
    pub embedding_cache: bool,
    /// OpenAI-compatible API base URL.
    pub openai_base_url: Option<String>,
    /// API key. Never read from the settings file.
    #[serde(skip)]
    pub openai_api_key: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rag: RagConfig::default(),
            store: StoreKind::Memory,
            index_path: PathBuf::from("vector_db/index.json"),
            qdrant_url: "http://localhost:6334".to_string(),
            qdrant_collection: "policy_documents".to_string(),
            upload_dir: PathBuf::from("uploads"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            embedding_cache: true,
            openai_base_url: None,
            openai_api_key: None,
        }
    }
}

fn parse_env<T>(name: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e| anyhow::anyhow!("invalid {name}={value:?}: {e}"))
}

impl Settings {
    /// Read settings from a JSON file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// Load the file (if given), then apply process environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.apply_env(|name| std::env::var(name).ok())?;
        Ok(settings)
    }

    /// Apply `DOCQA_*`, `OPENAI_*` and `QDRANT_URL` overrides from `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("DOCQA_CHUNK_SIZE") {
            self.rag.chunk_size = parse_env("DOCQA_CHUNK_SIZE", &v)?;
        }
        if let Some(v) = get("DOCQA_CHUNK_OVERLAP") {
            self.rag.chunk_overlap = parse_env("DOCQA_CHUNK_OVERLAP", &v)?;
        }
        if let Some(v) = get("DOCQA_TOP_K") {
            self.rag.top_k = parse_env("DOCQA_TOP_K", &v)?;
        }
        if let Some(v) = get("DOCQA_SIMILARITY_THRESHOLD") {
            self.rag.similarity_threshold = parse_env("DOCQA_SIMILARITY_THRESHOLD", &v)?;
        }
        if let Some(v) = get("DOCQA_TEMPERATURE") {
            self.rag.temperature = parse_env("DOCQA_TEMPERATURE", &v)?;
        }
        if let Some(v) = get("DOCQA_MAX_TOKENS") {
            self.rag.max_tokens = parse_env("DOCQA_MAX_TOKENS", &v)?;
        }
        if let Some(v) = get("DOCQA_EMBEDDING_MODEL") {
            self.rag.embedding_model = v;
        }
        if let Some(v) = get("DOCQA_LLM_MODEL") {
            self.rag.llm_model = v;
        }
        if let Some(v) = get("DOCQA_STORE") {
            self.store = parse_env("DOCQA_STORE", &v)?;
        }
        if let Some(v) = get("DOCQA_INDEX_PATH") {
            self.index_path = PathBuf::from(v);
        }
        if let Some(v) = get("DOCQA_UPLOAD_DIR") {
            self.upload_dir = PathBuf::from(v);
        }
        if let Some(v) = get("DOCQA_MAX_UPLOAD_BYTES") {
            self.max_upload_bytes = parse_env("DOCQA_MAX_UPLOAD_BYTES", &v)?;
        }
        if let Some(v) = get("DOCQA_EMBEDDING_CACHE") {
            self.embedding_cache = parse_env("DOCQA_EMBEDDING_CACHE", &v)?;
        }
        if let Some(v) = get("QDRANT_URL") {
            self.qdrant_url = v;
        }
        if let Some(v) = get("OPENAI_BASE_URL") {
            self.openai_base_url = Some(v);
        }
        if let Some(v) = get("OPENAI_API_KEY") {
            self.openai_api_key = Some(v);
        }

        self.rag.validate().context("invalid pipeline configuration")?;
        Ok(())
    }

    fn api_key(&self) -> Result<&str> {
        self.openai_api_key
            .as_deref()
            .context("OPENAI_API_KEY is not set (export it or put it in .env)")
    }

    /// Open the configured vector index.
    pub async fn open_index(&self) -> Result<Arc<dyn VectorIndex>> {
        match self.store {
            StoreKind::Memory => {
                let index = InMemoryVectorIndex::persistent(&self.index_path)
                    .await
                    .with_context(|| format!("failed to open index {}", self.index_path.display()))?;
                Ok(Arc::new(index))
            }
            #[cfg(feature = "qdrant")]
            StoreKind::Qdrant => {
                let index =
                    docqa_rag::QdrantVectorIndex::new(&self.qdrant_url, &self.qdrant_collection)
                        .with_context(|| format!("failed to connect to Qdrant at {}", self.qdrant_url))?;
                Ok(Arc::new(index))
            }
            #[cfg(not(feature = "qdrant"))]
            StoreKind::Qdrant => bail!("this build of docqa does not include Qdrant support"),
        }
    }

    /// Assemble the assistant: OpenAI embeddings (optionally cached), the
    /// configured index, and the OpenAI chat model.
    pub async fn build_assistant(&self) -> Result<DocumentQa> {
        let key = self.api_key()?;

        let mut embedder = OpenAIEmbeddingProvider::from_config(key, &self.rag)?;
        let mut model = OpenAIChatModel::from_config(key, &self.rag)?;
        if let Some(base_url) = &self.openai_base_url {
            embedder = embedder.with_base_url(base_url);
            model = model.with_base_url(base_url);
        }
        let embedder: Arc<dyn EmbeddingProvider> = if self.embedding_cache {
            Arc::new(CachedEmbeddingProvider::new(Arc::new(embedder)))
        } else {
            Arc::new(embedder)
        };
        let index = self.open_index().await?;

        info!(
            store = ?self.store,
            embedding_model = %self.rag.embedding_model,
            llm_model = %self.rag.llm_model,
            "assistant ready"
        );
        Ok(DocumentQa::builder()
            .config(self.rag.clone())
            .embedding_provider(embedder)
            .vector_index(index)
            .language_model(Arc::new(model))
            .build()?)
    }
}
