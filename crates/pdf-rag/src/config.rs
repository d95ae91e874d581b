//! Configuration for the RAG pipeline

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Main pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Answer generation configuration
    pub llm: LlmConfig,
    /// Vector index configuration
    pub vector_db: VectorDbConfig,
    /// Retrieval and context assembly configuration
    pub retrieval: RetrievalConfig,
}

impl RagConfig {
    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let mut config: RagConfig = toml::from_str(&raw).map_err(|e| {
            Error::configuration(format!("Invalid config file {}: {}", path.display(), e))
        })?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Default configuration with environment overrides applied
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup
    ///
    /// Recognised keys: `QDRANT_URL`, `QDRANT_API_KEY`, `GEMINI_API_KEY`, `OLLAMA_URL`.
    /// Setting `QDRANT_URL` also selects the Qdrant backend.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = lookup("QDRANT_URL") {
            self.vector_db.url = url;
            self.vector_db.backend = IndexBackend::Qdrant;
        }
        if let Some(key) = lookup("QDRANT_API_KEY") {
            self.vector_db.api_key = Some(key);
        }
        if let Some(key) = lookup("GEMINI_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(url) = lookup("OLLAMA_URL") {
            self.embeddings.base_url = url.clone();
            if self.llm.provider == GeneratorProvider::Ollama {
                self.llm.base_url = Some(url);
            }
        }
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(Error::configuration("chunking.chunk_size must be greater than 0"));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(Error::configuration(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.embeddings.dimensions == 0 {
            return Err(Error::configuration("embeddings.dimensions must be greater than 0"));
        }
        if self.embeddings.batch_size == 0 {
            return Err(Error::configuration("embeddings.batch_size must be greater than 0"));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::configuration("retrieval.top_k must be at least 1"));
        }
        if self.vector_db.collection.trim().is_empty() {
            return Err(Error::configuration("vector_db.collection must not be empty"));
        }
        Ok(())
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window size in characters
    pub chunk_size: usize,
    /// Characters shared by consecutive windows
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Ollama base URL
    pub base_url: String,
    /// Model to use (all-minilm is MiniLM-L6-v2, 384 dimensions)
    pub model: String,
    /// Embedding dimensions, also the collection dimension
    pub dimensions: usize,
    /// Texts embedded per batch during ingestion
    pub batch_size: usize,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "all-minilm".to_string(),
            dimensions: 384,
            batch_size: 32,
            timeout_secs: 60,
        }
    }
}

impl EmbeddingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Which service generates answers
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorProvider {
    /// Google Gemini through the Generative Language API
    #[default]
    Gemini,
    /// Local Ollama server
    Ollama,
}

/// LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Generation backend
    pub provider: GeneratorProvider,
    /// Generation model name
    pub model: String,
    /// Base URL override (provider default when unset)
    pub base_url: Option<String>,
    /// API key (Gemini only)
    pub api_key: Option<String>,
    /// Temperature for generation
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Retries for failed requests (0 keeps calls single-attempt)
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: GeneratorProvider::Gemini,
            model: "gemini-2.5-flash".to_string(),
            base_url: None,
            api_key: None,
            temperature: 0.3,
            timeout_secs: 120,
            max_retries: 0,
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Vector index backend selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    /// In-process exact cosine index
    #[default]
    Memory,
    /// Qdrant over its REST API
    Qdrant,
}

/// Vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorDbConfig {
    /// Backend to use
    pub backend: IndexBackend,
    /// Qdrant URL
    pub url: String,
    /// Qdrant API key
    pub api_key: Option<String>,
    /// Collection name
    pub collection: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        Self {
            backend: IndexBackend::Memory,
            url: "http://localhost:6333".to_string(),
            api_key: None,
            collection: "pdf_docs".to_string(),
            timeout_secs: 30,
        }
    }
}

impl VectorDbConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Retrieval and context assembly configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Passages retrieved when the request does not say
    pub top_k: usize,
    /// Upper bound on the assembled context, in characters
    pub max_context_length: Option<usize>,
    /// Characters of passage text echoed back per source
    pub source_preview_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            max_context_length: None,
            source_preview_chars: 200,
        }
    }
}

/// Default location for the CLI config file
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pdf-rag")
        .join("config.toml")
}
