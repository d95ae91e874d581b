//! Provider abstractions for embeddings, answer generation and vector storage
//!
//! Capabilities are trait objects so the pipeline can run against Ollama,
//! Gemini and Qdrant in production and against in-process fakes in tests.

pub mod embedding;
pub mod gemini;
pub mod llm;
pub mod memory;
pub mod ollama;
pub mod qdrant;
pub mod retry;
pub mod vector_store;

use std::sync::Arc;
use std::time::Duration;

use crate::config::{EmbeddingConfig, GeneratorProvider, IndexBackend, LlmConfig, VectorDbConfig};
use crate::error::Result;

pub use embedding::EmbeddingProvider;
pub use gemini::GeminiGenerator;
pub use llm::Generator;
pub use memory::MemoryIndex;
pub use ollama::{OllamaEmbedder, OllamaGenerator};
pub use qdrant::QdrantIndex;
pub use retry::{RetryPolicy, RetryingEmbedder, RetryingGenerator};
pub use vector_store::VectorIndex;

/// Build the configured embedder
pub fn build_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    Ok(Arc::new(OllamaEmbedder::new(config)?))
}

/// Build the configured generator, wrapped in a retry policy when
/// `llm.max_retries` is non-zero
pub fn build_generator(config: &LlmConfig) -> Result<Arc<dyn Generator>> {
    let generator: Arc<dyn Generator> = match config.provider {
        GeneratorProvider::Gemini => Arc::new(GeminiGenerator::new(config)?),
        GeneratorProvider::Ollama => Arc::new(OllamaGenerator::new(config)?),
    };

    if config.max_retries == 0 {
        return Ok(generator);
    }
    let policy = RetryPolicy::new(config.max_retries, Duration::from_secs(1));
    Ok(Arc::new(RetryingGenerator::new(generator, policy)))
}

/// Build the configured vector index
pub fn build_index(config: &VectorDbConfig) -> Result<Arc<dyn VectorIndex>> {
    Ok(match config.backend {
        IndexBackend::Memory => Arc::new(MemoryIndex::new()),
        IndexBackend::Qdrant => Arc::new(QdrantIndex::new(config)?),
    })
}
