//! Embedding provider trait for generating text embeddings

use async_trait::async_trait;
use crate::error::{Error, Result};

/// Trait for generating text embeddings
///
/// Implementations:
/// - `OllamaEmbedder`: Local Ollama server (all-minilm)
///
/// Implementations are expected to be deterministic for a given model
/// version and to report failures as `Error::Embedding`.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts (batch)
    ///
    /// Default implementation calls `embed` sequentially.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    /// Embedding dimensions (384 for all-minilm)
    fn dimensions(&self) -> usize;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}

/// Reject vectors whose length differs from the expected dimension
pub fn check_dimensions(vector: &[f32], expected: usize, provider: &str) -> Result<()> {
    if vector.len() != expected {
        return Err(Error::embedding(format!(
            "{} returned a {}-dimensional vector, expected {}",
            provider,
            vector.len(),
            expected
        )));
    }
    Ok(())
}
