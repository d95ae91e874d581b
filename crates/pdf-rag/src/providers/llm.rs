//! Generator trait for producing answers

use async_trait::async_trait;
use crate::error::Result;

/// Trait for LLM-based answer generation
///
/// Implementations:
/// - `GeminiGenerator`: Google Generative Language API (gemini-2.5-flash)
/// - `OllamaGenerator`: Local Ollama server
///
/// Any transport or model failure is reported as `Error::Generation`.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate an answer to `question` grounded in the assembled `context`
    async fn generate(&self, question: &str, context: &str) -> Result<String>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}
