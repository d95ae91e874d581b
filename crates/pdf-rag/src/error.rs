//! Error types for the RAG pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline errors
///
/// Every call into an external capability (embedder, generator, vector index)
/// maps its failures onto exactly one of `Embedding`, `Generation` or
/// `IndexUnavailable`.
#[derive(Debug, Error)]
pub enum Error {
    /// Bad chunking parameters or inconsistent configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Malformed upsert, search or query input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Embedding capability unavailable or returned an unusable vector
    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    /// Generation capability failed
    #[error("Answer generation failed: {0}")]
    Generation(String),

    /// Vector index transport or backend failure
    #[error("Vector index unavailable: {0}")]
    IndexUnavailable(String),

    /// Uploaded document could not be turned into text
    #[error("Failed to parse document '{filename}': {message}")]
    DocumentParse { filename: String, message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse failure cause, used by callers that need to tell stages apart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Validation,
    Ingestion,
    Embedding,
    Indexing,
    Generation,
}

impl Error {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create a generation error
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation(message.into())
    }

    /// Create an index error
    pub fn index_unavailable(message: impl Into<String>) -> Self {
        Self::IndexUnavailable(message.into())
    }

    /// Create a document parse error
    pub fn document_parse(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DocumentParse {
            filename: filename.into(),
            message: message.into(),
        }
    }

    /// Which pipeline stage produced this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Configuration(_) => ErrorKind::Configuration,
            Error::Validation(_) => ErrorKind::Validation,
            Error::Embedding(_) => ErrorKind::Embedding,
            Error::Generation(_) => ErrorKind::Generation,
            Error::IndexUnavailable(_) => ErrorKind::Indexing,
            Error::DocumentParse { .. } | Error::Io(_) => ErrorKind::Ingestion,
        }
    }
}
