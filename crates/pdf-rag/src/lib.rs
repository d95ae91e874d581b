//! pdf-rag: document question answering with page-level citations
//!
//! Documents are parsed into pages, split into overlapping character windows,
//! embedded and stored in a vector index. Questions are answered by retrieving
//! the most similar passages, assembling them into a labelled context and
//! asking a language model to answer from that context alone.
//!
//! Embedding, generation and vector storage are pluggable capabilities
//! (`EmbeddingProvider`, `Generator`, `VectorIndex`) injected into
//! [`RagPipeline`].

pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod pipeline;
pub mod providers;
pub mod retrieval;
pub mod types;

#[cfg(test)]
mod testing;

pub use config::RagConfig;
pub use error::{Error, ErrorKind, Result};
pub use pipeline::{RagPipeline, NO_RELEVANT_INFORMATION};
pub use types::{
    Chunk, DocumentId, IngestReport, IngestRequest, QueryRequest, QueryResponse, RetrievalResult,
    SessionId, Source,
};
