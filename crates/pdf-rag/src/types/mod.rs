//! Core types for the RAG pipeline

pub mod document;
pub mod point;
pub mod query;
pub mod response;

pub use document::{Chunk, DocumentId, FileType, PageText, ParsedDocument, SessionId};
pub use point::{DistanceMetric, IndexPoint, PointPayload, ScoredPoint, SearchFilter};
pub use query::{IngestRequest, QueryRequest};
pub use response::{Citation, IngestReport, QueryResponse, RetrievalResult, Source};
