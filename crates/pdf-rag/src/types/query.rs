//! Ingest and query request types

use serde::{Deserialize, Serialize};

use super::document::{DocumentId, SessionId};
use super::point::SearchFilter;
use crate::error::{Error, Result};

/// A document upload
#[derive(Debug, Clone)]
pub struct IngestRequest {
    /// Raw uploaded bytes
    pub data: Vec<u8>,
    /// Original filename, kept for citations
    pub filename: String,
    /// Caller-assigned document id (generated when absent)
    pub doc_id: Option<DocumentId>,
    /// Session the document belongs to
    pub session_id: Option<SessionId>,
}

impl IngestRequest {
    pub fn new(filename: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            data,
            filename: filename.into(),
            doc_id: None,
            session_id: None,
        }
    }

    pub fn with_doc_id(mut self, doc_id: DocumentId) -> Self {
        self.doc_id = Some(doc_id);
        self
    }

    pub fn with_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }
}

/// Question against the indexed documents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    /// The question to answer
    pub query: String,

    /// Restrict retrieval to one session's documents
    #[serde(default)]
    pub session_id: Option<SessionId>,

    /// Restrict retrieval to one document
    #[serde(default)]
    pub doc_id: Option<DocumentId>,

    /// Number of passages to retrieve; `retrieval.top_k` (5) when unset
    #[serde(default)]
    pub top_k: Option<usize>,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            session_id: None,
            doc_id: None,
            top_k: None,
        }
    }

    pub fn with_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn with_doc_id(mut self, doc_id: DocumentId) -> Self {
        self.doc_id = Some(doc_id);
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.query.trim().is_empty() {
            return Err(Error::validation("query must not be empty"));
        }
        if self.top_k == Some(0) {
            return Err(Error::validation("top_k must be at least 1"));
        }
        Ok(())
    }

    /// Payload filter implied by the request
    pub fn filter(&self) -> SearchFilter {
        SearchFilter {
            source_doc_id: self.doc_id.clone(),
            session_id: self.session_id.clone(),
        }
    }
}
