//! Index point types shared by every vector index backend

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::document::{Chunk, DocumentId, SessionId};
use crate::error::{Error, Result};

/// Distance metric of a collection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum DistanceMetric {
    #[default]
    Cosine,
    Dot,
    Euclid,
}

impl DistanceMetric {
    /// Name used by the Qdrant API
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cosine => "Cosine",
            Self::Dot => "Dot",
            Self::Euclid => "Euclid",
        }
    }
}

/// Payload stored next to every vector
///
/// Field names double as the payload keys on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointPayload {
    pub text: String,
    pub page: u32,
    pub source_doc_id: DocumentId,
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
}

impl PointPayload {
    /// Build the payload for a chunk
    pub fn from_chunk(chunk: &Chunk, filename: &str, session_id: Option<&SessionId>) -> Self {
        Self {
            text: chunk.text.clone(),
            page: chunk.page,
            source_doc_id: chunk.source_doc_id.clone(),
            filename: filename.to_string(),
            session_id: session_id.cloned(),
        }
    }

    /// Reject payloads that could not back a citation
    pub fn validate(&self) -> Result<()> {
        if self.text.trim().is_empty() {
            return Err(Error::validation("payload text is empty"));
        }
        if self.filename.trim().is_empty() {
            return Err(Error::validation("payload filename is empty"));
        }
        if self.page == 0 {
            return Err(Error::validation("payload page must be >= 1"));
        }
        if self.source_doc_id.as_str().trim().is_empty() {
            return Err(Error::validation("payload source_doc_id is empty"));
        }
        Ok(())
    }
}

/// A vector plus its payload
#[derive(Debug, Clone, PartialEq)]
pub struct IndexPoint {
    /// Unique point id (UUID string)
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: PointPayload,
}

impl IndexPoint {
    /// Create a point with a fresh id
    pub fn new(vector: Vec<f32>, payload: PointPayload) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            vector,
            payload,
        }
    }
}

/// A search hit
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPoint {
    pub id: String,
    pub payload: PointPayload,
    /// Cosine similarity in [-1, 1]
    pub score: f32,
}

/// Equality predicates on payload fields, combined with AND
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilter {
    pub source_doc_id: Option<DocumentId>,
    pub session_id: Option<SessionId>,
}

impl SearchFilter {
    pub fn document(doc_id: DocumentId) -> Self {
        Self {
            source_doc_id: Some(doc_id),
            session_id: None,
        }
    }

    pub fn session(session_id: SessionId) -> Self {
        Self {
            source_doc_id: None,
            session_id: Some(session_id),
        }
    }

    /// True when no predicate is set
    pub fn is_empty(&self) -> bool {
        self.source_doc_id.is_none() && self.session_id.is_none()
    }

    pub fn matches(&self, payload: &PointPayload) -> bool {
        if let Some(doc_id) = &self.source_doc_id {
            if &payload.source_doc_id != doc_id {
                return false;
            }
        }
        if let Some(session_id) = &self.session_id {
            if payload.session_id.as_ref() != Some(session_id) {
                return false;
            }
        }
        true
    }
}
