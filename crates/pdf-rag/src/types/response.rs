//! Response types for retrieval, queries and ingestion

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::document::{DocumentId, SessionId};
use super::point::ScoredPoint;

/// A retrieved passage with its provenance and similarity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub text: String,
    pub filename: String,
    pub page: u32,
    /// Cosine similarity in [-1, 1]
    pub score: f32,
}

impl From<ScoredPoint> for RetrievalResult {
    fn from(point: ScoredPoint) -> Self {
        Self {
            text: point.payload.text,
            filename: point.payload.filename,
            page: point.payload.page,
            score: point.score,
        }
    }
}

/// Provenance of one block in an assembled context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub filename: String,
    pub page: u32,
    pub score: f32,
}

impl Citation {
    pub fn from_result(result: &RetrievalResult) -> Self {
        Self {
            filename: result.filename.clone(),
            page: result.page,
            score: result.score,
        }
    }

    /// Label used in the prompt context, e.g. `[report.pdf, Page 3]`
    pub fn label(&self) -> String {
        format!("[{}, Page {}]", self.filename, self.page)
    }
}

/// Source passage returned to the caller alongside an answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub filename: String,
    pub page: u32,
    /// Leading characters of the passage
    pub text: String,
}

impl Source {
    /// Project a result, keeping at most `preview_chars` characters of text
    pub fn from_result(result: &RetrievalResult, preview_chars: usize) -> Self {
        Self {
            filename: result.filename.clone(),
            page: result.page,
            text: result.text.chars().take(preview_chars).collect(),
        }
    }
}

/// Answer to a query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<Source>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
}

/// Outcome of ingesting one document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub doc_id: DocumentId,
    pub filename: String,
    pub chunk_count: usize,
    pub page_count: usize,
    pub content_hash: String,
    pub ingested_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_preview_counts_characters() {
        let result = RetrievalResult {
            text: "é".repeat(300),
            filename: "a.pdf".to_string(),
            page: 2,
            score: 0.5,
        };

        let source = Source::from_result(&result, 200);
        assert_eq!(source.text.chars().count(), 200);
        assert_eq!(source.page, 2);
    }

    #[test]
    fn test_citation_label() {
        let citation = Citation {
            filename: "manual.pdf".to_string(),
            page: 12,
            score: 0.9,
        };
        assert_eq!(citation.label(), "[manual.pdf, Page 12]");
    }
}
