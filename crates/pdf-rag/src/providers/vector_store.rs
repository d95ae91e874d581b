//! Vector index trait for storing and searching embeddings

use async_trait::async_trait;
use crate::error::{Error, Result};
use crate::types::{DistanceMetric, DocumentId, IndexPoint, ScoredPoint, SearchFilter, SessionId};

/// Trait for vector storage and similarity search
///
/// Implementations:
/// - `MemoryIndex`: in-process exact cosine search
/// - `QdrantIndex`: Qdrant over its REST API
///
/// Implementations synchronise internally; callers share them behind an `Arc`
/// without extra locking.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create the collection if it does not exist yet
    async fn ensure_collection(
        &self,
        name: &str,
        dimension: usize,
        metric: DistanceMetric,
    ) -> Result<()>;

    /// Insert points; a batch with any invalid point is rejected whole
    async fn upsert(&self, points: Vec<IndexPoint>) -> Result<()>;

    /// Up to `k` nearest points by descending similarity
    async fn search(
        &self,
        query_vector: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<ScoredPoint>>;

    /// Delete all points of a document, returning how many were removed
    async fn delete_by_document(&self, doc_id: &DocumentId) -> Result<usize>;

    /// Delete all points of a session, returning how many were removed
    async fn delete_by_session(&self, session_id: &SessionId) -> Result<usize>;

    /// Number of points matching the filter
    async fn count(&self, filter: Option<&SearchFilter>) -> Result<usize>;

    /// Check if the backend is reachable
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}

/// Checks shared by every backend before an upsert touches storage
pub fn validate_points(points: &[IndexPoint], dimension: usize) -> Result<()> {
    if points.is_empty() {
        return Err(Error::validation("upsert requires at least one point"));
    }

    for point in points {
        point.payload.validate().map_err(|e| {
            Error::validation(format!("point {}: {}", point.id, e))
        })?;
    }

    let non_finite: Vec<&str> = points
        .iter()
        .filter(|p| p.vector.iter().any(|x| !x.is_finite()))
        .map(|p| p.id.as_str())
        .collect();
    if !non_finite.is_empty() {
        return Err(Error::validation(format!(
            "{} of {} points have NaN or infinite components: {}",
            non_finite.len(),
            points.len(),
            non_finite.join(", ")
        )));
    }

    let mismatched: Vec<&str> = points
        .iter()
        .filter(|p| p.vector.len() != dimension)
        .map(|p| p.id.as_str())
        .collect();
    if !mismatched.is_empty() {
        return Err(Error::validation(format!(
            "{} of {} points do not have dimension {}: {}",
            mismatched.len(),
            points.len(),
            dimension,
            mismatched.join(", ")
        )));
    }

    Ok(())
}

/// Checks shared by every backend before a search
pub fn validate_search(query_vector: &[f32], k: usize, dimension: usize) -> Result<()> {
    if k == 0 {
        return Err(Error::validation("k must be at least 1"));
    }
    if query_vector.len() != dimension {
        return Err(Error::validation(format!(
            "query vector has dimension {}, collection expects {}",
            query_vector.len(),
            dimension
        )));
    }
    if query_vector.iter().any(|x| !x.is_finite()) {
        return Err(Error::validation("query vector has NaN or infinite components"));
    }
    Ok(())
}
