//! In-process vector index with exact cosine search

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::types::{
    DistanceMetric, DocumentId, IndexPoint, PointPayload, ScoredPoint, SearchFilter, SessionId,
};

use super::vector_store::{validate_points, validate_search, VectorIndex};

struct StoredPoint {
    /// Insertion sequence, used to break score ties
    seq: u64,
    id: String,
    vector: Vec<f32>,
    norm: f32,
    payload: PointPayload,
}

struct Collection {
    name: String,
    dimension: usize,
    points: Vec<StoredPoint>,
    /// Point id to its position in `points`
    positions: HashMap<String, usize>,
    next_seq: u64,
}

impl Collection {
    fn reindex(&mut self) {
        self.positions = self
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id.clone(), i))
            .collect();
    }
}

/// Exact k-NN over a single in-memory collection
///
/// Every search scans all points, so this suits tests and small corpora.
/// Writes take the lock exclusively, which makes document deletion atomic
/// with respect to concurrent searches.
#[derive(Default)]
pub struct MemoryIndex {
    collection: RwLock<Option<Collection>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn not_initialised() -> Error {
        Error::index_unavailable("collection has not been created; call ensure_collection first")
    }

    fn delete_where<F>(&self, predicate: F) -> Result<usize>
    where
        F: Fn(&PointPayload) -> bool,
    {
        let mut guard = self.collection.write();
        let collection = guard.as_mut().ok_or_else(Self::not_initialised)?;
        let before = collection.points.len();
        collection.points.retain(|p| !predicate(&p.payload));
        let removed = before - collection.points.len();
        if removed > 0 {
            collection.reindex();
        }
        Ok(removed)
    }
}

fn norm(vector: &[f32]) -> f32 {
    vector.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity; zero vectors score 0
fn cosine(a: &[f32], a_norm: f32, b: &[f32], b_norm: f32) -> f32 {
    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let score = dot / (a_norm * b_norm);
    // Overflowing magnitudes can still produce NaN
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(-1.0, 1.0)
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn ensure_collection(
        &self,
        name: &str,
        dimension: usize,
        metric: DistanceMetric,
    ) -> Result<()> {
        if metric != DistanceMetric::Cosine {
            return Err(Error::configuration(format!(
                "memory index only supports cosine distance, got {:?}",
                metric
            )));
        }
        if dimension == 0 {
            return Err(Error::configuration("collection dimension must be greater than 0"));
        }

        let mut guard = self.collection.write();
        match guard.as_ref() {
            Some(existing) if existing.name != name => Err(Error::configuration(format!(
                "memory index already holds collection '{}'",
                existing.name
            ))),
            Some(existing) if existing.dimension != dimension => {
                Err(Error::configuration(format!(
                    "collection '{}' exists with dimension {}, requested {}",
                    name, existing.dimension, dimension
                )))
            }
            Some(_) => Ok(()),
            None => {
                tracing::info!("Created in-memory collection '{}' ({} dims)", name, dimension);
                *guard = Some(Collection {
                    name: name.to_string(),
                    dimension,
                    points: Vec::new(),
                    positions: HashMap::new(),
                    next_seq: 0,
                });
                Ok(())
            }
        }
    }

    async fn upsert(&self, points: Vec<IndexPoint>) -> Result<()> {
        let mut guard = self.collection.write();
        let collection = guard.as_mut().ok_or_else(Self::not_initialised)?;
        validate_points(&points, collection.dimension)?;

        for point in points {
            let norm = norm(&point.vector);
            if let Some(&pos) = collection.positions.get(&point.id) {
                let existing = &mut collection.points[pos];
                existing.vector = point.vector;
                existing.norm = norm;
                existing.payload = point.payload;
                continue;
            }
            let seq = collection.next_seq;
            collection.next_seq += 1;
            collection.positions.insert(point.id.clone(), collection.points.len());
            collection.points.push(StoredPoint {
                seq,
                id: point.id,
                vector: point.vector,
                norm,
                payload: point.payload,
            });
        }

        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<ScoredPoint>> {
        let guard = self.collection.read();
        let collection = guard.as_ref().ok_or_else(Self::not_initialised)?;
        validate_search(query_vector, k, collection.dimension)?;

        let query_norm = norm(query_vector);
        let mut scored: Vec<(f32, &StoredPoint)> = collection
            .points
            .iter()
            .filter(|p| filter.map_or(true, |f| f.matches(&p.payload)))
            .map(|p| (cosine(query_vector, query_norm, &p.vector, p.norm), p))
            .collect();

        scored.sort_by(|(a_score, a), (b_score, b)| {
            b_score.total_cmp(a_score).then(a.seq.cmp(&b.seq))
        });
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(score, p)| ScoredPoint {
                id: p.id.clone(),
                payload: p.payload.clone(),
                score,
            })
            .collect())
    }

    async fn delete_by_document(&self, doc_id: &DocumentId) -> Result<usize> {
        self.delete_where(|payload| &payload.source_doc_id == doc_id)
    }

    async fn delete_by_session(&self, session_id: &SessionId) -> Result<usize> {
        self.delete_where(|payload| payload.session_id.as_ref() == Some(session_id))
    }

    async fn count(&self, filter: Option<&SearchFilter>) -> Result<usize> {
        let guard = self.collection.read();
        let collection = guard.as_ref().ok_or_else(Self::not_initialised)?;
        Ok(collection
            .points
            .iter()
            .filter(|p| filter.map_or(true, |f| f.matches(&p.payload)))
            .count())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "memory"
    }
}
