//! In-process capability fakes for unit tests

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::providers::{EmbeddingProvider, Generator, MemoryIndex, VectorIndex};
use crate::types::{DistanceMetric, DocumentId, IndexPoint, ScoredPoint, SearchFilter, SessionId};

/// Deterministic embedder: one dimension per keyword counting its
/// occurrences, plus a constant bias dimension so no vector is zero
pub struct KeywordEmbedder {
    keywords: Vec<&'static str>,
    /// Report this many dimensions instead of the real vector length
    pub claimed_dimensions: Option<usize>,
    pub calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn new(keywords: &[&'static str]) -> Self {
        Self {
            keywords: keywords.to_vec(),
            claimed_dimensions: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let mut vector: Vec<f32> = self
            .keywords
            .iter()
            .map(|k| lower.matches(k).count() as f32)
            .collect();
        vector.push(0.1);
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.vector(text))
    }

    fn dimensions(&self) -> usize {
        self.claimed_dimensions.unwrap_or(self.keywords.len() + 1)
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

/// Embedder that always fails, optionally after a delay
pub struct FailingEmbedder {
    pub dimensions: usize,
    pub delay: Option<Duration>,
}

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Err(Error::embedding("embedding service unavailable"))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(false)
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Generator that echoes the number of context blocks, or fails on demand
pub struct RecordingGenerator {
    pub fail: bool,
    pub delay: Option<Duration>,
    pub calls: AtomicUsize,
}

impl RecordingGenerator {
    pub fn new() -> Self {
        Self {
            fail: false,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    /// Answers normally, but only after `delay`
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Generator for RecordingGenerator {
    async fn generate(&self, question: &str, context: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(Error::generation("model call failed"));
        }
        let blocks = context.split("\n\n[").count();
        Ok(format!("{} ({} blocks)", question, blocks))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(!self.fail)
    }

    fn name(&self) -> &str {
        "recording"
    }

    fn model(&self) -> &str {
        "recording-1"
    }
}

/// Memory index that stalls for `delay` before every operation
pub struct SlowIndex {
    pub inner: MemoryIndex,
    pub delay: Duration,
}

impl SlowIndex {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MemoryIndex::new(),
            delay,
        }
    }
}

#[async_trait]
impl VectorIndex for SlowIndex {
    async fn ensure_collection(
        &self,
        name: &str,
        dimension: usize,
        metric: DistanceMetric,
    ) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.ensure_collection(name, dimension, metric).await
    }

    async fn upsert(&self, points: Vec<IndexPoint>) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.upsert(points).await
    }

    async fn search(
        &self,
        query_vector: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<ScoredPoint>> {
        tokio::time::sleep(self.delay).await;
        self.inner.search(query_vector, k, filter).await
    }

    async fn delete_by_document(&self, doc_id: &DocumentId) -> Result<usize> {
        tokio::time::sleep(self.delay).await;
        self.inner.delete_by_document(doc_id).await
    }

    async fn delete_by_session(&self, session_id: &SessionId) -> Result<usize> {
        tokio::time::sleep(self.delay).await;
        self.inner.delete_by_session(session_id).await
    }

    async fn count(&self, filter: Option<&SearchFilter>) -> Result<usize> {
        self.inner.count(filter).await
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "slow"
    }
}
