//! Query embedding plus nearest-neighbor search

use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::error::{Error, Result};
use crate::providers::embedding::check_dimensions;
use crate::providers::{EmbeddingProvider, VectorIndex};
use crate::types::{RetrievalResult, SearchFilter};

const DEFAULT_EMBED_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_SEARCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Embeds a question and returns the index's ranked passages for it
///
/// Ordering is exactly the index's descending-similarity order; there is no
/// re-ranking. An empty result means nothing matched and is not an error.
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    embed_timeout: Duration,
    search_timeout: Duration,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            embedder,
            index,
            embed_timeout: DEFAULT_EMBED_TIMEOUT,
            search_timeout: DEFAULT_SEARCH_TIMEOUT,
        }
    }

    /// Override the per-call timeouts
    pub fn with_timeouts(mut self, embed_timeout: Duration, search_timeout: Duration) -> Self {
        self.embed_timeout = embed_timeout;
        self.search_timeout = search_timeout;
        self
    }

    /// Up to `k` passages most similar to `query`
    pub async fn retrieve(
        &self,
        query: &str,
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<RetrievalResult>> {
        if query.trim().is_empty() {
            return Err(Error::validation("query text must not be empty"));
        }

        let query_vector = timeout(self.embed_timeout, self.embedder.embed(query))
            .await
            .map_err(|_| {
                Error::embedding(format!(
                    "{} did not respond within {:?}",
                    self.embedder.name(),
                    self.embed_timeout
                ))
            })??;
        check_dimensions(&query_vector, self.embedder.dimensions(), self.embedder.name())?;

        let filter = filter.filter(|f| !f.is_empty());
        let hits = timeout(self.search_timeout, self.index.search(&query_vector, k, filter))
            .await
            .map_err(|_| {
                Error::index_unavailable(format!(
                    "{} search did not complete within {:?}",
                    self.index.name(),
                    self.search_timeout
                ))
            })??;

        tracing::debug!("Retrieved {} passages (k={})", hits.len(), k);

        Ok(hits.into_iter().map(RetrievalResult::from).collect())
    }
}
