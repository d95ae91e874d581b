//! Pipeline orchestration: ingestion and question answering

use std::sync::Arc;
use std::time::Instant;
use tokio::time::timeout;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::generation::ContextAssembler;
use crate::ingestion::{DocumentParser, TextChunker};
use crate::providers::embedding::check_dimensions;
use crate::providers::{self, EmbeddingProvider, Generator, VectorIndex};
use crate::retrieval::Retriever;
use crate::types::{
    DistanceMetric, DocumentId, IndexPoint, IngestReport, IngestRequest, PointPayload,
    QueryRequest, QueryResponse, SessionId, Source,
};

/// Answer returned when retrieval finds nothing; the generator is not called
pub const NO_RELEVANT_INFORMATION: &str = "No relevant information found in the documents.";

/// Wires chunking, embedding, indexing, retrieval and generation together
///
/// Capabilities are injected so any combination of backends (or test fakes)
/// can be used. The only shared mutable state is the vector index.
pub struct RagPipeline {
    config: RagConfig,
    chunker: TextChunker,
    retriever: Retriever,
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn Generator>,
    index: Arc<dyn VectorIndex>,
}

impl RagPipeline {
    /// Create a pipeline from explicit capabilities
    pub fn new(
        config: RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn Generator>,
        index: Arc<dyn VectorIndex>,
    ) -> Result<Self> {
        config.validate()?;
        if embedder.dimensions() != config.embeddings.dimensions {
            return Err(Error::configuration(format!(
                "embedder {} produces {} dimensions, configured {}",
                embedder.name(),
                embedder.dimensions(),
                config.embeddings.dimensions
            )));
        }

        let chunker = TextChunker::from_config(&config.chunking)?;
        let retriever = Retriever::new(Arc::clone(&embedder), Arc::clone(&index))
            .with_timeouts(config.embeddings.timeout(), config.vector_db.timeout());

        Ok(Self {
            config,
            chunker,
            retriever,
            embedder,
            generator,
            index,
        })
    }

    /// Create a pipeline with the backends selected by `config`
    pub fn from_config(config: RagConfig) -> Result<Self> {
        let embedder = providers::build_embedder(&config.embeddings)?;
        let generator = providers::build_generator(&config.llm)?;
        let index = providers::build_index(&config.vector_db)?;

        tracing::info!(
            "Pipeline backends: embedder={}, generator={} ({}), index={}",
            embedder.name(),
            generator.name(),
            generator.model(),
            index.name()
        );

        Self::new(config, embedder, generator, index)
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Create the configured collection if it does not exist
    pub async fn init(&self) -> Result<()> {
        let name = &self.config.vector_db.collection;
        let dimension = self.config.embeddings.dimensions;

        timeout(
            self.config.vector_db.timeout(),
            self.index.ensure_collection(name, dimension, DistanceMetric::Cosine),
        )
        .await
        .map_err(|_| self.index_timeout("ensure_collection"))??;

        tracing::info!("Collection '{}' ready ({} dims, {})", name, dimension, self.index.name());
        Ok(())
    }

    /// Parse, chunk, embed and index one document
    ///
    /// All-or-nothing: nothing reaches the index unless every chunk was
    /// embedded, and the points go in as a single upsert.
    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestReport> {
        let start = Instant::now();
        let IngestRequest {
            data,
            filename,
            doc_id,
            session_id,
        } = request;
        let doc_id = doc_id.unwrap_or_else(DocumentId::generate);

        tracing::info!("Ingesting '{}' as document {}", filename, doc_id);

        // PDF extraction is CPU-bound
        let parse_name = filename.clone();
        let document = tokio::task::spawn_blocking(move || DocumentParser::parse(&parse_name, &data))
            .await
            .map_err(|e| Error::document_parse(&filename, format!("parser task failed: {}", e)))??;

        let chunks = self.chunker.process(&document, &doc_id)?;
        if chunks.is_empty() {
            return Err(Error::validation(format!(
                "'{}' contains no extractable text",
                filename
            )));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embed_all(&texts).await?;

        let points: Vec<IndexPoint> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| {
                IndexPoint::new(vector, PointPayload::from_chunk(chunk, &filename, session_id.as_ref()))
            })
            .collect();

        timeout(self.config.vector_db.timeout(), self.index.upsert(points))
            .await
            .map_err(|_| self.index_timeout("upsert"))??;

        tracing::info!(
            "Ingested '{}': {} pages, {} chunks in {}ms",
            filename,
            document.page_count(),
            chunks.len(),
            start.elapsed().as_millis()
        );

        Ok(IngestReport {
            doc_id,
            filename,
            chunk_count: chunks.len(),
            page_count: document.page_count(),
            content_hash: document.content_hash,
            ingested_at: chrono::Utc::now(),
        })
    }

    /// Embed texts batch by batch, checking count and dimension of every vector
    async fn embed_all(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let embed_timeout = self.config.embeddings.timeout();
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.config.embeddings.batch_size) {
            let embedded = timeout(embed_timeout, self.embedder.embed_batch(batch))
                .await
                .map_err(|_| {
                    Error::embedding(format!(
                        "{} did not respond within {:?}",
                        self.embedder.name(),
                        embed_timeout
                    ))
                })??;

            if embedded.len() != batch.len() {
                return Err(Error::embedding(format!(
                    "{} returned {} vectors for {} texts",
                    self.embedder.name(),
                    embedded.len(),
                    batch.len()
                )));
            }
            for vector in &embedded {
                check_dimensions(vector, self.config.embeddings.dimensions, self.embedder.name())?;
            }
            vectors.extend(embedded);
        }

        Ok(vectors)
    }

    /// Answer a question from the indexed documents
    pub async fn query(&self, request: QueryRequest) -> Result<QueryResponse> {
        let start = Instant::now();
        request.validate()?;

        tracing::info!("Query: \"{}\"", request.query);

        let top_k = request.top_k.unwrap_or(self.config.retrieval.top_k);
        let filter = request.filter();
        let results = self
            .retriever
            .retrieve(&request.query, top_k, Some(&filter))
            .await?;

        let assembled =
            ContextAssembler::assemble(&results, self.config.retrieval.max_context_length);
        if assembled.is_empty() {
            tracing::info!("No relevant passages found");
            return Ok(QueryResponse {
                answer: NO_RELEVANT_INFORMATION.to_string(),
                sources: Vec::new(),
                session_id: request.session_id,
            });
        }

        let generation_timeout = self.config.llm.timeout();
        let answer = timeout(
            generation_timeout,
            self.generator.generate(&request.query, &assembled.context),
        )
        .await
        .map_err(|_| {
            Error::generation(format!(
                "{} did not answer within {:?}",
                self.generator.name(),
                generation_timeout
            ))
        })??;

        let preview = self.config.retrieval.source_preview_chars;
        let sources: Vec<Source> = results.iter().map(|r| Source::from_result(r, preview)).collect();

        tracing::info!(
            "Query completed in {}ms, {} sources",
            start.elapsed().as_millis(),
            sources.len()
        );

        Ok(QueryResponse {
            answer,
            sources,
            session_id: request.session_id,
        })
    }

    /// Remove every point of a document
    pub async fn delete_document(&self, doc_id: &DocumentId) -> Result<usize> {
        let removed = timeout(self.config.vector_db.timeout(), self.index.delete_by_document(doc_id))
            .await
            .map_err(|_| self.index_timeout("delete"))??;
        tracing::info!("Deleted {} points of document {}", removed, doc_id);
        Ok(removed)
    }

    /// Remove every point of a session
    pub async fn delete_session(&self, session_id: &SessionId) -> Result<usize> {
        let removed = timeout(self.config.vector_db.timeout(), self.index.delete_by_session(session_id))
            .await
            .map_err(|_| self.index_timeout("delete"))??;
        tracing::info!("Deleted {} points of session {}", removed, session_id);
        Ok(removed)
    }

    fn index_timeout(&self, operation: &str) -> Error {
        Error::index_unavailable(format!(
            "{} {} did not complete within {:?}",
            self.index.name(),
            operation,
            self.config.vector_db.timeout()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::providers::MemoryIndex;
    use crate::testing::{FailingEmbedder, KeywordEmbedder, RecordingGenerator, SlowIndex};
    use crate::types::SearchFilter;
    use std::time::Duration;

    const STALL: Duration = Duration::from_secs(5);

    const KEYWORDS: &[&str] = &["warranty", "battery", "shipping"];

    fn test_config() -> RagConfig {
        let mut config = RagConfig::default();
        config.chunking.chunk_size = 60;
        config.chunking.chunk_overlap = 10;
        config.embeddings.dimensions = KEYWORDS.len() + 1;
        config.embeddings.batch_size = 2;
        config
    }

    struct Harness {
        pipeline: RagPipeline,
        index: Arc<MemoryIndex>,
        generator: Arc<RecordingGenerator>,
    }

    async fn harness_with(embedder: Arc<dyn EmbeddingProvider>, generator: RecordingGenerator) -> Harness {
        let index = Arc::new(MemoryIndex::new());
        let generator = Arc::new(generator);
        let pipeline = RagPipeline::new(test_config(), embedder, generator.clone(), index.clone()).unwrap();
        pipeline.init().await.unwrap();
        Harness {
            pipeline,
            index,
            generator,
        }
    }

    async fn harness() -> Harness {
        harness_with(Arc::new(KeywordEmbedder::new(KEYWORDS)), RecordingGenerator::new()).await
    }

    fn text_doc(name: &str, body: &str) -> IngestRequest {
        IngestRequest::new(name, body.as_bytes().to_vec())
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_configuration_error() {
        let mut config = test_config();
        config.embeddings.dimensions = 384;
        let result = RagPipeline::new(
            config,
            Arc::new(KeywordEmbedder::new(KEYWORDS)),
            Arc::new(RecordingGenerator::new()),
            Arc::new(MemoryIndex::new()),
        );
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[tokio::test]
    async fn test_empty_collection_answers_without_generator() {
        let h = harness().await;

        let response = h.pipeline.query(QueryRequest::new("What is the warranty?")).await.unwrap();
        assert_eq!(response.answer, NO_RELEVANT_INFORMATION);
        assert!(response.sources.is_empty());
        assert_eq!(h.generator.call_count(), 0);
    }

    #[tokio::test]
    async fn test_ingest_then_query() {
        let h = harness().await;

        let report = h
            .pipeline
            .ingest(
                text_doc(
                    "terms.txt",
                    "Warranty covers two years of normal use.\u{000C}Shipping takes about one week.",
                )
                .with_doc_id(DocumentId::new("terms")),
            )
            .await
            .unwrap();
        assert_eq!(report.doc_id.as_str(), "terms");
        assert_eq!(report.page_count, 2);
        assert_eq!(report.chunk_count, 2);
        assert_eq!(report.content_hash.len(), 64);
        assert_eq!(h.index.count(None).await.unwrap(), 2);

        let response = h
            .pipeline
            .query(QueryRequest::new("How long is the warranty?").with_top_k(1))
            .await
            .unwrap();
        assert_eq!(response.answer, "How long is the warranty? (1 blocks)");
        assert_eq!(response.sources.len(), 1);
        assert_eq!(response.sources[0].filename, "terms.txt");
        assert_eq!(response.sources[0].page, 1);
        assert_eq!(h.generator.call_count(), 1);
    }

    #[tokio::test]
    async fn test_source_preview_is_truncated() {
        let h = harness().await;
        let long_page = format!("Warranty {}", "terms apply ".repeat(40));
        let mut config = test_config();
        config.chunking.chunk_size = 400;
        config.chunking.chunk_overlap = 0;
        let pipeline = RagPipeline::new(
            config,
            Arc::new(KeywordEmbedder::new(KEYWORDS)),
            h.generator.clone(),
            h.index.clone(),
        )
        .unwrap();

        pipeline.ingest(text_doc("long.txt", &long_page)).await.unwrap();
        let response = pipeline.query(QueryRequest::new("warranty")).await.unwrap();
        assert!(response.sources.iter().all(|s| s.text.chars().count() <= 200));
        assert_eq!(response.sources[0].text.chars().count(), 200);
    }

    #[tokio::test]
    async fn test_unmatched_document_filter() {
        let h = harness().await;
        h.pipeline
            .ingest(text_doc("terms.txt", "Warranty covers two years."))
            .await
            .unwrap();

        let response = h
            .pipeline
            .query(QueryRequest::new("warranty").with_doc_id(DocumentId::new("not-indexed")))
            .await
            .unwrap();
        assert_eq!(response.answer, NO_RELEVANT_INFORMATION);
        assert_eq!(h.generator.call_count(), 0);
    }

    #[tokio::test]
    async fn test_session_isolation() {
        let h = harness().await;
        h.pipeline
            .ingest(text_doc("a.txt", "Warranty for session one.").with_session(SessionId::new("s1")))
            .await
            .unwrap();
        h.pipeline
            .ingest(text_doc("b.txt", "Warranty for session two.").with_session(SessionId::new("s2")))
            .await
            .unwrap();

        let response = h
            .pipeline
            .query(QueryRequest::new("warranty").with_session(SessionId::new("s1")))
            .await
            .unwrap();
        assert_eq!(response.sources.len(), 1);
        assert_eq!(response.sources[0].filename, "a.txt");
        assert_eq!(response.session_id, Some(SessionId::new("s1")));

        assert_eq!(h.pipeline.delete_session(&SessionId::new("s2")).await.unwrap(), 1);
        assert_eq!(h.index.count(None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_document() {
        let h = harness().await;
        let report = h
            .pipeline
            .ingest(text_doc("terms.txt", "Warranty covers two years.\u{000C}Battery lasts ten hours."))
            .await
            .unwrap();

        assert_eq!(h.pipeline.delete_document(&report.doc_id).await.unwrap(), 2);
        let filter = SearchFilter::document(report.doc_id.clone());
        assert_eq!(h.index.count(Some(&filter)).await.unwrap(), 0);

        let response = h.pipeline.query(QueryRequest::new("warranty")).await.unwrap();
        assert_eq!(response.answer, NO_RELEVANT_INFORMATION);
    }

    #[tokio::test]
    async fn test_failed_embedding_indexes_nothing() {
        let h = harness_with(
            Arc::new(FailingEmbedder {
                dimensions: KEYWORDS.len() + 1,
                delay: None,
            }),
            RecordingGenerator::new(),
        )
        .await;

        let err = h
            .pipeline
            .ingest(text_doc("terms.txt", "Warranty covers two years."))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Embedding);
        assert_eq!(h.index.count(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_wrong_vector_length_indexes_nothing() {
        let mut embedder = KeywordEmbedder::new(&["warranty"]);
        embedder.claimed_dimensions = Some(KEYWORDS.len() + 1);
        let h = harness_with(Arc::new(embedder), RecordingGenerator::new()).await;

        let err = h
            .pipeline
            .ingest(text_doc("terms.txt", "Warranty covers two years."))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
        assert_eq!(h.index.count(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unreadable_documents() {
        let h = harness().await;

        let err = h.pipeline.ingest(text_doc("slides.pptx", "data")).await.unwrap_err();
        assert!(matches!(err, Error::DocumentParse { .. }));
        assert_eq!(err.kind(), ErrorKind::Ingestion);

        let err = h.pipeline.ingest(text_doc("blank.txt", "   \n\t ")).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(h.index.count(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_generation_failure_is_distinct() {
        let h = harness_with(Arc::new(KeywordEmbedder::new(KEYWORDS)), RecordingGenerator::failing()).await;
        h.pipeline
            .ingest(text_doc("terms.txt", "Warranty covers two years."))
            .await
            .unwrap();

        let err = h.pipeline.query(QueryRequest::new("warranty")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Generation);
        assert_eq!(h.generator.call_count(), 1);
    }

    #[tokio::test]
    async fn test_configured_top_k_is_the_default() {
        let mut config = test_config();
        config.retrieval.top_k = 1;
        let pipeline = RagPipeline::new(
            config,
            Arc::new(KeywordEmbedder::new(KEYWORDS)),
            Arc::new(RecordingGenerator::new()),
            Arc::new(MemoryIndex::new()),
        )
        .unwrap();
        pipeline.init().await.unwrap();
        pipeline
            .ingest(text_doc("terms.txt", "Warranty one.\u{000C}Warranty two.\u{000C}Warranty three."))
            .await
            .unwrap();

        let response = pipeline.query(QueryRequest::new("warranty")).await.unwrap();
        assert_eq!(response.sources.len(), 1);

        let response = pipeline
            .query(QueryRequest::new("warranty").with_top_k(3))
            .await
            .unwrap();
        assert_eq!(response.sources.len(), 3);
    }

    fn slow_index_pipeline() -> RagPipeline {
        let mut config = test_config();
        config.vector_db.timeout_secs = 1;
        RagPipeline::new(
            config,
            Arc::new(KeywordEmbedder::new(KEYWORDS)),
            Arc::new(RecordingGenerator::new()),
            Arc::new(SlowIndex::new(STALL)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_stalled_index_on_init_and_ingest() {
        let pipeline = slow_index_pipeline();

        let err = pipeline.init().await.unwrap_err();
        assert!(matches!(err, Error::IndexUnavailable(_)));

        let err = pipeline
            .ingest(text_doc("terms.txt", "Warranty covers two years."))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Indexing);
    }

    #[tokio::test]
    async fn test_stalled_index_on_query() {
        let pipeline = slow_index_pipeline();

        let err = pipeline.query(QueryRequest::new("warranty")).await.unwrap_err();
        assert!(matches!(err, Error::IndexUnavailable(_)));
    }

    #[tokio::test]
    async fn test_stalled_generator_on_query() {
        let index = Arc::new(MemoryIndex::new());
        let generator = Arc::new(RecordingGenerator::slow(STALL));
        let mut config = test_config();
        config.llm.timeout_secs = 1;
        let pipeline = RagPipeline::new(
            config,
            Arc::new(KeywordEmbedder::new(KEYWORDS)),
            generator.clone(),
            index.clone(),
        )
        .unwrap();
        pipeline.init().await.unwrap();
        pipeline
            .ingest(text_doc("terms.txt", "Warranty covers two years."))
            .await
            .unwrap();

        let err = pipeline.query(QueryRequest::new("warranty")).await.unwrap_err();
        assert!(matches!(err, Error::Generation(_)));
        assert_eq!(generator.call_count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_query() {
        let h = harness().await;
        let err = h
            .pipeline
            .query(QueryRequest::new("warranty").with_top_k(0))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
