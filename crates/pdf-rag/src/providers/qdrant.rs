//! Qdrant vector index over the REST API

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::VectorDbConfig;
use crate::error::{Error, Result};
use crate::types::{
    DistanceMetric, DocumentId, IndexPoint, PointPayload, ScoredPoint, SearchFilter, SessionId,
};

use super::vector_store::{validate_points, validate_search, VectorIndex};

#[derive(Debug, Clone)]
struct ActiveCollection {
    name: String,
    dimension: usize,
}

/// Qdrant-backed vector index
///
/// Dimension checks run client-side before any request is sent, so a batch
/// with a bad vector never reaches the server.
pub struct QdrantIndex {
    client: Client,
    base_url: String,
    collection: RwLock<Option<ActiveCollection>>,
}

#[derive(Serialize)]
struct CreateCollectionRequest {
    vectors: VectorParams,
}

#[derive(Serialize)]
struct VectorParams {
    size: usize,
    distance: &'static str,
}

#[derive(Serialize)]
struct UpsertRequest {
    points: Vec<PointStruct>,
}

#[derive(Serialize)]
struct PointStruct {
    id: String,
    vector: Vec<f32>,
    payload: PointPayload,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    vector: &'a [f32],
    limit: usize,
    with_payload: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Value>,
}

#[derive(Deserialize)]
struct ApiResponse<T> {
    result: T,
}

#[derive(Deserialize)]
struct CollectionInfo {
    config: CollectionConfig,
}

#[derive(Deserialize)]
struct CollectionConfig {
    params: CollectionParams,
}

#[derive(Deserialize)]
struct CollectionParams {
    vectors: Value,
}

impl CollectionParams {
    /// Size of the collection's single unnamed vector
    ///
    /// Named-vector collections have no top-level `size` and cannot be used.
    fn vector_size(&self, name: &str) -> Result<usize> {
        self.vectors
            .get("size")
            .and_then(Value::as_u64)
            .map(|size| size as usize)
            .ok_or_else(|| {
                Error::configuration(format!(
                    "Qdrant collection '{}' uses named vectors, expected a single unnamed vector",
                    name
                ))
            })
    }
}

#[derive(Deserialize)]
struct SearchHit {
    id: Value,
    score: f32,
    #[serde(default)]
    payload: Option<Value>,
}

#[derive(Deserialize)]
struct CountResult {
    count: usize,
}

/// Translate a payload filter into Qdrant's `must` clauses
fn filter_to_json(filter: &SearchFilter) -> Option<Value> {
    let mut must = Vec::new();
    if let Some(doc_id) = &filter.source_doc_id {
        must.push(json!({ "key": "source_doc_id", "match": { "value": doc_id.as_str() } }));
    }
    if let Some(session_id) = &filter.session_id {
        must.push(json!({ "key": "session_id", "match": { "value": session_id.as_str() } }));
    }
    (!must.is_empty()).then(|| json!({ "must": must }))
}

fn point_id_to_string(id: Value) -> String {
    match id {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

impl QdrantIndex {
    /// Create a client for the configured Qdrant instance
    pub fn new(config: &VectorDbConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(key) = &config.api_key {
            let value = HeaderValue::from_str(key.trim())
                .map_err(|_| Error::configuration("QDRANT_API_KEY contains invalid characters"))?;
            headers.insert("api-key", value);
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| Error::configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            collection: RwLock::new(None),
        })
    }

    /// Bind to a collection known to exist, skipping `ensure_collection`
    pub fn with_collection(self, name: &str, dimension: usize) -> Self {
        *self.collection.write() = Some(ActiveCollection {
            name: name.to_string(),
            dimension,
        });
        self
    }

    fn active(&self) -> Result<ActiveCollection> {
        self.collection.read().clone().ok_or_else(|| {
            Error::index_unavailable("collection has not been created; call ensure_collection first")
        })
    }

    fn collection_url(&self, name: &str) -> String {
        format!("{}/collections/{}", self.base_url, name)
    }

    /// Map a non-success response onto the error taxonomy
    async fn error_from_response(context: &str, response: reqwest::Response) -> Error {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNPROCESSABLE_ENTITY {
            Error::validation(format!("{} rejected by Qdrant: HTTP {} - {}", context, status, body))
        } else {
            Error::index_unavailable(format!("{} failed: HTTP {} - {}", context, status, body))
        }
    }

    async fn send(&self, context: &str, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::index_unavailable(format!("{} request failed: {}", context, e)))?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(context, response).await);
        }
        Ok(response)
    }

    async fn parse<T: for<'de> Deserialize<'de>>(context: &str, response: reqwest::Response) -> Result<T> {
        let body: ApiResponse<T> = response.json().await.map_err(|e| {
            Error::index_unavailable(format!("Failed to parse {} response: {}", context, e))
        })?;
        Ok(body.result)
    }

    /// Dimension of an existing collection, or None when it does not exist
    async fn existing_dimension(&self, name: &str) -> Result<Option<usize>> {
        let response = self
            .client
            .get(self.collection_url(name))
            .send()
            .await
            .map_err(|e| Error::index_unavailable(format!("Collection lookup failed: {}", e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::error_from_response("Collection lookup", response).await);
        }

        let info: CollectionInfo = Self::parse("collection info", response).await?;
        info.config.params.vector_size(name).map(Some)
    }

    async fn delete_matching(&self, filter: &SearchFilter) -> Result<usize> {
        let collection = self.active()?;
        let removed = self.count(Some(filter)).await?;
        let body = json!({ "filter": filter_to_json(filter) });

        self.send(
            "Delete",
            self.client
                .post(format!("{}/points/delete?wait=true", self.collection_url(&collection.name)))
                .json(&body),
        )
        .await?;

        Ok(removed)
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn ensure_collection(
        &self,
        name: &str,
        dimension: usize,
        metric: DistanceMetric,
    ) -> Result<()> {
        match self.existing_dimension(name).await? {
            Some(existing) if existing != dimension => {
                return Err(Error::configuration(format!(
                    "Qdrant collection '{}' has dimension {}, configured {}",
                    name, existing, dimension
                )));
            }
            Some(_) => {
                tracing::debug!("Qdrant collection '{}' already exists", name);
            }
            None => {
                let request = CreateCollectionRequest {
                    vectors: VectorParams {
                        size: dimension,
                        distance: metric.as_str(),
                    },
                };
                self.send(
                    "Create collection",
                    self.client.put(self.collection_url(name)).json(&request),
                )
                .await?;
                tracing::info!(
                    "Created Qdrant collection '{}' ({} dims, {})",
                    name,
                    dimension,
                    metric.as_str()
                );
            }
        }

        *self.collection.write() = Some(ActiveCollection {
            name: name.to_string(),
            dimension,
        });
        Ok(())
    }

    async fn upsert(&self, points: Vec<IndexPoint>) -> Result<()> {
        let collection = self.active()?;
        validate_points(&points, collection.dimension)?;

        let count = points.len();
        let request = UpsertRequest {
            points: points
                .into_iter()
                .map(|p| PointStruct {
                    id: p.id,
                    vector: p.vector,
                    payload: p.payload,
                })
                .collect(),
        };

        self.send(
            "Upsert",
            self.client
                .put(format!("{}/points?wait=true", self.collection_url(&collection.name)))
                .json(&request),
        )
        .await?;

        tracing::debug!("Upserted {} points into '{}'", count, collection.name);
        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<ScoredPoint>> {
        let collection = self.active()?;
        validate_search(query_vector, k, collection.dimension)?;

        let request = SearchRequest {
            vector: query_vector,
            limit: k,
            with_payload: true,
            filter: filter.and_then(filter_to_json),
        };

        let response = self
            .send(
                "Search",
                self.client
                    .post(format!("{}/points/search", self.collection_url(&collection.name)))
                    .json(&request),
            )
            .await?;
        let hits: Vec<SearchHit> = Self::parse("search", response).await?;

        let mut results = Vec::with_capacity(hits.len());
        for hit in hits.into_iter().take(k) {
            let id = point_id_to_string(hit.id);
            let payload: PointPayload = hit
                .payload
                .ok_or_else(|| Error::index_unavailable(format!("point {} has no payload", id)))
                .and_then(|p| {
                    serde_json::from_value(p).map_err(|e| {
                        Error::index_unavailable(format!("point {} has a malformed payload: {}", id, e))
                    })
                })?;
            results.push(ScoredPoint {
                id,
                payload,
                score: hit.score,
            });
        }

        Ok(results)
    }

    async fn delete_by_document(&self, doc_id: &DocumentId) -> Result<usize> {
        self.delete_matching(&SearchFilter::document(doc_id.clone())).await
    }

    async fn delete_by_session(&self, session_id: &SessionId) -> Result<usize> {
        self.delete_matching(&SearchFilter::session(session_id.clone())).await
    }

    async fn count(&self, filter: Option<&SearchFilter>) -> Result<usize> {
        let collection = self.active()?;
        let mut body = json!({ "exact": true });
        if let Some(filter) = filter.and_then(filter_to_json) {
            body["filter"] = filter;
        }

        let response = self
            .send(
                "Count",
                self.client
                    .post(format!("{}/points/count", self.collection_url(&collection.name)))
                    .json(&body),
            )
            .await?;
        let result: CountResult = Self::parse("count", response).await?;
        Ok(result.count)
    }

    async fn health_check(&self) -> Result<bool> {
        match self.client.get(format!("{}/healthz", self.base_url)).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        "qdrant"
    }
}
