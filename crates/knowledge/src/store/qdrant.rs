//! Qdrant-backed vector store using the Qdrant REST API.

use std::time::Duration;

use docpipe_core::config::StoreSettings;
use docpipe_core::{AppError, AppResult};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, instrument};

use crate::store::VectorStore;
use crate::types::{DocumentPayload, ScoredPoint, StoredPoint};

/// Vector store backed by a Qdrant collection with cosine distance.
#[derive(Debug, Clone)]
pub struct QdrantStore {
    client: Client,
    base_url: String,
    collection: String,
    api_key: Option<String>,
}

/// Standard Qdrant response envelope.
#[derive(Debug, Deserialize)]
struct QdrantResponse<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct QdrantErrorBody {
    status: QdrantErrorStatus,
}

#[derive(Debug, Deserialize)]
struct QdrantErrorStatus {
    error: String,
}

#[derive(Debug, Deserialize)]
struct QdrantHit {
    id: Value,
    score: f32,
    #[serde(default)]
    payload: Option<DocumentPayload>,
}

#[derive(Debug, Deserialize)]
struct QdrantRecord {
    id: Value,
    #[serde(default)]
    payload: Option<DocumentPayload>,
}

#[derive(Debug, Deserialize)]
struct ScrollResult {
    points: Vec<QdrantRecord>,
}

#[derive(Debug, Serialize)]
struct PointStruct<'a> {
    id: &'a str,
    vector: &'a [f32],
    payload: &'a DocumentPayload,
}

impl QdrantStore {
    /// Create a store for the configured endpoint and collection.
    ///
    /// No request is sent until the first operation.
    pub fn new(settings: &StoreSettings, api_key: Option<String>) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| AppError::Store(format!("Failed to create HTTP client for Qdrant: {}", e)))?;

        Ok(Self {
            client,
            base_url: settings.url.trim_end_matches('/').to_string(),
            collection: settings.collection.clone(),
            api_key,
        })
    }

    fn collection_url(&self, suffix: &str) -> String {
        format!("{}/collections/{}{}", self.base_url, self.collection, suffix)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    /// Send a request and decode the `result` field of the envelope.
    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder, action: &str) -> AppResult<T> {
        let response = builder
            .send()
            .await
            .map_err(|e| AppError::Store(format!("Failed to {}: {}", action, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.error_from_response(status, response.text().await.ok(), action));
        }

        let envelope: QdrantResponse<T> = response
            .json()
            .await
            .map_err(|e| AppError::Store(format!("Malformed Qdrant response to {}: {}", action, e)))?;

        Ok(envelope.result)
    }

    fn error_from_response(&self, status: StatusCode, body: Option<String>, action: &str) -> AppError {
        let detail = body
            .as_deref()
            .and_then(|text| serde_json::from_str::<QdrantErrorBody>(text).ok())
            .map(|b| b.status.error)
            .or(body)
            .unwrap_or_else(|| "no response body".to_string());

        if status == StatusCode::NOT_FOUND {
            return AppError::NotFound(format!(
                "Qdrant collection '{}' ({})",
                self.collection, detail
            ));
        }

        AppError::Store(format!("Failed to {} ({}): {}", action, status, detail))
    }
}

/// Qdrant ids are unsigned integers or UUID strings.
fn id_to_string(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait::async_trait]
impl VectorStore for QdrantStore {
    fn backend_name(&self) -> &str {
        "qdrant"
    }

    fn collection(&self) -> &str {
        &self.collection
    }

    #[instrument(skip(self), fields(collection = %self.collection))]
    async fn ensure_collection(&self, dimensions: usize) -> AppResult<()> {
        match self.health().await {
            Ok(()) => {
                debug!("Collection '{}' already exists", self.collection);
                return Ok(());
            }
            Err(AppError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        let body = json!({
            "vectors": { "size": dimensions, "distance": "Cosine" }
        });
        let _: Value = self
            .send(
                self.request(Method::PUT, &self.collection_url("")).json(&body),
                "create collection",
            )
            .await?;

        info!(
            "Created collection '{}' ({} dimensions, cosine)",
            self.collection, dimensions
        );
        Ok(())
    }

    #[instrument(skip(self, vector, payload), fields(collection = %self.collection))]
    async fn upsert(&self, id: &str, vector: &[f32], payload: &DocumentPayload) -> AppResult<()> {
        let point = PointStruct {
            id,
            vector,
            payload,
        };
        let body = json!({ "points": [point] });
        let _: Value = self
            .send(
                self.request(Method::PUT, &self.collection_url("/points?wait=true"))
                    .json(&body),
                "upsert point",
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self, vector), fields(collection = %self.collection))]
    async fn search(&self, vector: &[f32], limit: usize) -> AppResult<Vec<ScoredPoint>> {
        let body = json!({
            "vector": vector,
            "limit": limit,
            "with_payload": true,
        });
        let hits: Vec<QdrantHit> = self
            .send(
                self.request(Method::POST, &self.collection_url("/points/search"))
                    .json(&body),
                "search points",
            )
            .await?;

        debug!("Qdrant returned {} hits", hits.len());

        Ok(hits
            .into_iter()
            .map(|hit| ScoredPoint {
                id: id_to_string(&hit.id),
                payload: hit.payload.unwrap_or_default(),
                score: hit.score,
            })
            .collect())
    }

    #[instrument(skip(self), fields(collection = %self.collection))]
    async fn delete(&self, id: &str) -> AppResult<()> {
        let body = json!({ "points": [id] });
        let _: Value = self
            .send(
                self.request(Method::POST, &self.collection_url("/points/delete?wait=true"))
                    .json(&body),
                "delete point",
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(collection = %self.collection))]
    async fn scroll(&self, limit: usize) -> AppResult<Vec<StoredPoint>> {
        let body = json!({
            "limit": limit,
            "with_payload": true,
            "with_vector": false,
        });
        let result: ScrollResult = self
            .send(
                self.request(Method::POST, &self.collection_url("/points/scroll"))
                    .json(&body),
                "scroll points",
            )
            .await?;

        Ok(result
            .points
            .into_iter()
            .map(|record| StoredPoint {
                id: id_to_string(&record.id),
                payload: record.payload.unwrap_or_default(),
            })
            .collect())
    }

    async fn health(&self) -> AppResult<()> {
        let _: Value = self
            .send(
                self.request(Method::GET, &self.collection_url("")),
                "get collection",
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(url: &str) -> StoreSettings {
        StoreSettings {
            url: url.to_string(),
            collection: "messy_documents".to_string(),
            timeout_secs: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_collection_url() {
        let store = QdrantStore::new(&settings("http://localhost:6333/"), None).unwrap();
        assert_eq!(
            store.collection_url("/points/search"),
            "http://localhost:6333/collections/messy_documents/points/search"
        );
    }

    #[test]
    fn test_id_to_string() {
        assert_eq!(id_to_string(&json!(42)), "42");
        assert_eq!(
            id_to_string(&json!("5c56c793-69f3-4fbf-87e6-c4bf54c28c26")),
            "5c56c793-69f3-4fbf-87e6-c4bf54c28c26"
        );
    }

    #[test]
    fn test_decode_search_response() {
        let raw = r#"{
            "result": [
                {"id": "a", "version": 3, "score": 0.91,
                 "payload": {"content": "top", "metadata": {"lang": "en"},
                             "ingested_at": "2024-05-01T10:00:00Z"}},
                {"id": 7, "version": 1, "score": 0.42, "payload": {"content": "second"}}
            ],
            "status": "ok",
            "time": 0.0012
        }"#;

        let decoded: QdrantResponse<Vec<QdrantHit>> = serde_json::from_str(raw).unwrap();
        assert_eq!(decoded.result.len(), 2);
        assert_eq!(id_to_string(&decoded.result[1].id), "7");
        let top = decoded.result[0].payload.as_ref().unwrap();
        assert_eq!(top.content, "top");
        assert_eq!(top.metadata, json!({"lang": "en"}));
        assert!(top.ingested_at.is_some());
    }

    #[test]
    fn test_error_body_detail() {
        let store = QdrantStore::new(&settings("http://localhost:6333"), None).unwrap();
        let body = r#"{"status": {"error": "Wrong input: Vector dimension error"}, "time": 0.0}"#;

        let err = store.error_from_response(
            StatusCode::BAD_REQUEST,
            Some(body.to_string()),
            "search points",
        );
        assert!(matches!(err, AppError::Store(_)));
        assert!(err.to_string().contains("Vector dimension error"));

        let missing = store.error_from_response(StatusCode::NOT_FOUND, None, "get collection");
        assert!(matches!(missing, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_store_error() {
        let store = QdrantStore::new(&settings("http://127.0.0.1:9"), None).unwrap();
        let err = store.search(&[0.1, 0.2], 5).await.unwrap_err();
        assert!(matches!(err, AppError::Store(_)));
    }
}
