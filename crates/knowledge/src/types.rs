//! Document and vector store record types.

use chrono::{DateTime, Utc};
use docpipe_core::AppResult;
use serde::{Deserialize, Serialize};

/// Payload stored next to each vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentPayload {
    /// Full document text
    #[serde(default)]
    pub content: String,

    /// Caller-supplied metadata, opaque to docpipe
    #[serde(default = "empty_object")]
    pub metadata: serde_json::Value,

    /// When the document was ingested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingested_at: Option<DateTime<Utc>>,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl Default for DocumentPayload {
    fn default() -> Self {
        Self {
            content: String::new(),
            metadata: empty_object(),
            ingested_at: None,
        }
    }
}

impl DocumentPayload {
    /// Build a payload stamped with the current time.
    pub fn new(content: impl Into<String>, metadata: Option<serde_json::Value>) -> Self {
        Self {
            content: content.into(),
            metadata: metadata.unwrap_or_else(empty_object),
            ingested_at: Some(Utc::now()),
        }
    }
}

/// A stored point as returned by a scroll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPoint {
    pub id: String,
    pub payload: DocumentPayload,
}

/// A search hit. Higher scores are more similar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPoint {
    pub id: String,
    pub payload: DocumentPayload,
    pub score: f32,
}

/// A document submitted for ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInput {
    pub content: String,

    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl DocumentInput {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Acknowledgement of a successful ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReceipt {
    /// Identifier assigned to the document
    pub id: String,
}

/// Outcome of one item in a batch ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum BatchItemResult {
    Success { id: String },
    Error { error: String },
}

impl BatchItemResult {
    pub fn is_success(&self) -> bool {
        matches!(self, BatchItemResult::Success { .. })
    }
}

/// Listing entry with a shortened content preview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: String,

    /// First characters of the content followed by "..."
    pub preview: String,

    pub metadata: serde_json::Value,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingested_at: Option<DateTime<Utc>>,
}

/// Health of the document backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    /// "healthy" when the store answered, otherwise "unhealthy"
    pub status: String,

    /// "connected" or "disconnected"
    pub store: String,

    pub store_backend: String,
    pub collection: String,
    pub embedding_provider: String,
    pub embedding_model: String,

    /// Query pipeline readiness, "ready" or "unavailable", when checked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow: Option<String>,

    /// Error message when the store or the query pipeline is unavailable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }

    /// Record whether the query pipeline could be built. A pipeline that
    /// cannot be built makes the report unhealthy.
    pub fn with_workflow(mut self, check: AppResult<()>) -> Self {
        match check {
            Ok(()) => self.workflow = Some("ready".to_string()),
            Err(e) => {
                self.workflow = Some("unavailable".to_string());
                self.status = "unhealthy".to_string();
                if self.detail.is_none() {
                    self.detail = Some(e.to_string());
                }
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_defaults_metadata_to_object() {
        let payload = DocumentPayload::new("hello", None);
        assert!(payload.metadata.is_object());
        assert!(payload.ingested_at.is_some());
    }

    #[test]
    fn test_payload_tolerates_missing_fields() {
        let payload: DocumentPayload = serde_json::from_str(r#"{"content": "x"}"#).unwrap();
        assert_eq!(payload.content, "x");
        assert_eq!(payload.metadata, serde_json::json!({}));
        assert!(payload.ingested_at.is_none());
    }

    fn connected_report() -> HealthReport {
        HealthReport {
            status: "healthy".to_string(),
            store: "connected".to_string(),
            store_backend: "memory".to_string(),
            collection: "documents".to_string(),
            embedding_provider: "trigram".to_string(),
            embedding_model: "trigram-v1".to_string(),
            workflow: None,
            detail: None,
        }
    }

    #[test]
    fn test_health_report_workflow_ready() {
        let report = connected_report().with_workflow(Ok(()));
        assert!(report.is_healthy());
        assert_eq!(report.workflow.as_deref(), Some("ready"));
    }

    #[test]
    fn test_health_report_workflow_unavailable() {
        let report = connected_report().with_workflow(Err(docpipe_core::AppError::Config(
            "Query topK must be greater than zero".to_string(),
        )));

        assert!(!report.is_healthy());
        assert_eq!(report.workflow.as_deref(), Some("unavailable"));
        assert!(report.detail.unwrap().contains("topK"));
    }

    #[test]
    fn test_batch_item_serialization() {
        let ok = serde_json::to_value(BatchItemResult::Success { id: "a".to_string() }).unwrap();
        assert_eq!(ok, serde_json::json!({"status": "success", "id": "a"}));

        let err = serde_json::to_value(BatchItemResult::Error {
            error: "boom".to_string(),
        })
        .unwrap();
        assert_eq!(err, serde_json::json!({"status": "error", "error": "boom"}));
    }
}
