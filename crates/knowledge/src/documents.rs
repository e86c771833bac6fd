//! Document ingestion and management.
//!
//! Wraps an embedding provider and a vector store behind the operations the
//! command line exposes: ingest, batch ingest, list, delete and health.

use crate::embeddings::EmbeddingProvider;
use crate::store::VectorStore;
use crate::types::{
    BatchItemResult, DocumentInput, DocumentPayload, DocumentSummary, HealthReport, IngestReceipt,
};
use docpipe_core::{AppError, AppResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// Number of characters shown in a listing preview.
pub const PREVIEW_CHARS: usize = 100;

/// Document operations over an injected provider and store.
#[derive(Debug, Clone)]
pub struct DocumentService {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
}

impl DocumentService {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    /// Create the collection for the provider's dimensions if needed.
    pub async fn prepare(&self) -> AppResult<()> {
        self.store
            .ensure_collection(self.embedder.dimensions())
            .await
    }

    /// Embed and store one document under a fresh UUID.
    pub async fn ingest(&self, input: DocumentInput) -> AppResult<IngestReceipt> {
        if input.content.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "Document content must not be empty".to_string(),
            ));
        }

        let embedding = self.embedder.embed(&input.content).await?;
        let id = uuid::Uuid::new_v4().to_string();
        let payload = DocumentPayload::new(input.content, input.metadata);

        self.store.upsert(&id, &embedding, &payload).await?;

        tracing::info!(
            "Ingested document {} ({} chars) into '{}'",
            id,
            payload.content.chars().count(),
            self.store.collection()
        );

        Ok(IngestReceipt { id })
    }

    /// Ingest documents one by one. A failing item is reported in place and
    /// does not stop the rest of the batch.
    pub async fn batch_ingest(&self, inputs: Vec<DocumentInput>) -> Vec<BatchItemResult> {
        let total = inputs.len();
        let mut results = Vec::with_capacity(total);

        for (i, input) in inputs.into_iter().enumerate() {
            match self.ingest(input).await {
                Ok(receipt) => results.push(BatchItemResult::Success { id: receipt.id }),
                Err(e) => {
                    tracing::warn!("Batch item {}/{} failed: {}", i + 1, total, e);
                    results.push(BatchItemResult::Error {
                        error: e.to_string(),
                    });
                }
            }
        }

        let succeeded = results.iter().filter(|r| r.is_success()).count();
        tracing::info!("Batch ingest finished: {}/{} succeeded", succeeded, total);

        results
    }

    /// List up to `limit` stored documents with content previews.
    pub async fn list(&self, limit: usize) -> AppResult<Vec<DocumentSummary>> {
        let points = self.store.scroll(limit).await?;

        Ok(points
            .into_iter()
            .map(|point| DocumentSummary {
                id: point.id,
                preview: preview(&point.payload.content, PREVIEW_CHARS),
                metadata: point.payload.metadata,
                ingested_at: point.payload.ingested_at,
            })
            .collect())
    }

    /// Delete a document by id.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        if id.trim().is_empty() {
            return Err(AppError::InvalidInput("Document id must not be empty".to_string()));
        }

        self.store.delete(id).await?;
        tracing::info!("Deleted document {} from '{}'", id, self.store.collection());
        Ok(())
    }

    /// Report store connectivity. Never fails; problems are described in the report.
    /// Query pipeline readiness is left for the caller to add.
    pub async fn health(&self) -> HealthReport {
        let (status, store, detail) = match self.store.health().await {
            Ok(()) => ("healthy", "connected", None),
            Err(e) => {
                tracing::warn!("Store health check failed: {}", e);
                ("unhealthy", "disconnected", Some(e.to_string()))
            }
        };

        HealthReport {
            status: status.to_string(),
            store: store.to_string(),
            store_backend: self.store.backend_name().to_string(),
            collection: self.store.collection().to_string(),
            embedding_provider: self.embedder.provider_name().to_string(),
            embedding_model: self.embedder.model_name().to_string(),
            workflow: None,
            detail,
        }
    }
}

/// First `max_chars` characters of `content` followed by "...".
pub fn preview(content: &str, max_chars: usize) -> String {
    let mut shortened: String = content.chars().take(max_chars).collect();
    shortened.push_str("...");
    shortened
}

/// Read text documents from files and directories.
///
/// Directories are walked recursively; hidden entries are skipped, as are
/// files that are not valid UTF-8 or are empty. Each document carries its
/// `source_path` in the metadata.
pub fn load_documents(paths: &[PathBuf]) -> AppResult<Vec<DocumentInput>> {
    let mut documents = Vec::new();

    for path in paths {
        if !path.exists() {
            return Err(AppError::NotFound(format!("Path does not exist: {:?}", path)));
        }

        if path.is_file() {
            if let Some(doc) = read_document(path)? {
                documents.push(doc);
            }
            continue;
        }

        for entry in WalkDir::new(path)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()))
            .filter_map(|e| e.ok())
        {
            if entry.file_type().is_file() {
                if let Some(doc) = read_document(entry.path())? {
                    documents.push(doc);
                }
            }
        }
    }

    tracing::debug!("Loaded {} documents from {} paths", documents.len(), paths.len());
    Ok(documents)
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().map(|s| s.starts_with('.')).unwrap_or(false)
}

fn read_document(path: &Path) -> AppResult<Option<DocumentInput>> {
    let bytes = std::fs::read(path)?;

    let content = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(_) => {
            tracing::warn!("Skipping non-UTF-8 file {:?}", path);
            return Ok(None);
        }
    };

    if content.trim().is_empty() {
        tracing::debug!("Skipping empty file {:?}", path);
        return Ok(None);
    }

    let metadata = serde_json::json!({ "source_path": path.to_string_lossy() });
    Ok(Some(DocumentInput::new(content).with_metadata(metadata)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::TrigramProvider;
    use crate::store::MemoryStore;
    use tempfile::TempDir;

    fn service() -> (DocumentService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new("test"));
        let service = DocumentService::new(Arc::new(TrigramProvider::new(64)), store.clone());
        (service, store)
    }

    #[tokio::test]
    async fn test_ingest_and_list() {
        let (service, store) = service();
        service.prepare().await.unwrap();

        let receipt = service
            .ingest(
                DocumentInput::new("Qdrant stores vectors with payloads")
                    .with_metadata(serde_json::json!({"topic": "db"})),
            )
            .await
            .unwrap();

        assert!(uuid::Uuid::parse_str(&receipt.id).is_ok());
        assert_eq!(store.len(), 1);

        let listed = service.list(10).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, receipt.id);
        assert_eq!(listed[0].preview, "Qdrant stores vectors with payloads...");
        assert_eq!(listed[0].metadata, serde_json::json!({"topic": "db"}));
        assert!(listed[0].ingested_at.is_some());
    }

    #[tokio::test]
    async fn test_ingest_rejects_empty_content() {
        let (service, _) = service();
        let err = service.ingest(DocumentInput::new("  ")).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_batch_ingest_reports_per_item() {
        let (service, store) = service();

        let results = service
            .batch_ingest(vec![
                DocumentInput::new("first document"),
                DocumentInput::new(""),
                DocumentInput::new("third document"),
            ])
            .await;

        assert_eq!(results.len(), 3);
        assert!(results[0].is_success());
        assert!(!results[1].is_success());
        assert!(results[2].is_success());
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_removes_document() {
        let (service, store) = service();
        let receipt = service.ingest(DocumentInput::new("to be removed")).await.unwrap();

        service.delete(&receipt.id).await.unwrap();
        assert!(store.is_empty());
        assert!(service.delete("").await.is_err());
    }

    #[tokio::test]
    async fn test_health_reports_backend() {
        let (service, _) = service();
        let report = service.health().await;

        assert!(report.is_healthy());
        assert_eq!(report.store, "connected");
        assert_eq!(report.store_backend, "memory");
        assert_eq!(report.embedding_provider, "trigram");
    }

    #[test]
    fn test_preview_is_char_bounded() {
        let long = "é".repeat(150);
        let shortened = preview(&long, PREVIEW_CHARS);
        assert_eq!(shortened.chars().count(), PREVIEW_CHARS + 3);
        assert!(shortened.ends_with("..."));
        assert_eq!(preview("short", PREVIEW_CHARS), "short...");
    }

    #[test]
    fn test_load_documents_walks_directories() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.md"), "alpha notes").unwrap();
        std::fs::write(temp.path().join("empty.txt"), "   ").unwrap();
        std::fs::create_dir(temp.path().join("nested")).unwrap();
        std::fs::write(temp.path().join("nested").join("b.txt"), "beta notes").unwrap();
        std::fs::create_dir(temp.path().join(".git")).unwrap();
        std::fs::write(temp.path().join(".git").join("HEAD"), "ref: main").unwrap();
        std::fs::write(temp.path().join("blob.bin"), [0xff, 0xfe, 0x00]).unwrap();

        let docs = load_documents(&[temp.path().to_path_buf()]).unwrap();
        let contents: Vec<&str> = docs.iter().map(|d| d.content.as_str()).collect();

        assert_eq!(contents, vec!["alpha notes", "beta notes"]);
        let source = docs[1].metadata.as_ref().unwrap()["source_path"].as_str().unwrap();
        assert!(source.ends_with("b.txt"));
    }

    #[test]
    fn test_load_documents_missing_path() {
        let result = load_documents(&[PathBuf::from("/definitely/not/here")]);
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
