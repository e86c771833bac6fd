//! Vector store abstraction.
//!
//! Defines a provider-agnostic trait for storing documents with their
//! embeddings and retrieving the nearest ones. Two backends are provided:
//! an in-memory store for development and tests, and a Qdrant store speaking
//! the Qdrant REST API.

mod memory;
mod qdrant;

pub use memory::MemoryStore;
pub use qdrant::QdrantStore;

use crate::types::{DocumentPayload, ScoredPoint, StoredPoint};
use docpipe_core::config::StoreSettings;
use docpipe_core::{AppError, AppResult};
use std::sync::Arc;

/// Trait for vector store backends.
///
/// Implementations take `&self` so one store can serve concurrent pipeline
/// runs; backends synchronize internally. All failures are reported as
/// `AppError::Store`.
#[async_trait::async_trait]
pub trait VectorStore: Send + Sync + std::fmt::Debug {
    /// Backend name (e.g., "memory", "qdrant")
    fn backend_name(&self) -> &str;

    /// Collection the store reads and writes
    fn collection(&self) -> &str;

    /// Create the collection for vectors of the given size if it is missing.
    async fn ensure_collection(&self, dimensions: usize) -> AppResult<()>;

    /// Insert or replace a point.
    async fn upsert(&self, id: &str, vector: &[f32], payload: &DocumentPayload) -> AppResult<()>;

    /// Return up to `limit` points ordered by descending similarity.
    async fn search(&self, vector: &[f32], limit: usize) -> AppResult<Vec<ScoredPoint>>;

    /// Delete a point. Deleting an unknown id is not an error.
    async fn delete(&self, id: &str) -> AppResult<()>;

    /// Return up to `limit` stored points.
    async fn scroll(&self, limit: usize) -> AppResult<Vec<StoredPoint>>;

    /// Check that the backend and its collection are reachable.
    async fn health(&self) -> AppResult<()>;
}

/// Create a vector store based on configuration.
pub fn create_store(
    settings: &StoreSettings,
    api_key: Option<String>,
) -> AppResult<Arc<dyn VectorStore>> {
    match settings.backend.as_str() {
        "memory" => {
            tracing::warn!(
                "Using in-memory vector store; documents are discarded when the process exits"
            );
            Ok(Arc::new(MemoryStore::new(&settings.collection)))
        }
        "qdrant" => Ok(Arc::new(QdrantStore::new(settings, api_key)?)),
        other => Err(AppError::Config(format!(
            "Unknown store backend: '{}'. Supported backends: qdrant, memory",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_memory_store() {
        let settings = StoreSettings {
            backend: "memory".to_string(),
            collection: "scratch".to_string(),
            ..Default::default()
        };

        let store = create_store(&settings, None).unwrap();
        assert_eq!(store.backend_name(), "memory");
        assert_eq!(store.collection(), "scratch");
    }

    #[test]
    fn test_create_qdrant_store() {
        let store = create_store(&StoreSettings::default(), None).unwrap();
        assert_eq!(store.backend_name(), "qdrant");
        assert_eq!(store.collection(), "documents");
    }

    #[test]
    fn test_create_unknown_store() {
        let settings = StoreSettings {
            backend: "pinecone".to_string(),
            ..Default::default()
        };

        let err = create_store(&settings, None).unwrap_err();
        assert!(err.to_string().contains("Unknown store backend"));
    }
}
