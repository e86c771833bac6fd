//! Document storage for docpipe.
//!
//! Provides the two collaborators the query pipeline depends on, plus the
//! document operations built on them:
//!
//! ```text
//! DocumentInput -> EmbeddingProvider -> VectorStore::upsert
//!                                            |
//! query -> EmbeddingProvider -> VectorStore::search -> ScoredPoint
//! ```

pub mod documents;
pub mod embeddings;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use documents::{load_documents, DocumentService};
pub use embeddings::{create_provider, EmbeddingConfig, EmbeddingProvider};
pub use store::{create_store, MemoryStore, QdrantStore, VectorStore};
pub use types::{
    BatchItemResult, DocumentInput, DocumentPayload, DocumentSummary, HealthReport, IngestReceipt,
    ScoredPoint, StoredPoint,
};
