//! Command handlers for the docpipe CLI.
//!
//! Each subcommand lives in its own module; shared collaborator wiring and
//! JSON output live here.

pub mod documents;
pub mod health;
pub mod ingest;
pub mod query;

// Re-export command types for convenience
pub use documents::DocumentsCommand;
pub use health::HealthCommand;
pub use ingest::{BatchIngestCommand, IngestCommand};
pub use query::QueryCommand;

use docpipe_core::{config::AppConfig, AppResult};
use docpipe_knowledge::{
    create_provider, create_store, DocumentService, EmbeddingConfig, EmbeddingProvider,
    VectorStore,
};
use serde::Serialize;
use std::sync::Arc;

/// Embedding provider and vector store built from configuration.
#[derive(Debug, Clone)]
pub struct Backend {
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub store: Arc<dyn VectorStore>,
}

impl Backend {
    pub async fn connect(config: &AppConfig) -> AppResult<Self> {
        let embedder = create_provider(&EmbeddingConfig::from(&config.embedding)).await?;
        let store = create_store(&config.store, config.resolve_store_api_key())?;

        tracing::debug!(
            "Backend ready: {} embeddings ({} dims), {} store '{}'",
            embedder.provider_name(),
            embedder.dimensions(),
            store.backend_name(),
            store.collection()
        );

        Ok(Self { embedder, store })
    }

    pub fn documents(&self) -> DocumentService {
        DocumentService::new(self.embedder.clone(), self.store.clone())
    }
}

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
