//! Health command handler.

use super::{print_json, Backend};
use clap::Args;
use docpipe_core::{config::AppConfig, AppError, AppResult};
use docpipe_pipeline::{build_query_engine, QueryOptions};

/// Check the vector store connection and the query pipeline
#[derive(Args, Debug)]
pub struct HealthCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl HealthCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing health command");

        let backend = Backend::connect(config).await?;
        let report = backend
            .documents()
            .health()
            .await
            .with_workflow(check_workflow(&backend, config));

        if self.json {
            print_json(&report)?;
        } else {
            println!("Status:     {}", report.status);
            println!("Store:      {} ({})", report.store, report.store_backend);
            println!("Collection: {}", report.collection);
            println!(
                "Embeddings: {} / {}",
                report.embedding_provider, report.embedding_model
            );
            if let Some(workflow) = &report.workflow {
                println!("Workflow:   {}", workflow);
            }
            if let Some(detail) = &report.detail {
                println!("Detail:     {}", detail);
            }
        }

        if report.is_healthy() {
            Ok(())
        } else {
            Err(AppError::Store(format!(
                "Collection '{}' is not ready: {}",
                report.collection,
                report.detail.as_deref().unwrap_or("unknown failure")
            )))
        }
    }
}

/// Build the query pipeline the `query` command would run, and discard it.
fn check_workflow(backend: &Backend, config: &AppConfig) -> AppResult<()> {
    build_query_engine(
        backend.embedder.clone(),
        backend.store.clone(),
        QueryOptions::from(&config.pipeline),
    )
    .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docpipe_knowledge::embeddings::providers::TrigramProvider;
    use docpipe_knowledge::MemoryStore;
    use std::sync::Arc;

    fn memory_backend() -> Backend {
        Backend {
            embedder: Arc::new(TrigramProvider::new(32)),
            store: Arc::new(MemoryStore::new("documents")),
        }
    }

    #[tokio::test]
    async fn test_health_reports_ready_workflow() {
        let backend = memory_backend();
        let config = AppConfig::default();

        let report = backend
            .documents()
            .health()
            .await
            .with_workflow(check_workflow(&backend, &config));

        assert!(report.is_healthy());
        assert_eq!(report.workflow.as_deref(), Some("ready"));
    }

    #[tokio::test]
    async fn test_health_reports_unbuildable_workflow() {
        let backend = memory_backend();
        let mut config = AppConfig::default();
        config.pipeline.top_k = 0;

        let report = backend
            .documents()
            .health()
            .await
            .with_workflow(check_workflow(&backend, &config));

        assert!(!report.is_healthy());
        assert_eq!(report.store, "connected");
        assert_eq!(report.workflow.as_deref(), Some("unavailable"));
    }
}
