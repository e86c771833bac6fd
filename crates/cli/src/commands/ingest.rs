//! Ingest command handlers.

use super::{print_json, Backend};
use clap::Args;
use docpipe_core::{config::AppConfig, AppError, AppResult};
use docpipe_knowledge::{load_documents, BatchItemResult, DocumentInput};
use std::path::PathBuf;

/// Ingest one document, or every text file under the given paths
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Document content
    pub content: Option<String>,

    /// Files or directories to ingest instead of inline content
    #[arg(long)]
    pub path: Vec<PathBuf>,

    /// Metadata as a JSON object
    #[arg(long)]
    pub metadata: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ingest command");

        let metadata = self
            .metadata
            .as_deref()
            .map(parse_metadata)
            .transpose()?;

        let backend = Backend::connect(config).await?;
        let service = backend.documents();
        service.prepare().await?;

        match (&self.content, self.path.is_empty()) {
            (Some(content), true) => {
                let mut input = DocumentInput::new(content.clone());
                input.metadata = metadata;

                let receipt = service.ingest(input).await?;
                if self.json {
                    print_json(&serde_json::json!({
                        "status": "success",
                        "id": receipt.id,
                    }))?;
                } else {
                    println!("Ingested document {}", receipt.id);
                }
                Ok(())
            }
            (None, false) => {
                let mut inputs = load_documents(&self.path)?;
                if let Some(extra) = &metadata {
                    for input in &mut inputs {
                        merge_metadata(input, extra);
                    }
                }

                let results = service.batch_ingest(inputs).await;
                report_batch(&results, self.json)
            }
            (Some(_), false) => Err(AppError::InvalidInput(
                "Pass either inline content or --path, not both".to_string(),
            )),
            (None, true) => Err(AppError::InvalidInput(
                "Nothing to ingest: pass content or --path".to_string(),
            )),
        }
    }
}

/// Ingest documents listed in a JSON file
#[derive(Args, Debug)]
pub struct BatchIngestCommand {
    /// JSON file holding an array of {"content": ..., "metadata": {...}}
    pub file: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl BatchIngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing batch-ingest command for {:?}", self.file);

        let contents = std::fs::read_to_string(&self.file)?;
        let inputs: Vec<DocumentInput> = serde_json::from_str(&contents)?;
        tracing::debug!("Loaded {} documents from {:?}", inputs.len(), self.file);

        let backend = Backend::connect(config).await?;
        let service = backend.documents();
        service.prepare().await?;

        let results = service.batch_ingest(inputs).await;
        report_batch(&results, self.json)
    }
}

fn parse_metadata(raw: &str) -> AppResult<serde_json::Value> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| AppError::InvalidInput(format!("Metadata is not valid JSON: {}", e)))?;

    if !value.is_object() {
        return Err(AppError::InvalidInput(
            "Metadata must be a JSON object".to_string(),
        ));
    }
    Ok(value)
}

/// Add keys from `extra` that the loaded document does not already carry.
fn merge_metadata(input: &mut DocumentInput, extra: &serde_json::Value) {
    let mut merged = input
        .metadata
        .take()
        .and_then(|m| m.as_object().cloned())
        .unwrap_or_default();

    if let Some(extra) = extra.as_object() {
        for (key, value) in extra {
            merged.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }

    input.metadata = Some(serde_json::Value::Object(merged));
}

fn report_batch(results: &[BatchItemResult], json: bool) -> AppResult<()> {
    let succeeded = results.iter().filter(|r| r.is_success()).count();

    if json {
        return print_json(&serde_json::json!({
            "total": results.len(),
            "succeeded": succeeded,
            "results": results,
        }));
    }

    for (i, result) in results.iter().enumerate() {
        match result {
            BatchItemResult::Success { id } => println!("  [{}] ingested {}", i, id),
            BatchItemResult::Error { error } => println!("  [{}] failed: {}", i, error),
        }
    }
    println!("Ingested {}/{} documents", succeeded, results.len());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_metadata_requires_object() {
        assert!(parse_metadata(r#"{"team": "search"}"#).is_ok());
        assert!(matches!(
            parse_metadata("[1, 2]"),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            parse_metadata("not json"),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_merge_metadata_keeps_source_path() {
        let mut input = DocumentInput::new("text")
            .with_metadata(serde_json::json!({"source_path": "/docs/a.md"}));

        merge_metadata(
            &mut input,
            &serde_json::json!({"source_path": "ignored", "team": "search"}),
        );

        assert_eq!(
            input.metadata,
            Some(serde_json::json!({"source_path": "/docs/a.md", "team": "search"}))
        );
    }
}
