//! Query command handler.
//!
//! Runs the retrieve -> generate_answer pipeline for one question.

use super::{print_json, Backend};
use clap::Args;
use docpipe_core::{config::AppConfig, AppResult};
use docpipe_pipeline::{CancellationToken, QueryOptions, QueryResult, QueryService};
use std::time::Duration;

/// Answer a question from the stored documents
#[derive(Args, Debug)]
pub struct QueryCommand {
    /// Question text
    pub query: String,

    /// Number of documents to retrieve (default: pipeline.topK)
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Retrieval timeout in milliseconds (default: pipeline.retrievalTimeoutMs)
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl QueryCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing query command");

        let options = self.options(config);
        tracing::debug!("Query options: {:?}", options);

        let backend = Backend::connect(config).await?;
        let service = QueryService::from_collaborators(backend.embedder, backend.store, options)?;

        // Ctrl-C stops the run at the next step boundary
        let cancel = CancellationToken::new();
        let watcher = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupt received, cancelling query");
                    cancel.cancel();
                }
            })
        };

        let result = service.run_query_with_cancel(&self.query, &cancel).await;
        watcher.abort();
        let result = result?;

        if self.json {
            print_json(&result)
        } else {
            print_result(&result);
            Ok(())
        }
    }

    fn options(&self, config: &AppConfig) -> QueryOptions {
        let mut options = QueryOptions::from(&config.pipeline);
        if let Some(top_k) = self.top_k {
            options.top_k = top_k;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            options.timeout = Duration::from_millis(timeout_ms);
        }
        options
    }
}

fn print_result(result: &QueryResult) {
    println!("{}", result.answer);

    if !result.retrieved.is_empty() {
        println!();
        println!("Sources:");
        for (i, doc) in result.retrieved.iter().enumerate() {
            println!("  {}. {} (score {:.3})", i + 1, doc.id, doc.score);
        }
    }

    if let Some(err) = &result.error {
        eprintln!();
        eprintln!("Warning: {}", err);
    }

    println!();
    println!(
        "Steps: {} | {:.3}s",
        if result.steps_completed.is_empty() {
            "none".to_string()
        } else {
            result.steps_completed.join(" -> ")
        },
        result.processing_time_secs
    );
}
