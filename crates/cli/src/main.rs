//! Docpipe CLI
//!
//! Main entry point for the docpipe command-line tool.
//! Ingests documents into a vector store and answers questions from them.

mod commands;

use clap::{Parser, Subcommand};
use commands::{BatchIngestCommand, DocumentsCommand, HealthCommand, IngestCommand, QueryCommand};
use docpipe_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;

/// Docpipe - document retrieval and question answering over a vector store
#[derive(Parser, Debug)]
#[command(name = "docpipe")]
#[command(about = "Document retrieval and question answering over a vector store", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "DOCPIPE_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file (default: <workspace>/.docpipe/config.yaml)
    #[arg(short, long, global = true, env = "DOCPIPE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level or filter directive (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Vector store backend (qdrant, memory)
    #[arg(long, global = true, env = "DOCPIPE_STORE_BACKEND")]
    store: Option<String>,

    /// Embedding provider (trigram, ollama)
    #[arg(short, long, global = true, env = "DOCPIPE_EMBEDDING_PROVIDER")]
    embedding_provider: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest a document or a directory of text files
    Ingest(IngestCommand),

    /// Ingest documents from a JSON file
    BatchIngest(BatchIngestCommand),

    /// Answer a question from the stored documents
    Query(QueryCommand),

    /// List or delete stored documents
    Documents(DocumentsCommand),

    /// Check the vector store connection
    Health(HealthCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Load base configuration from environment and workspace config file
    let mut config = AppConfig::load()?;

    // An explicit --config is read after the default file
    if let Some(path) = &cli.config {
        config = config.merge_yaml(path)?;
    }

    // Apply CLI overrides
    let config = config.with_overrides(
        cli.workspace,
        cli.config,
        cli.embedding_provider,
        cli.store,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    // Initialize logging with final configuration
    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    config.validate()?;

    // Log startup
    tracing::info!("Docpipe CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!(
        "Embedding provider: {} ({} dims)",
        config.embedding.provider,
        config.embedding.dimensions
    );
    tracing::debug!(
        "Store: {} at {} (collection '{}')",
        config.store.backend,
        config.store.url,
        config.store.collection
    );

    // Emit command span
    let command_name = match &cli.command {
        Commands::Ingest(_) => "ingest",
        Commands::BatchIngest(_) => "batch-ingest",
        Commands::Query(_) => "query",
        Commands::Documents(_) => "documents",
        Commands::Health(_) => "health",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    // Route to command handlers
    let result = match cli.command {
        Commands::Ingest(cmd) => cmd.execute(&config).await,
        Commands::BatchIngest(cmd) => cmd.execute(&config).await,
        Commands::Query(cmd) => cmd.execute(&config).await,
        Commands::Documents(cmd) => cmd.execute(&config).await,
        Commands::Health(cmd) => cmd.execute(&config).await,
    };

    // Log completion
    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_query_with_global_flags() {
        let cli = Cli::try_parse_from([
            "docpipe",
            "query",
            "what is qdrant?",
            "--top-k",
            "3",
            "--store",
            "memory",
            "--json",
        ])
        .unwrap();

        assert_eq!(cli.store.as_deref(), Some("memory"));
        match cli.command {
            Commands::Query(cmd) => {
                assert_eq!(cmd.query, "what is qdrant?");
                assert_eq!(cmd.top_k, Some(3));
                assert!(cmd.json);
            }
            other => panic!("expected query command, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_documents_list() {
        let cli = Cli::try_parse_from(["docpipe", "documents", "list", "--limit", "25"]).unwrap();
        match cli.command {
            Commands::Documents(DocumentsCommand {
                action: commands::documents::DocumentsAction::List(cmd),
            }) => assert_eq!(cmd.limit, 25),
            other => panic!("expected documents list, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_ingest_paths() {
        let cli = Cli::try_parse_from([
            "docpipe", "ingest", "--path", "docs", "--path", "notes.md",
        ])
        .unwrap();
        match cli.command {
            Commands::Ingest(cmd) => {
                assert!(cmd.content.is_none());
                assert_eq!(cmd.path.len(), 2);
            }
            other => panic!("expected ingest command, got {:?}", other),
        }
    }
}
