//! Document management command handlers.

use super::{print_json, Backend};
use clap::{Args, Subcommand};
use docpipe_core::{config::AppConfig, AppResult};

/// Manage stored documents
#[derive(Args, Debug)]
pub struct DocumentsCommand {
    #[command(subcommand)]
    pub action: DocumentsAction,
}

#[derive(Subcommand, Debug)]
pub enum DocumentsAction {
    /// List stored documents with content previews
    List(DocumentsListCommand),
    /// Delete a document by id
    Delete(DocumentsDeleteCommand),
}

impl DocumentsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        match &self.action {
            DocumentsAction::List(cmd) => cmd.execute(config).await,
            DocumentsAction::Delete(cmd) => cmd.execute(config).await,
        }
    }
}

/// List stored documents
#[derive(Args, Debug)]
pub struct DocumentsListCommand {
    /// Maximum number of documents to show
    #[arg(short, long, default_value = "10")]
    pub limit: usize,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl DocumentsListCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing documents list command (limit {})", self.limit);

        let backend = Backend::connect(config).await?;
        let documents = backend.documents().list(self.limit).await?;

        if self.json {
            return print_json(&serde_json::json!({
                "documents": documents,
                "total": documents.len(),
            }));
        }

        if documents.is_empty() {
            println!("No documents stored in '{}'", backend.store.collection());
            return Ok(());
        }

        for doc in &documents {
            println!("{}", doc.id);
            println!("  {}", doc.preview);
            if let Some(at) = doc.ingested_at {
                println!("  ingested {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
            }
        }
        println!("{} documents", documents.len());

        Ok(())
    }
}

/// Delete a document
#[derive(Args, Debug)]
pub struct DocumentsDeleteCommand {
    /// Document id
    pub id: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl DocumentsDeleteCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing documents delete command for {}", self.id);

        let backend = Backend::connect(config).await?;
        backend.documents().delete(&self.id).await?;

        if self.json {
            print_json(&serde_json::json!({
                "status": "success",
                "message": format!("Document {} deleted", self.id),
            }))
        } else {
            println!("Deleted document {}", self.id);
            Ok(())
        }
    }
}
