//! Configuration management for docpipe.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Defaults
//! - Config file (`.docpipe/config.yaml` in the workspace)
//! - Environment variables
//! - Command-line flags
//!
//! Later sources override earlier ones.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Embedding providers the factory knows how to build.
pub const KNOWN_EMBEDDING_PROVIDERS: [&str; 2] = ["trigram", "ollama"];

/// Vector store backends the factory knows how to build.
pub const KNOWN_STORE_BACKENDS: [&str; 2] = ["qdrant", "memory"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .docpipe/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Embedding provider settings
    pub embedding: EmbeddingSettings,

    /// Vector store settings
    pub store: StoreSettings,

    /// Query pipeline settings
    pub pipeline: PipelineSettings,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,
}

/// Embedding provider section of config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EmbeddingSettings {
    /// Provider name: "trigram" or "ollama"
    pub provider: String,

    /// Model identifier (provider-specific)
    pub model: String,

    /// Embedding vector dimensions
    pub dimensions: usize,

    /// Provider endpoint (Ollama base URL)
    pub endpoint: Option<String>,

    /// HTTP timeout for a single embedding request
    pub timeout_secs: u64,

    /// Attempts per embedding request made by the provider itself
    pub max_retries: u32,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "trigram".to_string(),
            model: "trigram-v1".to_string(),
            dimensions: 384,
            endpoint: None,
            timeout_secs: 30,
            max_retries: 1,
        }
    }
}

/// Vector store section of config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreSettings {
    /// Backend name: "qdrant" or "memory"
    pub backend: String,

    /// Qdrant REST endpoint
    pub url: String,

    /// Collection holding the documents
    pub collection: String,

    /// Environment variable holding the Qdrant API key, if any
    pub api_key_env: Option<String>,

    /// HTTP timeout for store requests
    pub timeout_secs: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: "qdrant".to_string(),
            url: "http://localhost:6333".to_string(),
            collection: "documents".to_string(),
            api_key_env: None,
            timeout_secs: 10,
        }
    }
}

/// Query pipeline section of config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineSettings {
    /// Number of documents retrieved per query
    pub top_k: usize,

    /// Upper bound for the embedding and search calls of one retrieval
    pub retrieval_timeout_ms: u64,

    /// Retrieval attempts per run (1 = no retry)
    pub max_attempts: u32,

    /// Backoff before the second attempt, doubled for each further attempt
    pub initial_backoff_ms: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            retrieval_timeout_ms: 10_000,
            max_attempts: 1,
            initial_backoff_ms: 100,
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    embedding: Option<EmbeddingSettings>,
    store: Option<StoreSettings>,
    pipeline: Option<PipelineSettings>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            embedding: EmbeddingSettings::default(),
            store: StoreSettings::default(),
            pipeline: PipelineSettings::default(),
            log_level: None,
            verbose: false,
            no_color: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the config file and the environment.
    ///
    /// Environment variables:
    /// - `DOCPIPE_WORKSPACE`: Override workspace path
    /// - `DOCPIPE_CONFIG`: Path to config file
    /// - `DOCPIPE_EMBEDDING_PROVIDER`: Embedding provider
    /// - `DOCPIPE_STORE_BACKEND`: Vector store backend
    /// - `DOCPIPE_QDRANT_URL`: Qdrant endpoint
    /// - `DOCPIPE_COLLECTION`: Collection name
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("DOCPIPE_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("DOCPIPE_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.docpipe_dir().join("config.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("DOCPIPE_EMBEDDING_PROVIDER") {
            config.embedding.provider = provider;
        }

        if let Ok(backend) = std::env::var("DOCPIPE_STORE_BACKEND") {
            config.store.backend = backend;
        }

        if let Ok(url) = std::env::var("DOCPIPE_QDRANT_URL") {
            config.store.url = url;
        }

        if let Ok(collection) = std::env::var("DOCPIPE_COLLECTION") {
            config.store.collection = collection;
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var_os("NO_COLOR").is_some() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into a copy of this config.
    pub fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(ws) = config_file.workspace {
            if let Some(path) = ws.path {
                result.workspace = PathBuf::from(path);
            }
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        if let Some(embedding) = config_file.embedding {
            result.embedding = embedding;
        }

        if let Some(store) = config_file.store {
            result.store = store;
        }

        if let Some(pipeline) = config_file.pipeline {
            result.pipeline = pipeline;
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over the environment and the file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        embedding_provider: Option<String>,
        store_backend: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = embedding_provider {
            self.embedding.provider = provider;
        }

        if let Some(backend) = store_backend {
            self.store.backend = backend;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .docpipe directory.
    pub fn docpipe_dir(&self) -> PathBuf {
        self.workspace.join(".docpipe")
    }

    /// Resolve the Qdrant API key from the configured environment variable.
    pub fn resolve_store_api_key(&self) -> Option<String> {
        self.store
            .api_key_env
            .as_ref()
            .and_then(|env_var| std::env::var(env_var).ok())
    }

    /// Validate the configuration before any collaborator is built.
    pub fn validate(&self) -> AppResult<()> {
        let provider = self.embedding.provider.as_str();
        if !KNOWN_EMBEDDING_PROVIDERS.contains(&provider) {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: {}. Supported: {}",
                provider,
                KNOWN_EMBEDDING_PROVIDERS.join(", ")
            )));
        }

        let backend = self.store.backend.as_str();
        if !KNOWN_STORE_BACKENDS.contains(&backend) {
            return Err(AppError::Config(format!(
                "Unknown store backend: {}. Supported: {}",
                backend,
                KNOWN_STORE_BACKENDS.join(", ")
            )));
        }

        if self.embedding.dimensions == 0 {
            return Err(AppError::Config(
                "Embedding dimensions must be greater than zero".to_string(),
            ));
        }

        if self.pipeline.top_k == 0 {
            return Err(AppError::Config(
                "Pipeline topK must be greater than zero".to_string(),
            ));
        }

        if self.pipeline.max_attempts == 0 {
            return Err(AppError::Config(
                "Pipeline maxAttempts must be at least 1".to_string(),
            ));
        }

        if self.store.collection.trim().is_empty() {
            return Err(AppError::Config("Store collection must not be empty".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.embedding.provider, "trigram");
        assert_eq!(config.embedding.dimensions, 384);
        assert_eq!(config.store.backend, "qdrant");
        assert_eq!(config.store.collection, "documents");
        assert_eq!(config.pipeline.top_k, 5);
        assert_eq!(config.pipeline.max_attempts, 1);
        assert!(!config.verbose);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_docpipe_dir() {
        let config = AppConfig::default();
        assert!(config.docpipe_dir().ends_with(".docpipe"));
    }

    #[test]
    fn test_with_overrides() {
        let overridden = AppConfig::default().with_overrides(
            None,
            None,
            Some("ollama".to_string()),
            Some("memory".to_string()),
            None,
            true,
            false,
        );

        assert_eq!(overridden.embedding.provider, "ollama");
        assert_eq!(overridden.store.backend, "memory");
        assert!(overridden.verbose);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_merge_yaml_sections() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(
            &path,
            r#"
embedding:
  provider: ollama
  model: nomic-embed-text
  dimensions: 768
  endpoint: http://localhost:11434
store:
  backend: qdrant
  url: http://qdrant:6333
  collection: messy_documents
pipeline:
  topK: 3
  retrievalTimeoutMs: 2500
logging:
  level: debug
  color: false
"#,
        )
        .unwrap();

        let merged = AppConfig::default().merge_yaml(&path).unwrap();
        assert_eq!(merged.embedding.provider, "ollama");
        assert_eq!(merged.embedding.dimensions, 768);
        // Missing keys fall back to section defaults
        assert_eq!(merged.embedding.timeout_secs, 30);
        assert_eq!(merged.store.url, "http://qdrant:6333");
        assert_eq!(merged.store.collection, "messy_documents");
        assert_eq!(merged.pipeline.top_k, 3);
        assert_eq!(merged.pipeline.retrieval_timeout_ms, 2500);
        assert_eq!(merged.pipeline.max_attempts, 1);
        assert_eq!(merged.log_level, Some("debug".to_string()));
        assert!(merged.no_color);
    }

    #[test]
    fn test_merge_yaml_invalid() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(&path, "pipeline: [not, a, map]").unwrap();

        let result = AppConfig::default().merge_yaml(&path);
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_validate_unknown_provider() {
        let mut config = AppConfig::default();
        config.embedding.provider = "word2vec".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_unknown_backend() {
        let mut config = AppConfig::default();
        config.store.backend = "pinecone".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Unknown store backend"));
    }

    #[test]
    fn test_validate_zero_top_k() {
        let mut config = AppConfig::default();
        config.pipeline.top_k = 0;
        assert!(config.validate().is_err());
    }
}
