//! Error types for docpipe.
//!
//! A single error enum covers every category in the workspace: configuration
//! and graph definition, engine invariants, the embedding and vector store
//! collaborators, and the usual I/O and serialization failures.

use thiserror::Error;

/// Unified error type for docpipe.
///
/// Step-level failures inside a pipeline run are not reported through this
/// type; they are recorded on the pipeline state instead.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration errors, including invalid pipeline graph definitions
    #[error("Configuration error: {0}")]
    Config(String),

    /// Engine invariant violations detected before a run dispatches any step
    #[error("Engine error: {0}")]
    Engine(String),

    /// Embedding provider errors
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Vector store errors
    #[error("Store error: {0}")]
    Store(String),

    /// Rejected caller input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Requested entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefixes() {
        assert_eq!(
            AppError::Store("connection refused".to_string()).to_string(),
            "Store error: connection refused"
        );
        assert_eq!(
            AppError::Config("cycle detected".to_string()).to_string(),
            "Configuration error: cycle detected"
        );
    }

    #[test]
    fn test_from_serde_json() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let app_err: AppError = err.into();
        assert!(matches!(app_err, AppError::Serialization(_)));
    }
}
