//! Embedding providers.
//!
//! Maps text to fixed-length vectors behind the provider-agnostic
//! [`EmbeddingProvider`] trait.

pub mod config;
pub mod provider;
pub mod providers;

pub use config::EmbeddingConfig;
pub use provider::{create_provider, EmbeddingProvider};
