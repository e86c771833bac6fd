//! In-process collaborators with scripted behaviour.

use async_trait::async_trait;
use docpipe_core::{AppError, AppResult};
use docpipe_knowledge::{
    DocumentPayload, EmbeddingProvider, ScoredPoint, StoredPoint, VectorStore,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Build a search hit.
pub fn hit(id: &str, content: &str, score: f32) -> ScoredPoint {
    ScoredPoint {
        id: id.to_string(),
        payload: DocumentPayload::new(content, Some(serde_json::json!({ "source": id }))),
        score,
    }
}

/// Embedder returning a constant vector, optionally after a delay, or
/// always failing.
#[derive(Debug, Default)]
pub struct FakeEmbedder {
    fail: bool,
    delay: Option<Duration>,
}

impl FakeEmbedder {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    fn provider_name(&self) -> &str {
        "fake"
    }

    fn model_name(&self) -> &str {
        "constant"
    }

    fn dimensions(&self) -> usize {
        3
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(AppError::Embedding("model not loaded".to_string()));
        }
        Ok(texts.iter().map(|_| vec![0.1, 0.2, 0.3]).collect())
    }
}

/// Store whose search returns fixed hits after a number of failures,
/// optionally after a delay.
#[derive(Debug)]
pub struct FakeStore {
    hits: Vec<ScoredPoint>,
    failures_before_success: usize,
    delay: Option<Duration>,
    searches: AtomicUsize,
}

impl FakeStore {
    pub fn with_hits(hits: Vec<ScoredPoint>) -> Self {
        Self {
            hits,
            failures_before_success: 0,
            delay: None,
            searches: AtomicUsize::new(0),
        }
    }

    pub fn empty() -> Self {
        Self::with_hits(Vec::new())
    }

    pub fn failing() -> Self {
        Self::flaky(usize::MAX, Vec::new())
    }

    pub fn flaky(failures: usize, hits: Vec<ScoredPoint>) -> Self {
        Self {
            failures_before_success: failures,
            ..Self::with_hits(hits)
        }
    }

    pub fn slow(delay: Duration, hits: Vec<ScoredPoint>) -> Self {
        Self {
            delay: Some(delay),
            ..Self::with_hits(hits)
        }
    }

    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorStore for FakeStore {
    fn backend_name(&self) -> &str {
        "fake"
    }

    fn collection(&self) -> &str {
        "test"
    }

    async fn ensure_collection(&self, _dimensions: usize) -> AppResult<()> {
        Ok(())
    }

    async fn upsert(&self, _id: &str, _vector: &[f32], _payload: &DocumentPayload) -> AppResult<()> {
        Ok(())
    }

    async fn search(&self, _vector: &[f32], limit: usize) -> AppResult<Vec<ScoredPoint>> {
        let call = self.searches.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if call < self.failures_before_success {
            return Err(AppError::Store("connection refused".to_string()));
        }

        Ok(self.hits.iter().take(limit).cloned().collect())
    }

    async fn delete(&self, _id: &str) -> AppResult<()> {
        Ok(())
    }

    async fn scroll(&self, _limit: usize) -> AppResult<Vec<StoredPoint>> {
        Ok(Vec::new())
    }

    async fn health(&self) -> AppResult<()> {
        Ok(())
    }
}
