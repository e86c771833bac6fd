//! Document retrieval through the embedding provider and vector store.

use crate::state::{PipelineError, PipelineState, RetrievedDocument};
use crate::step::PipelineStep;
use docpipe_core::{AppError, AppResult};
use docpipe_knowledge::{EmbeddingProvider, VectorStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// How many times retrieval is attempted before the failure is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, at least one
    pub max_attempts: u32,

    /// Delay before the second attempt; doubles after each further failure
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2_u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// Embeds the query and searches the store for the top K documents.
///
/// Every failure, including a timeout or an empty query, is recorded on the
/// state as `PipelineError::Retrieval`; `retrieved` is left untouched then.
#[derive(Debug, Clone)]
pub struct RetrievalStep {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    top_k: usize,
    timeout: Duration,
    retry: RetryPolicy,
}

impl RetrievalStep {
    pub const NAME: &'static str = "retrieve";
    pub const DEFAULT_TOP_K: usize = 5;
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            embedder,
            store,
            top_k: Self::DEFAULT_TOP_K,
            timeout: Self::DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Bound on one attempt, covering both the embedding and the search.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[instrument(skip(self, query), fields(top_k = self.top_k))]
    async fn retrieve(&self, query: &str) -> AppResult<Vec<RetrievedDocument>> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.attempt(query).await {
                Ok(documents) => return Ok(documents),
                Err(e) if attempt < max_attempts => {
                    let backoff = self.retry.backoff(attempt);
                    warn!(
                        "Retrieval failed (attempt {}/{}): {}. Retrying in {}ms",
                        attempt,
                        max_attempts,
                        e,
                        backoff.as_millis()
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn attempt(&self, query: &str) -> AppResult<Vec<RetrievedDocument>> {
        let search = async {
            let embedding = self.embedder.embed(query).await?;
            self.store.search(&embedding, self.top_k).await
        };

        let hits = tokio::time::timeout(self.timeout, search)
            .await
            .map_err(|_| {
                AppError::Other(format!(
                    "timed out after {}ms",
                    self.timeout.as_millis()
                ))
            })??;

        Ok(hits.into_iter().map(RetrievedDocument::from).collect())
    }
}

#[async_trait::async_trait]
impl PipelineStep for RetrievalStep {
    async fn execute(&self, mut state: PipelineState) -> PipelineState {
        if state.query().trim().is_empty() {
            state.fail(PipelineError::Retrieval(
                "query must not be empty".to_string(),
            ));
            return state;
        }

        let outcome = self.retrieve(state.query()).await;
        match outcome {
            Ok(documents) => {
                info!(
                    "Retrieved {} documents from '{}'",
                    documents.len(),
                    self.store.collection()
                );
                state.set_retrieved(documents);
            }
            Err(e) => {
                warn!("Retrieval failed: {}", e);
                state.fail(PipelineError::Retrieval(e.to_string()));
            }
        }

        state
    }
}
