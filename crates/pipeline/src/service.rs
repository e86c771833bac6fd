//! Query service: builds the retrieve -> generate_answer pipeline and runs it.

use crate::engine::PipelineEngine;
use crate::state::{PipelineError, PipelineState, RetrievedDocument};
use crate::step::CancellationToken;
use crate::steps::{AnswerStep, RetrievalStep, RetryPolicy};
use docpipe_core::config::PipelineSettings;
use docpipe_core::{AppError, AppResult};
use docpipe_knowledge::{EmbeddingProvider, VectorStore};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Retrieval tuning for the query pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    pub top_k: usize,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            top_k: RetrievalStep::DEFAULT_TOP_K,
            timeout: RetrievalStep::DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

impl From<&PipelineSettings> for QueryOptions {
    fn from(settings: &PipelineSettings) -> Self {
        Self {
            top_k: settings.top_k,
            timeout: Duration::from_millis(settings.retrieval_timeout_ms),
            retry: RetryPolicy {
                max_attempts: settings.max_attempts.max(1),
                initial_backoff: Duration::from_millis(settings.initial_backoff_ms),
            },
        }
    }
}

/// Outcome of one query, success or degraded.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub query: String,
    pub retrieved: Vec<RetrievedDocument>,
    pub answer: String,
    pub steps_completed: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<PipelineError>,

    /// Wall-clock time of the run
    pub processing_time_secs: f64,
}

impl QueryResult {
    fn from_state(state: PipelineState, elapsed: Duration) -> Self {
        let (query, retrieved, answer, steps_completed, error) = state.into_parts();
        Self {
            query,
            retrieved,
            answer,
            steps_completed,
            error,
            processing_time_secs: elapsed.as_secs_f64(),
        }
    }

    /// True when a step failed and the answer describes the failure.
    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }
}

/// Build and compile the linear query pipeline.
///
/// `retrieve` is the entry; `generate_answer` depends on it and is also the
/// finish step, so a failed retrieval still yields an explanatory answer.
/// A zero `top_k` is rejected.
pub fn build_query_engine(
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    options: QueryOptions,
) -> AppResult<PipelineEngine> {
    if options.top_k == 0 {
        return Err(AppError::Config(
            "Query topK must be greater than zero".to_string(),
        ));
    }

    let retrieval = RetrievalStep::new(embedder, store)
        .with_top_k(options.top_k)
        .with_timeout(options.timeout)
        .with_retry(options.retry);

    let mut engine = PipelineEngine::new();
    engine.register(RetrievalStep::NAME, retrieval, None)?;
    engine.register(AnswerStep::NAME, AnswerStep, Some(RetrievalStep::NAME))?;
    engine.set_entry(RetrievalStep::NAME)?;
    engine.set_finish(AnswerStep::NAME)?;
    engine.compile()?;

    Ok(engine)
}

/// Runs queries against a compiled pipeline. Cheap to clone.
#[derive(Debug, Clone)]
pub struct QueryService {
    engine: Arc<PipelineEngine>,
}

impl QueryService {
    /// Wrap an already compiled engine.
    pub fn new(engine: PipelineEngine) -> AppResult<Self> {
        if !engine.is_compiled() {
            return Err(AppError::Engine(
                "Query service requires a compiled pipeline".to_string(),
            ));
        }
        Ok(Self {
            engine: Arc::new(engine),
        })
    }

    /// Build the default pipeline over the given collaborators.
    pub fn from_collaborators(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        options: QueryOptions,
    ) -> AppResult<Self> {
        Self::new(build_query_engine(embedder, store, options)?)
    }

    pub async fn run_query(&self, query: &str) -> AppResult<QueryResult> {
        self.run_query_with_cancel(query, &CancellationToken::new())
            .await
    }

    /// Run one query. Only an empty query or an engine misuse is an `Err`;
    /// retrieval failures come back as a degraded result.
    pub async fn run_query_with_cancel(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> AppResult<QueryResult> {
        if query.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "Query must not be empty".to_string(),
            ));
        }

        let started = Instant::now();
        let state = self
            .engine
            .run_with_cancel(PipelineState::new(query), cancel)
            .await?;
        let result = QueryResult::from_state(state, started.elapsed());

        match &result.error {
            Some(err) => tracing::warn!(
                "Query finished degraded in {:.3}s: {}",
                result.processing_time_secs,
                err
            ),
            None => tracing::info!(
                "Query answered from {} documents in {:.3}s",
                result.retrieved.len(),
                result.processing_time_secs
            ),
        }

        Ok(result)
    }
}
