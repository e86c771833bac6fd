//! Pipeline state threaded through every step of a run.

use docpipe_knowledge::ScoredPoint;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One search hit, in the rank order the vector store returned it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    /// Identifier owned by the vector store
    pub id: String,

    /// Full document text
    pub content: String,

    /// Opaque caller metadata
    pub metadata: serde_json::Value,

    /// Relevance score, higher is more relevant
    pub score: f32,
}

impl From<ScoredPoint> for RetrievedDocument {
    fn from(point: ScoredPoint) -> Self {
        Self {
            id: point.id,
            content: point.payload.content,
            metadata: point.payload.metadata,
            score: point.score,
        }
    }
}

/// Failure recorded on the state by a step or by the engine.
///
/// These are data, not exceptions: a run that hits one still returns a
/// well-formed state.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum PipelineError {
    /// Embedding or vector store failure, including timeouts
    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    /// Failure reported by any other step
    #[error("Step '{step}' failed: {message}")]
    Step { step: String, message: String },

    /// A conditional edge picked a step that was never declared as a target
    #[error("Step '{step}' routed to unknown step '{target}'")]
    UnknownRoute { step: String, target: String },

    /// Conditional loops exhausted the step budget
    #[error("Step limit of {0} executions exceeded")]
    StepLimitExceeded(usize),

    /// The caller cancelled the run
    #[error("Run cancelled before step '{next_step}'")]
    Cancelled { next_step: String },
}

/// Mutable record carried through one pipeline run.
///
/// The query is fixed at creation, the provenance log only grows, and the
/// error is sticky: the first failure recorded is kept for the rest of the run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineState {
    query: String,
    retrieved: Vec<RetrievedDocument>,
    answer: String,
    steps_completed: Vec<String>,
    error: Option<PipelineError>,
}

impl PipelineState {
    /// Fresh state for one run.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            retrieved: Vec::new(),
            answer: String::new(),
            steps_completed: Vec::new(),
            error: None,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn retrieved(&self) -> &[RetrievedDocument] {
        &self.retrieved
    }

    pub fn set_retrieved(&mut self, documents: Vec<RetrievedDocument>) {
        self.retrieved = documents;
    }

    pub fn answer(&self) -> &str {
        &self.answer
    }

    pub fn set_answer(&mut self, answer: impl Into<String>) {
        self.answer = answer.into();
    }

    /// Names of the steps that finished without leaving an error behind.
    pub fn steps_completed(&self) -> &[String] {
        &self.steps_completed
    }

    pub fn error(&self) -> Option<&PipelineError> {
        self.error.as_ref()
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// Record a failure. Returns false if an earlier failure is already
    /// recorded, in which case the new one is dropped.
    pub fn fail(&mut self, error: PipelineError) -> bool {
        if self.error.is_some() {
            tracing::debug!("Ignoring '{}': state already failed", error);
            return false;
        }
        self.error = Some(error);
        true
    }

    /// True for a state no run has touched yet.
    pub fn is_fresh(&self) -> bool {
        self.error.is_none() && self.steps_completed.is_empty()
    }

    pub(crate) fn record_step(&mut self, name: &str) {
        self.steps_completed.push(name.to_string());
    }

    /// Split into owned parts once the run is over.
    pub fn into_parts(
        self,
    ) -> (
        String,
        Vec<RetrievedDocument>,
        String,
        Vec<String>,
        Option<PipelineError>,
    ) {
        (
            self.query,
            self.retrieved,
            self.answer,
            self.steps_completed,
            self.error,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docpipe_knowledge::DocumentPayload;

    #[test]
    fn test_new_state_is_fresh() {
        let state = PipelineState::new("what is qdrant?");
        assert_eq!(state.query(), "what is qdrant?");
        assert!(state.retrieved().is_empty());
        assert!(state.answer().is_empty());
        assert!(state.is_fresh());
        assert!(!state.is_failed());
    }

    #[test]
    fn test_error_is_sticky() {
        let mut state = PipelineState::new("q");
        assert!(state.fail(PipelineError::Retrieval("timeout".to_string())));
        assert!(!state.fail(PipelineError::StepLimitExceeded(25)));

        assert_eq!(
            state.error(),
            Some(&PipelineError::Retrieval("timeout".to_string()))
        );
        assert!(!state.is_fresh());
    }

    #[test]
    fn test_error_display() {
        let err = PipelineError::Retrieval("Store error: connection refused".to_string());
        assert_eq!(
            err.to_string(),
            "Retrieval failed: Store error: connection refused"
        );
    }

    #[test]
    fn test_error_serialization() {
        let err = PipelineError::Retrieval("boom".to_string());
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            serde_json::json!({"kind": "retrieval", "detail": "boom"})
        );
    }

    #[test]
    fn test_retrieved_document_from_scored_point() {
        let point = ScoredPoint {
            id: "doc-1".to_string(),
            payload: DocumentPayload::new("body", Some(serde_json::json!({"k": "v"}))),
            score: 0.87,
        };

        let doc = RetrievedDocument::from(point);
        assert_eq!(doc.id, "doc-1");
        assert_eq!(doc.content, "body");
        assert_eq!(doc.metadata, serde_json::json!({"k": "v"}));
        assert_eq!(doc.score, 0.87);
    }
}
