//! Answer composition.

use crate::state::PipelineState;
use crate::step::PipelineStep;

/// Answer used when retrieval came back empty.
pub const NO_DOCUMENTS_ANSWER: &str = "No relevant documents found.";

/// Number of characters of the top document quoted in the answer.
pub const EXCERPT_CHARS: usize = 200;

/// Turns the retrieved documents, or the recorded error, into an answer.
///
/// Runs as the finish step, so it also sees failed states.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnswerStep;

impl AnswerStep {
    pub const NAME: &'static str = "generate_answer";
}

/// Build the answer text for a state. Depends only on the error and the
/// top-ranked document.
pub fn compose_answer(state: &PipelineState) -> String {
    if let Some(err) = state.error() {
        return format!("Error occurred: {}", err);
    }

    match state.retrieved().first() {
        Some(top) => {
            let excerpt: String = top.content.chars().take(EXCERPT_CHARS).collect();
            format!("Based on the document: {}...", excerpt)
        }
        None => NO_DOCUMENTS_ANSWER.to_string(),
    }
}

#[async_trait::async_trait]
impl PipelineStep for AnswerStep {
    async fn execute(&self, mut state: PipelineState) -> PipelineState {
        let answer = compose_answer(&state);
        tracing::debug!("Composed answer ({} chars)", answer.chars().count());
        state.set_answer(answer);
        state
    }
}
