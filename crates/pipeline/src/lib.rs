//! Query pipeline for docpipe.
//!
//! A small graph engine runs named steps over a shared [`PipelineState`].
//! The default graph embeds the query, searches the vector store and
//! composes an answer from the best hit:
//!
//! ```text
//! PipelineState(query) -> retrieve -> generate_answer -> QueryResult
//!                            |              ^
//!                            +-- on error --+
//! ```

pub mod engine;
pub mod service;
pub mod state;
pub mod step;
pub mod steps;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use engine::{PipelineEngine, DEFAULT_STEP_LIMIT, END};
pub use service::{build_query_engine, QueryOptions, QueryResult, QueryService};
pub use state::{PipelineError, PipelineState, RetrievedDocument};
pub use step::{CancellationToken, PipelineStep};
pub use steps::{compose_answer, AnswerStep, RetrievalStep, RetryPolicy};
