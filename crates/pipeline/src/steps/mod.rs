//! Built-in steps of the document query pipeline.

mod answer;
mod retrieve;

pub use answer::{compose_answer, AnswerStep};
pub use retrieve::{RetrievalStep, RetryPolicy};
