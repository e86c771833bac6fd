//! Step abstraction and run cancellation.

use crate::state::PipelineState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One stage of a pipeline run.
///
/// A step takes ownership of the state and hands it back. Failures are
/// recorded with [`PipelineState::fail`] rather than returned, so a run
/// always produces a well-formed state.
#[async_trait::async_trait]
pub trait PipelineStep: Send + Sync {
    async fn execute(&self, state: PipelineState) -> PipelineState;
}

/// Cooperative cancellation flag shared between a caller and a run.
///
/// The engine checks it between steps; a step already in flight finishes.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
