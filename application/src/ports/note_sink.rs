//! Note persistence port

use async_trait::async_trait;
use cedar_domain::{AgentResult, Decision};
use thiserror::Error;

/// Errors from a note sink
#[derive(Error, Debug)]
pub enum NoteSinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Note rejected: {0}")]
    Rejected(String),
}

/// Optional persistence of each iteration's findings
///
/// Failures are logged by the orchestrator and never abort orchestration.
#[async_trait]
pub trait NoteSink: Send + Sync {
    /// Persist notes for one iteration (zero-based). Returns the note id, or
    /// `None` when nothing was stored.
    async fn save_iteration_notes(
        &self,
        user_query: &str,
        results: &[AgentResult],
        decision: &Decision,
        iteration: usize,
    ) -> Result<Option<String>, NoteSinkError>;
}

/// Sink that stores nothing
pub struct NoNoteSink;

#[async_trait]
impl NoteSink for NoNoteSink {
    async fn save_iteration_notes(
        &self,
        _user_query: &str,
        _results: &[AgentResult],
        _decision: &Decision,
        _iteration: usize,
    ) -> Result<Option<String>, NoteSinkError> {
        Ok(None)
    }
}
