//! Agent port
//!
//! Defines the contract every capability unit implements. Concrete agents
//! live in the infrastructure layer.

use async_trait::async_trait;
use cedar_domain::{AgentFailure, AgentKind, AgentResult, ConversationContext};
use std::time::Duration;
use thiserror::Error;

use super::llm_gateway::GatewayError;

/// Unexpected agent failure
///
/// Expected conditions (missing backend, inapplicable task, a backend call
/// that fails) are reported as low-confidence [`AgentResult`]s, not errors.
/// An `AgentError` escaping `process` is converted into a synthetic result by
/// the dispatcher.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Backend error: {0}")]
    Backend(#[from] GatewayError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Execution failed: {0}")]
    Execution(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Short error type name used in failure reports
    pub fn error_type(&self) -> &'static str {
        match self {
            AgentError::Backend(_) => "BackendError",
            AgentError::Io(_) => "IoError",
            AgentError::Execution(_) => "ExecutionError",
            AgentError::Timeout(_) => "Timeout",
            AgentError::Other(_) => "AgentError",
        }
    }

    pub fn to_failure(&self) -> AgentFailure {
        AgentFailure::new(self.error_type(), self.to_string())
    }
}

/// A capability unit
///
/// `process` must not share mutable state with other agents; side effects are
/// bounded by size and time caps and use per-invocation resources.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Which catalogue entry this agent implements
    fn kind(&self) -> AgentKind;

    /// Process one task
    async fn process(
        &self,
        task: &str,
        context: Option<&ConversationContext>,
    ) -> Result<AgentResult, AgentError>;
}
