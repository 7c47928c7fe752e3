//! Execution parameters — orchestration loop control.
//!
//! [`ExecutionParams`] groups the static parameters that bound one
//! orchestration: the iteration limit, per-call timeouts, the overall
//! deadline, acknowledgment deadlines, and the next-steps policy. These are
//! application-layer concerns; the infrastructure config loader maps its file
//! sections onto them.

use cedar_domain::{MAX_ITERATIONS, NextStepsPolicy};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Orchestration loop control parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionParams {
    /// Maximum Dispatch → Review iterations per message.
    pub max_iterations: usize,
    /// Time budget for one agent call.
    pub agent_timeout: Duration,
    /// Time budget for one reviewer call.
    pub reviewer_timeout: Duration,
    /// Overall budget for one message.
    pub deadline: Duration,
    /// How long an acknowledgment may take before it is logged as missed.
    pub ack_timeout: Duration,
    /// Token budget for reviewer replies.
    pub reviewer_max_tokens: u32,
    /// Suggested-next-steps suffix on final answers.
    pub next_steps: NextStepsPolicy,
}

impl Default for ExecutionParams {
    fn default() -> Self {
        Self {
            max_iterations: MAX_ITERATIONS,
            // Above the shell runner timeout plus one backend analysis call
            agent_timeout: Duration::from_secs(180),
            reviewer_timeout: Duration::from_secs(60),
            deadline: Duration::from_secs(600),
            ack_timeout: Duration::from_millis(10_000),
            reviewer_max_tokens: 800,
            next_steps: NextStepsPolicy::Generic,
        }
    }
}

impl ExecutionParams {
    // ==================== Builder Methods ====================

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_agent_timeout(mut self, timeout: Duration) -> Self {
        self.agent_timeout = timeout;
        self
    }

    pub fn with_reviewer_timeout(mut self, timeout: Duration) -> Self {
        self.reviewer_timeout = timeout;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    pub fn with_reviewer_max_tokens(mut self, max_tokens: u32) -> Self {
        self.reviewer_max_tokens = max_tokens;
        self
    }

    pub fn with_next_steps(mut self, policy: NextStepsPolicy) -> Self {
        self.next_steps = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let params = ExecutionParams::default();
        assert_eq!(params.max_iterations, 10);
        assert_eq!(params.agent_timeout, Duration::from_secs(180));
        assert_eq!(params.deadline, Duration::from_secs(600));
        assert_eq!(params.ack_timeout, Duration::from_millis(10_000));
        assert_eq!(params.next_steps, NextStepsPolicy::Generic);
    }

    #[test]
    fn test_builder() {
        let params = ExecutionParams::default()
            .with_max_iterations(3)
            .with_agent_timeout(Duration::from_secs(5))
            .with_next_steps(NextStepsPolicy::Disabled);

        assert_eq!(params.max_iterations, 3);
        assert_eq!(params.agent_timeout, Duration::from_secs(5));
        assert_eq!(params.next_steps, NextStepsPolicy::Disabled);
    }
}
