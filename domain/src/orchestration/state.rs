//! Loop state machine

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};

/// State of the iteration loop
///
/// ```text
/// Thinking → Dispatching → Reviewing → Final
///                ↑              ├────→ Clarifying
///                └── Looping ←──┘
/// ```
///
/// `Dispatching → Clarifying` covers an agent asking for clarification (the
/// reviewer is skipped). `Thinking/Dispatching/Looping → Final` covers forced
/// termination (iteration bound, deadline, cancellation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Thinking,
    Dispatching,
    Reviewing,
    Looping,
    Final,
    Clarifying,
}

impl LoopState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoopState::Thinking => "thinking",
            LoopState::Dispatching => "dispatching",
            LoopState::Reviewing => "reviewing",
            LoopState::Looping => "looping",
            LoopState::Final => "final",
            LoopState::Clarifying => "clarifying",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LoopState::Final | LoopState::Clarifying)
    }

    pub fn can_transition_to(&self, next: LoopState) -> bool {
        use LoopState::*;
        matches!(
            (self, next),
            (Thinking, Dispatching)
                | (Thinking, Final)
                | (Dispatching, Reviewing)
                | (Dispatching, Clarifying)
                | (Dispatching, Final)
                | (Reviewing, Final)
                | (Reviewing, Looping)
                | (Reviewing, Clarifying)
                | (Looping, Dispatching)
                | (Looping, Final)
        )
    }

    /// Move to `next`, rejecting transitions the machine does not allow.
    pub fn transition(self, next: LoopState) -> Result<LoopState, DomainError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(DomainError::InvalidTransition {
                from: self.as_str().to_string(),
                to: next.as_str().to_string(),
            })
        }
    }
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
