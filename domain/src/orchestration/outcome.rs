//! Terminal outcomes of one orchestration

use crate::agent::AgentResult;
use serde::{Deserialize, Serialize};

/// Role attached to messages produced by the reviewer
pub const CHIEF_ROLE: &str = "The Chief Agent";

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// The reviewer (or an agent) decided
    Decided,
    MaxIterationsReached,
    DeadlineExceeded,
    Cancelled,
}

impl TerminationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminationReason::Decided => "decided",
            TerminationReason::MaxIterationsReached => "max_iterations_reached",
            TerminationReason::DeadlineExceeded => "deadline_exceeded",
            TerminationReason::Cancelled => "cancelled",
        }
    }

    /// Note prepended to forced final answers
    pub fn notice(&self, max_iterations: usize) -> Option<String> {
        match self {
            TerminationReason::Decided => None,
            TerminationReason::MaxIterationsReached => Some(format!(
                "**Note:** Maximum iterations ({}) reached.",
                max_iterations
            )),
            TerminationReason::DeadlineExceeded => {
                Some("**Note:** Processing time limit reached.".to_string())
            }
            TerminationReason::Cancelled => {
                Some("**Note:** Processing was cancelled.".to_string())
            }
        }
    }
}

/// Metadata section of the final payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinalMetadata {
    pub all_results: Vec<AgentResult>,
}

/// Structured part of a final answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalPayload {
    pub role: String,
    pub selected_agent: String,
    pub chief_reasoning: String,
    /// Highest confidence among the final iteration's results
    pub confidence: f64,
    pub method: String,
    /// Seconds from message receipt to final answer
    pub orchestration_time: f64,
    pub iterations: usize,
    pub termination: TerminationReason,
    pub metadata: FinalMetadata,
}

/// Final answer delivered to the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalAnswer {
    pub text: String,
    pub payload: FinalPayload,
}

/// Clarification request delivered to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clarification {
    /// The question exactly as the agent or reviewer asked it
    pub question: String,
    /// Formatted message
    pub text: String,
    /// Who is asking
    pub role: String,
    pub iterations: usize,
}

/// Exactly one per orchestrated message
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Final(FinalAnswer),
    Clarify(Clarification),
}

impl Outcome {
    pub fn text(&self) -> &str {
        match self {
            Outcome::Final(answer) => &answer.text,
            Outcome::Clarify(clarification) => &clarification.text,
        }
    }

    pub fn iterations(&self) -> usize {
        match self {
            Outcome::Final(answer) => answer.payload.iterations,
            Outcome::Clarify(clarification) => clarification.iterations,
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, Outcome::Final(_))
    }
}
