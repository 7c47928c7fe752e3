//! Port for structured conversation logging.
//!
//! Defines the [`ConversationLogger`] trait for recording the orchestration
//! transcript (classification, agent results, reviewer decisions, terminal
//! outcome) to a structured log.
//!
//! This is separate from `tracing`-based operation logs: tracing handles
//! human-readable diagnostic messages, while this port captures the
//! transcript in a machine-readable format (JSONL).

use cedar_domain::{AgentResult, Classification, Decision, Outcome};
use serde_json::{Value, json};

/// A structured conversation event for logging.
///
/// Each event has a type string and a JSON payload containing event-specific
/// fields. The adapter adds the timestamp.
pub struct ConversationEvent {
    /// Event type identifier (e.g., "classification", "agent_result", "decision").
    pub event_type: &'static str,
    /// JSON payload with event-specific data.
    pub payload: Value,
}

impl ConversationEvent {
    pub fn new(event_type: &'static str, payload: Value) -> Self {
        Self {
            event_type,
            payload,
        }
    }

    pub fn classification(message: &str, classification: &Classification) -> Self {
        Self::new(
            "classification",
            json!({
                "message": message,
                "complexity": classification.complexity,
                "identified_type": classification.identified_type,
                "agents": classification.agents_to_use,
                "rationale": classification.rationale,
            }),
        )
    }

    pub fn agent_result(iteration: usize, result: &AgentResult) -> Self {
        Self::new(
            "agent_result",
            json!({
                "iteration": iteration + 1,
                "result": result,
            }),
        )
    }

    pub fn decision(iteration: usize, decision: &Decision) -> Self {
        Self::new(
            "decision",
            json!({
                "iteration": iteration + 1,
                "decision": decision,
            }),
        )
    }

    pub fn outcome(outcome: &Outcome) -> Self {
        let payload = match outcome {
            Outcome::Final(answer) => json!({
                "kind": "final",
                "text": answer.text,
                "payload": answer.payload,
            }),
            Outcome::Clarify(clarification) => json!({
                "kind": "clarify",
                "clarification": clarification,
            }),
        };
        Self::new("outcome", payload)
    }
}

/// Port for logging conversation events to a structured log.
///
/// Implementations write each event as a single record (e.g., one JSONL line).
/// The `log` method is synchronous and non-fallible so it never disrupts the
/// orchestration; logging failures are ignored.
pub trait ConversationLogger: Send + Sync {
    /// Record a conversation event.
    fn log(&self, event: ConversationEvent);
}

/// No-op implementation for tests and when logging is disabled.
pub struct NoConversationLogger;

impl ConversationLogger for NoConversationLogger {
    fn log(&self, _event: ConversationEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use cedar_domain::{AgentKind, TaskClassifier};

    #[test]
    fn test_classification_payload() {
        let classification = TaskClassifier::new().classify("2+2");
        let event = ConversationEvent::classification("2+2", &classification);
        assert_eq!(event.event_type, "classification");
        assert_eq!(event.payload["identified_type"], "simple_calculation");
        assert_eq!(event.payload["agents"][0], "computation");
    }

    #[test]
    fn test_decision_payload_is_flat() {
        let decision = Decision::final_answer("4", "Coding Agent", "exact");
        let event = ConversationEvent::decision(0, &decision);
        assert_eq!(event.payload["iteration"], 1);
        assert_eq!(event.payload["decision"]["decision"], "final");
        assert_eq!(event.payload["decision"]["final_answer"], "4");

        let result = AgentResult::new(AgentKind::Computation, "4", 0.95, "eval");
        let event = ConversationEvent::agent_result(1, &result);
        assert_eq!(event.payload["result"]["agent_name"], "CodeAgent");
    }
}
