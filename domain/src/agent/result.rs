//! AgentResult value object
//!
//! Every agent invocation produces exactly one [`AgentResult`], including
//! configuration errors, inapplicable tasks, and crashes (the latter are
//! synthesized at the dispatcher boundary). The orchestrator treats results as
//! transient and passes them by value between iterations.

use super::kind::AgentKind;
use crate::core::string::{preview, truncate};
use serde::{Deserialize, Serialize};

/// Method label used for configuration error results
pub const CONFIGURATION_ERROR_METHOD: &str = "Configuration Error";

/// Result of one agent invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    /// Stable agent name (e.g. "ShellAgent")
    pub agent_name: String,
    /// User-facing label (e.g. "Shell Executor")
    pub display_name: String,
    /// Formatted result text
    pub result: String,
    /// Self-reported confidence in [0, 1]
    pub confidence: f64,
    /// How the result was obtained
    pub method: String,
    /// What the agent did, for the user
    #[serde(default)]
    pub explanation: String,
    /// Short summary of findings
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub needs_rerun: bool,
    #[serde(default)]
    pub rerun_reason: String,
    #[serde(default)]
    pub needs_clarification: bool,
    #[serde(default)]
    pub clarification_question: String,
}

fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

impl AgentResult {
    /// Create a result attributed to a known agent kind.
    pub fn new(
        kind: AgentKind,
        result: impl Into<String>,
        confidence: f64,
        method: impl Into<String>,
    ) -> Self {
        Self::named(
            kind.agent_name(),
            kind.display_name(),
            result,
            confidence,
            method,
        )
    }

    /// Create a result with explicit names (for agents outside the catalogue).
    pub fn named(
        agent_name: impl Into<String>,
        display_name: impl Into<String>,
        result: impl Into<String>,
        confidence: f64,
        method: impl Into<String>,
    ) -> Self {
        Self {
            agent_name: agent_name.into(),
            display_name: display_name.into(),
            result: result.into(),
            confidence: clamp_confidence(confidence),
            method: method.into(),
            explanation: String::new(),
            summary: String::new(),
            needs_rerun: false,
            rerun_reason: String::new(),
            needs_clarification: false,
            clarification_question: String::new(),
        }
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = explanation.into();
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    /// Mark the result as needing another run.
    pub fn with_rerun(mut self, reason: impl Into<String>) -> Self {
        self.needs_rerun = true;
        self.rerun_reason = reason.into();
        self
    }

    /// Mark the result as needing user clarification.
    pub fn with_clarification(mut self, question: impl Into<String>) -> Self {
        self.needs_clarification = true;
        self.clarification_question = question.into();
        self
    }

    /// Result for an agent whose backend or credentials are unavailable.
    ///
    /// This is a normal result with `confidence = 0.0`, not an error.
    pub fn configuration_error(kind: AgentKind, task: &str, detail: &str) -> Self {
        let details = format!(
            "Agent: {}\nTask: {}\nError: {}\nSuggested Fix: Configure a reasoning backend \
             (set the API key environment variable named in [reviewer].api_key_env) and retry",
            kind.agent_name(),
            truncate(task, 200),
            detail
        );
        Self::new(
            kind,
            format!(
                "**Agent Failure Report:**\n\nThe {} was unable to process your request due to \
                 missing configuration.\n\n**Error Details:**\n{}\n\n**What the Chief Agent \
                 should know:**\nThis agent requires a reasoning backend. Without it, no result \
                 is possible.",
                kind.display_name(),
                details
            ),
            0.0,
            CONFIGURATION_ERROR_METHOD,
        )
        .with_explanation(format!("Backend not available - {}", detail))
        .with_summary(format!("{} failed: {}", kind.display_name(), detail))
    }

    /// Low-confidence informative result for a task the agent does not apply to.
    pub fn inapplicable(kind: AgentKind, message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(kind, message.clone(), 0.1, "Task mismatch").with_explanation(message)
    }

    pub fn is_configuration_error(&self) -> bool {
        self.method == CONFIGURATION_ERROR_METHOD
    }

    /// Extract the key finding: the `Answer:` section if present, otherwise the
    /// first meaningful line.
    pub fn key_finding(&self, max_len: usize) -> String {
        if let Some(answer) = answer_section(&self.result) {
            return preview(answer, max_len);
        }
        self.result
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty() && !line.starts_with("Why:"))
            .map(|line| preview(line, max_len))
            .unwrap_or_default()
    }

    /// One-line digest used to describe this result to later iterations.
    pub fn digest(&self, max_len: usize) -> String {
        format!("{}: {}", self.display_name, preview(&self.result, max_len))
    }
}

/// Text following `Answer:` up to the next blank line.
fn answer_section(text: &str) -> Option<&str> {
    let start = text.find("Answer:")? + "Answer:".len();
    let rest = &text[start..];
    let end = rest.find("\n\n").unwrap_or(rest.len());
    let answer = rest[..end].trim();
    (!answer.is_empty()).then_some(answer)
}

/// Highest-confidence result; the first one wins on ties.
pub fn best_result(results: &[AgentResult]) -> Option<&AgentResult> {
    let mut best: Option<&AgentResult> = None;
    for result in results {
        match best {
            Some(current) if result.confidence <= current.confidence => {}
            _ => best = Some(result),
        }
    }
    best
}
