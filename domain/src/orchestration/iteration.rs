//! Per-iteration context
//!
//! Each iteration gets a fresh [`IterationContext`]. The task text of a looped
//! iteration is always derived from the original user message, so guidance
//! never accumulates across iterations.

use crate::agent::{AgentKind, AgentResult};
use crate::core::error::DomainError;
use crate::core::string::preview;
use crate::review::ActionRequest;
use regex::Regex;
use std::sync::LazyLock;

/// Default bound on iterations per message
pub const MAX_ITERATIONS: usize = 10;

/// Prior results summarized for the reviewer
const PREVIOUS_CONTEXT_RESULTS: usize = 3;
/// Characters of each prior result shown to the reviewer
const PREVIOUS_CONTEXT_CHARS: usize = 200;

static BACKTICKED_COMMAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`]+)`").expect("valid regex"));

#[derive(Debug, Clone, PartialEq)]
pub struct IterationContext {
    original_message: String,
    message: String,
    iteration_index: usize,
    max_iterations: usize,
    previous_results: Vec<AgentResult>,
}

impl IterationContext {
    /// Context for the first iteration of `message`.
    pub fn first(message: impl Into<String>, max_iterations: usize) -> Self {
        let message = message.into();
        Self {
            original_message: message.clone(),
            message,
            iteration_index: 0,
            max_iterations,
            previous_results: Vec::new(),
        }
    }

    /// The user's message as received
    pub fn original_message(&self) -> &str {
        &self.original_message
    }

    /// Task text agents receive in this iteration
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn iteration_index(&self) -> usize {
        self.iteration_index
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Results of the previous iteration (empty on the first)
    pub fn previous_results(&self) -> &[AgentResult] {
        &self.previous_results
    }

    pub fn remaining_loops(&self) -> usize {
        self.max_iterations
            .saturating_sub(self.iteration_index)
            .saturating_sub(1)
    }

    /// Checked before every Dispatching entry.
    pub fn ensure_can_dispatch(&self) -> Result<(), DomainError> {
        if self.iteration_index < self.max_iterations {
            Ok(())
        } else {
            Err(DomainError::IterationBoundExceeded {
                index: self.iteration_index,
                max: self.max_iterations,
            })
        }
    }

    /// Bounded summary of the previous iteration for the reviewer prompt.
    pub fn previous_context(&self) -> Option<String> {
        if self.previous_results.is_empty() {
            return None;
        }
        let mut out = String::from("Previous iteration results:\n");
        for result in self.top_previous() {
            out.push_str(&format!(
                "- {}: {}\n",
                result.display_name,
                preview(&result.result, PREVIOUS_CONTEXT_CHARS)
            ));
        }
        Some(out)
    }

    /// One-line digests of the previous iteration for agents.
    pub fn prior_findings(&self) -> Vec<String> {
        self.top_previous()
            .map(|r| r.digest(PREVIOUS_CONTEXT_CHARS))
            .collect()
    }

    fn top_previous(&self) -> impl Iterator<Item = &AgentResult> {
        let mut ranked: Vec<&AgentResult> = self.previous_results.iter().collect();
        // Stable sort keeps dispatch order among equal confidences
        ranked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        ranked.into_iter().take(PREVIOUS_CONTEXT_RESULTS)
    }

    /// Context for the next iteration after a loop decision.
    ///
    /// `shell_selected` says whether the shell executor takes part in the
    /// next dispatch; a backticked command in the guidance is then handed
    /// to it directly.
    pub fn next(
        &self,
        guidance: &str,
        action: Option<&ActionRequest>,
        shell_selected: bool,
        results: Vec<AgentResult>,
    ) -> Self {
        Self {
            original_message: self.original_message.clone(),
            message: augment(&self.original_message, guidance, action, shell_selected),
            iteration_index: self.iteration_index + 1,
            max_iterations: self.max_iterations,
            previous_results: results,
        }
    }
}

/// Task text for a looped iteration.
pub fn augment(
    original: &str,
    guidance: &str,
    action: Option<&ActionRequest>,
    shell_selected: bool,
) -> String {
    let command = match action {
        Some(action) if action.agent == AgentKind::SystemSearch => Some(action.command.as_str()),
        Some(_) => None,
        None if shell_selected => BACKTICKED_COMMAND
            .captures(guidance)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str()),
        None => None,
    };

    match command {
        Some(cmd) => format!("Execute: `{}`\n\nOriginal request: {}", cmd, original),
        None => format!("{}\n\nRefinement guidance: {}", original, guidance),
    }
}
