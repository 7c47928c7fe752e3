//! Task value object
//!
//! A [`Task`] is created once per incoming request and never mutated. The
//! optional [`ConversationContext`] carries prior turns and attached resource
//! ids, and is extended per iteration with prior findings so that agents which
//! care (the shell executor, mostly) can see what happened before.

use super::error::DomainError;
use serde::{Deserialize, Serialize};

/// One prior turn in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: String,
    pub content: String,
}

impl ConversationTurn {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Conversation context handed to agents alongside the task text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationContext {
    /// Prior turns, oldest first
    #[serde(default)]
    pub turns: Vec<ConversationTurn>,
    /// Ids of attached resources (files, databases, notes)
    #[serde(default)]
    pub resource_ids: Vec<String>,
    /// Zero-based iteration the context was built for
    #[serde(default)]
    pub iteration: usize,
    /// One-line digests of results from earlier iterations
    #[serde(default)]
    pub prior_findings: Vec<String>,
}

impl ConversationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_turn(mut self, turn: ConversationTurn) -> Self {
        self.turns.push(turn);
        self
    }

    pub fn with_resource(mut self, id: impl Into<String>) -> Self {
        self.resource_ids.push(id.into());
        self
    }

    /// Derive the context for a given iteration, replacing prior findings.
    pub fn for_iteration(&self, iteration: usize, prior_findings: Vec<String>) -> Self {
        Self {
            turns: self.turns.clone(),
            resource_ids: self.resource_ids.clone(),
            iteration,
            prior_findings,
        }
    }

    /// Render as plain text for prompt inclusion.
    pub fn render(&self, user_query: &str) -> String {
        let mut out = format!(
            "User Query: {}\nIteration: {}",
            user_query,
            self.iteration + 1
        );
        if !self.turns.is_empty() {
            out.push_str("\nRecent Turns:");
            // Only the last five turns are useful to an agent
            let start = self.turns.len().saturating_sub(5);
            for turn in &self.turns[start..] {
                out.push_str(&format!("\n- {}: {}", turn.role, turn.content));
            }
        }
        if !self.resource_ids.is_empty() {
            out.push_str(&format!("\nAttached: {}", self.resource_ids.join(", ")));
        }
        if !self.prior_findings.is_empty() {
            out.push_str("\nPrevious Results:");
            for finding in &self.prior_findings {
                out.push_str(&format!("\n- {}", finding));
            }
        }
        out
    }
}

/// A user request to be orchestrated (Value Object)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    context: Option<ConversationContext>,
}

impl Task {
    /// Create a new task, rejecting empty or whitespace-only messages
    pub fn new(message: impl Into<String>) -> Result<Self, DomainError> {
        let message = message.into();
        if message.trim().is_empty() {
            return Err(DomainError::EmptyTask);
        }
        Ok(Self {
            message,
            context: None,
        })
    }

    pub fn with_context(mut self, context: ConversationContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn context(&self) -> Option<&ConversationContext> {
        self.context.as_ref()
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}
