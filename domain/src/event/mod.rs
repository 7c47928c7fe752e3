//! Streaming event model
//!
//! Events are what an observer sees of one orchestration. Per iteration the
//! order is: one `action`, the `agent_result`s in completion order, an
//! optional `note_saved`, then exactly one of `final`, `clarify` or
//! `loop_continue`. The wire shape is a flat JSON object with a `type` tag and
//! an optional `eid` when acknowledgment is requested.

use crate::agent::AgentResult;
use crate::orchestration::{Clarification, FinalAnswer, FinalPayload};
use serde::{Deserialize, Serialize};

/// Result metadata carried on `agent_result` events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResultMeta {
    /// Stable agent name
    pub agent: String,
    pub confidence: f64,
    pub method: String,
    pub explanation: String,
    pub iteration: usize,
}

/// One orchestration event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Processing announcement at the start of an iteration
    Action {
        function: String,
        text: String,
        iteration: usize,
        max_iterations: usize,
        agents: Vec<String>,
    },
    /// One agent finished
    AgentResult {
        agent_name: String,
        text: String,
        summary: String,
        metadata: AgentResultMeta,
    },
    /// Iteration notes were persisted
    NoteSaved {
        note_id: String,
        iteration: usize,
        is_final: bool,
        message: String,
    },
    /// Another iteration follows
    LoopContinue {
        iteration: usize,
        max_iterations: usize,
        remaining_loops: usize,
        guidance: String,
        text: String,
    },
    /// Terminal answer
    Final { text: String, json: FinalPayload },
    /// Terminal clarification request
    Clarify {
        question: String,
        text: String,
        role: String,
    },
    /// The request could not be orchestrated at all
    Error { message: String },
}

impl Event {
    /// Processing announcement for iteration `iteration` (zero-based).
    pub fn processing(
        text: impl Into<String>,
        iteration: usize,
        max_iterations: usize,
        agents: Vec<String>,
    ) -> Self {
        Event::Action {
            function: "processing".to_string(),
            text: text.into(),
            iteration: iteration + 1,
            max_iterations,
            agents,
        }
    }

    pub fn agent_result(result: &AgentResult, iteration: usize) -> Self {
        Event::AgentResult {
            agent_name: result.display_name.clone(),
            text: result.result.clone(),
            summary: result.summary.clone(),
            metadata: AgentResultMeta {
                agent: result.agent_name.clone(),
                confidence: result.confidence,
                method: result.method.clone(),
                explanation: result.explanation.clone(),
                iteration: iteration + 1,
            },
        }
    }

    pub fn final_answer(answer: &FinalAnswer) -> Self {
        Event::Final {
            text: answer.text.clone(),
            json: answer.payload.clone(),
        }
    }

    pub fn clarify(clarification: &Clarification) -> Self {
        Event::Clarify {
            question: clarification.question.clone(),
            text: clarification.text.clone(),
            role: clarification.role.clone(),
        }
    }

    /// Wire `type` tag
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::Action { .. } => "action",
            Event::AgentResult { .. } => "agent_result",
            Event::NoteSaved { .. } => "note_saved",
            Event::LoopContinue { .. } => "loop_continue",
            Event::Final { .. } => "final",
            Event::Clarify { .. } => "clarify",
            Event::Error { .. } => "error",
        }
    }

    /// `function` field of action events
    pub fn function(&self) -> Option<&str> {
        match self {
            Event::Action { function, .. } => Some(function),
            _ => None,
        }
    }

    /// Announcements and iteration-ending events request acknowledgment.
    pub fn requires_ack(&self) -> bool {
        matches!(
            self,
            Event::Action { .. }
                | Event::LoopContinue { .. }
                | Event::Final { .. }
                | Event::Clarify { .. }
        )
    }

    /// Ends the whole orchestration
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Event::Final { .. } | Event::Clarify { .. } | Event::Error { .. }
        )
    }
}

/// Event as sent over a transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    #[serde(flatten)]
    pub event: Event,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eid: Option<String>,
}

impl EventEnvelope {
    pub fn new(event: Event) -> Self {
        Self { event, eid: None }
    }

    pub fn with_eid(event: Event, eid: impl Into<String>) -> Self {
        Self {
            event,
            eid: Some(eid.into()),
        }
    }
}
