//! Domain layer for cedar
//!
//! This crate contains the core orchestration model: value objects, the task
//! classifier, reviewer decisions, the iteration state machine, event and
//! note shapes. It has no dependencies on I/O, async runtimes or
//! infrastructure concerns.
//!
//! # Core Concepts
//!
//! ## Agents
//!
//! An agent is a capability unit identified by an [`AgentKind`]. Every
//! invocation yields exactly one [`AgentResult`], even on failure.
//!
//! ## Thinker → Dispatch → Review
//!
//! - **Thinker** ([`TaskClassifier`]): picks the minimal agent subset
//! - **Dispatch**: selected agents run concurrently (application layer)
//! - **Review** ([`Decision`]): the Chief Agent decides `final`, `loop` or
//!   `clarify`; anything unparseable falls back to the best result

pub mod agent;
pub mod core;
pub mod event;
pub mod notes;
pub mod orchestration;
pub mod prompt;
pub mod review;
pub mod thinker;

// Re-export commonly used types
pub use agent::{AgentFailure, AgentKind, AgentResult, FailureClass, best_result};
pub use core::{
    error::DomainError,
    string::{prefix, preview, truncate},
    task::{ConversationContext, ConversationTurn, Task},
};
pub use event::{AgentResultMeta, Event, EventEnvelope};
pub use notes::IterationNote;
pub use orchestration::{
    CHIEF_ROLE, Clarification, FinalAnswer, FinalMetadata, FinalPayload, IterationContext,
    LoopState, MAX_ITERATIONS, Outcome, TerminationReason,
};
pub use prompt::{AgentPromptTemplate, PromptTemplate, SpecialistProfile};
pub use review::{
    ActionRequest, Decision, DecisionParseError, NextStepsPolicy, Verdict,
    parse_decision_response,
};
pub use thinker::{Classification, Complexity, TaskClassifier, TaskType};
