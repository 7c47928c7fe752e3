//! Iteration loop domain
//!
//! The bounded Classify → Dispatch → Review state machine, the per-iteration
//! context value, terminal outcomes, and final answer formatting. The loop
//! driver itself lives in the application layer.

pub mod formatting;
pub mod iteration;
pub mod outcome;
pub mod state;

pub use formatting::{
    format_agent_clarification, format_final_text, format_reviewer_clarification,
    processing_announcement, refinement_notice, timing_footer,
};
pub use iteration::{IterationContext, MAX_ITERATIONS};
pub use outcome::{
    CHIEF_ROLE, Clarification, FinalAnswer, FinalMetadata, FinalPayload, Outcome, TerminationReason,
};
pub use state::LoopState;
