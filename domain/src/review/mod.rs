//! Reviewer ("Chief Agent") decisions
//!
//! The reviewer judges the aggregate of one iteration's results and returns a
//! [`Decision`]. Decisions are validated at the parse boundary: anything that
//! does not fit the tagged union is rejected and replaced by the deterministic
//! [`Decision::fallback`].

pub mod decision;
pub mod next_steps;
pub mod parsing;

pub use decision::{ActionRequest, Decision, DecisionWire, Verdict, WireAction};
pub use next_steps::{GENERIC_NEXT_STEPS, NextStepsPolicy};
pub use parsing::{DecisionParseError, extract_json_object, parse_decision_response};
