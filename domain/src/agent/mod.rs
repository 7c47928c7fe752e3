//! Agent domain module
//!
//! Contains the agent catalogue ([`AgentKind`]), the value object every agent
//! invocation produces ([`AgentResult`]), and the classification of agent
//! crashes into targeted remediation text ([`failure`]).

pub mod failure;
pub mod kind;
pub mod result;

pub use failure::{AgentFailure, FailureClass};
pub use kind::AgentKind;
pub use result::{AgentResult, best_result};
