//! Reviewer response parsing
//!
//! The reviewer is asked for a bare JSON object, but replies often arrive in
//! a markdown fence or surrounded by prose. The outermost `{ ... }` span is
//! extracted and validated; anything else is a [`DecisionParseError`] and the
//! caller falls back.

use super::decision::{Decision, DecisionWire};
use thiserror::Error;

/// Why a reviewer reply could not be turned into a [`Decision`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecisionParseError {
    #[error("no JSON object found in reviewer response")]
    NoJson,

    #[error("invalid JSON in reviewer response: {0}")]
    InvalidJson(String),

    #[error("unknown decision value: '{0}'")]
    UnknownDecision(String),

    #[error("decision is missing required field '{0}'")]
    MissingField(&'static str),
}

/// Outermost `{ ... }` span of `text`, if any.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Parse a reviewer reply into a validated [`Decision`].
pub fn parse_decision_response(text: &str) -> Result<Decision, DecisionParseError> {
    let json = extract_json_object(text).ok_or(DecisionParseError::NoJson)?;
    let wire: DecisionWire =
        serde_json::from_str(json).map_err(|e| DecisionParseError::InvalidJson(e.to_string()))?;
    Decision::try_from(wire)
}
