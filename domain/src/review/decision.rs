//! Decision value object

use super::parsing::DecisionParseError;
use crate::agent::{AgentKind, AgentResult, best_result};
use serde::{Deserialize, Serialize};

/// Structured command the reviewer wants a specific agent to run next
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub agent: AgentKind,
    pub command: String,
}

impl ActionRequest {
    pub fn new(agent: AgentKind, command: impl Into<String>) -> Self {
        Self {
            agent,
            command: command.into(),
        }
    }
}

/// What the reviewer decided
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Stop and answer
    Final { answer: String },
    /// Run another iteration with refinement guidance
    Loop {
        guidance: String,
        action: Option<ActionRequest>,
    },
    /// Stop and ask the user
    Clarify { question: String },
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Final { .. } => "final",
            Verdict::Loop { .. } => "loop",
            Verdict::Clarify { .. } => "clarify",
        }
    }
}

/// One reviewer decision per iteration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "DecisionWire", into = "DecisionWire")]
pub struct Decision {
    pub verdict: Verdict,
    /// Agent whose result the decision relies on, or "combined"
    pub selected_agent: String,
    pub reasoning: String,
    pub query_assessment: String,
    pub thinking_process: String,
    /// True when produced by the deterministic fallback rather than the reviewer
    pub fallback: bool,
}

impl Decision {
    fn with_verdict(verdict: Verdict, selected_agent: impl Into<String>, reasoning: impl Into<String>) -> Self {
        Self {
            verdict,
            selected_agent: selected_agent.into(),
            reasoning: reasoning.into(),
            query_assessment: String::new(),
            thinking_process: String::new(),
            fallback: false,
        }
    }

    pub fn final_answer(
        answer: impl Into<String>,
        selected_agent: impl Into<String>,
        reasoning: impl Into<String>,
    ) -> Self {
        Self::with_verdict(
            Verdict::Final {
                answer: answer.into(),
            },
            selected_agent,
            reasoning,
        )
    }

    pub fn loop_with(
        guidance: impl Into<String>,
        action: Option<ActionRequest>,
        selected_agent: impl Into<String>,
        reasoning: impl Into<String>,
    ) -> Self {
        Self::with_verdict(
            Verdict::Loop {
                guidance: guidance.into(),
                action,
            },
            selected_agent,
            reasoning,
        )
    }

    pub fn clarify(
        question: impl Into<String>,
        selected_agent: impl Into<String>,
        reasoning: impl Into<String>,
    ) -> Self {
        Self::with_verdict(
            Verdict::Clarify {
                question: question.into(),
            },
            selected_agent,
            reasoning,
        )
    }

    /// Clarification requested by an agent; the reviewer is not consulted.
    pub fn agent_clarification(result: &AgentResult) -> Self {
        Self::clarify(
            result.clarification_question.clone(),
            result.display_name.clone(),
            format!("{} needs more information", result.display_name),
        )
    }

    /// Deterministic fallback: the highest-confidence result (first on ties)
    /// becomes the final answer.
    pub fn fallback(results: &[AgentResult], reason: impl Into<String>) -> Self {
        let (answer, selected) = match best_result(results) {
            Some(best) => (best.result.clone(), best.display_name.clone()),
            None => ("No results available".to_string(), "None".to_string()),
        };
        let mut decision = Self::final_answer(answer, selected, reason);
        decision.fallback = true;
        decision
    }

    pub fn with_assessment(
        mut self,
        query_assessment: impl Into<String>,
        thinking_process: impl Into<String>,
    ) -> Self {
        self.query_assessment = query_assessment.into();
        self.thinking_process = thinking_process.into();
        self
    }

    /// "final", "loop" or "clarify"
    pub fn kind(&self) -> &'static str {
        self.verdict.as_str()
    }

    pub fn is_final(&self) -> bool {
        matches!(self.verdict, Verdict::Final { .. })
    }

    pub fn answer(&self) -> Option<&str> {
        match &self.verdict {
            Verdict::Final { answer } => Some(answer),
            _ => None,
        }
    }

    pub fn guidance(&self) -> Option<&str> {
        match &self.verdict {
            Verdict::Loop { guidance, .. } => Some(guidance),
            _ => None,
        }
    }

    pub fn question(&self) -> Option<&str> {
        match &self.verdict {
            Verdict::Clarify { question } => Some(question),
            _ => None,
        }
    }
}

/// Flat wire shape of a [`Decision`]
///
/// This is what the reviewer is asked to produce and what the decision
/// serializes to. Unknown fields (such as `efficiency_note`) are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionWire {
    #[serde(default)]
    pub decision: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_guidance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clarification_question: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<WireAction>,
    #[serde(default)]
    pub selected_agent: Option<String>,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub query_assessment: Option<String>,
    #[serde(default)]
    pub thinking_process: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fallback: bool,
}

/// Loosely typed action as the reviewer writes it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireAction {
    pub agent: String,
    pub command: String,
}

/// Non-empty trimmed string, if any
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl TryFrom<DecisionWire> for Decision {
    type Error = DecisionParseError;

    fn try_from(wire: DecisionWire) -> Result<Self, Self::Error> {
        let verdict = match wire.decision.trim().to_lowercase().as_str() {
            "final" => Verdict::Final {
                answer: present(wire.final_answer)
                    .ok_or(DecisionParseError::MissingField("final_answer"))?,
            },
            "loop" => {
                let guidance = present(wire.additional_guidance)
                    .ok_or(DecisionParseError::MissingField("additional_guidance"))?;
                // An unusable action degrades to plain guidance
                let action = wire.action.and_then(|a| {
                    let agent = a.agent.parse::<AgentKind>().ok()?;
                    let command = a.command.trim();
                    (!command.is_empty()).then(|| ActionRequest::new(agent, command))
                });
                Verdict::Loop { guidance, action }
            }
            "clarify" => Verdict::Clarify {
                question: present(wire.clarification_question)
                    .ok_or(DecisionParseError::MissingField("clarification_question"))?,
            },
            other => return Err(DecisionParseError::UnknownDecision(other.to_string())),
        };

        Ok(Decision {
            verdict,
            selected_agent: wire.selected_agent.unwrap_or_default(),
            reasoning: wire.reasoning.unwrap_or_default(),
            query_assessment: wire.query_assessment.unwrap_or_default(),
            thinking_process: wire.thinking_process.unwrap_or_default(),
            fallback: wire.fallback,
        })
    }
}

impl From<Decision> for DecisionWire {
    fn from(decision: Decision) -> Self {
        let mut wire = DecisionWire {
            decision: decision.verdict.as_str().to_string(),
            selected_agent: Some(decision.selected_agent),
            reasoning: Some(decision.reasoning),
            query_assessment: Some(decision.query_assessment),
            thinking_process: Some(decision.thinking_process),
            fallback: decision.fallback,
            ..Default::default()
        };
        match decision.verdict {
            Verdict::Final { answer } => wire.final_answer = Some(answer),
            Verdict::Loop { guidance, action } => {
                wire.additional_guidance = Some(guidance);
                wire.action = action.map(|a| WireAction {
                    agent: a.agent.as_str().to_string(),
                    command: a.command,
                });
            }
            Verdict::Clarify { question } => wire.clarification_question = Some(question),
        }
        wire
    }
}
