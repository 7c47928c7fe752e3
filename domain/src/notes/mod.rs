//! Iteration notes
//!
//! After each reviewer decision the orchestrator may persist what the agents
//! found. [`IterationNote::compose`] builds the markdown body and tags; where
//! and how it is stored is up to the `NoteSink` implementation.

use crate::agent::{AgentKind, AgentResult};
use crate::core::string::{prefix, preview};
use crate::review::{Decision, Verdict};
use serde::{Deserialize, Serialize};

const KEY_FINDING_CHARS: usize = 200;
const FINAL_ANSWER_CHARS: usize = 500;

/// Composed note for one iteration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationNote {
    /// Markdown body
    pub content: String,
    pub tags: Vec<String>,
    /// One-based iteration number
    pub iteration: usize,
    /// False when the decision was a loop
    pub is_final: bool,
}

impl IterationNote {
    /// Build the note for one iteration.
    ///
    /// `timestamp` is rendered in the header (e.g. `2024-01-01 12:00:00 UTC`)
    /// and `date` becomes the `date:` tag (`YYYY-MM-DD`).
    pub fn compose(
        user_query: &str,
        results: &[AgentResult],
        decision: &Decision,
        iteration: usize,
        timestamp: &str,
        date: &str,
    ) -> Self {
        let mut content = format!(
            "## Query Analysis - {}\n\n**User Query:** {}\n\n",
            timestamp, user_query
        );

        if let Some(notes) = structured_notes(results) {
            content.push_str(&format!("### Structured Notes\n{}\n\n", notes));
        }

        let reasoning = if decision.reasoning.is_empty() {
            "No reasoning provided"
        } else {
            decision.reasoning.as_str()
        };
        content.push_str(&format!(
            "### Chief Agent Analysis\n**Decision:** {}\n**Selected Agent:** {}\n**Reasoning:** {}\n\n",
            decision.kind(),
            if decision.selected_agent.is_empty() {
                "unknown"
            } else {
                decision.selected_agent.as_str()
            },
            reasoning
        ));

        content.push_str("### Agent Findings\n");
        for result in results
            .iter()
            .filter(|r| r.agent_name != AgentKind::Documentation.agent_name())
        {
            content.push_str(&format!(
                "\n#### {}\n- **Confidence:** {:.2}\n- **Method:** {}\n",
                result.display_name, result.confidence, result.method
            ));
            let finding = result.key_finding(KEY_FINDING_CHARS);
            if !finding.is_empty() {
                content.push_str(&format!("- **Key Finding:** {}\n", finding));
            }
        }

        match &decision.verdict {
            Verdict::Final { answer } => {
                content.push_str(&format!(
                    "\n### Final Answer\n{}\n",
                    prefix(answer, FINAL_ANSWER_CHARS)
                ));
            }
            Verdict::Loop { guidance, .. } => {
                content.push_str(&format!("\n### Future Guidance\n{}\n", guidance));
            }
            Verdict::Clarify { question } => {
                content.push_str(&format!("\n### Open Question\n{}\n", question));
            }
        }

        Self {
            content,
            tags: tags(user_query, decision, date),
            iteration: iteration + 1,
            is_final: !matches!(decision.verdict, Verdict::Loop { .. }),
        }
    }

    /// First line of the body, for titles and file names
    pub fn title(&self) -> String {
        preview(self.content.lines().next().unwrap_or_default().trim_start_matches("## "), 80)
    }
}

/// Notes produced by the documentation agent, if it ran.
fn structured_notes(results: &[AgentResult]) -> Option<&str> {
    let notes = results
        .iter()
        .find(|r| r.agent_name == AgentKind::Documentation.agent_name())?;
    let body = notes.result.split_once("Answer: Notes Created\n\n")?.1;
    let body = body.rsplit_once("\n\nWhy:").map_or(body, |(b, _)| b).trim();
    (!body.is_empty()).then_some(body)
}

fn tags(user_query: &str, decision: &Decision, date: &str) -> Vec<String> {
    let mut tags = Vec::new();

    let selected = decision.selected_agent.trim();
    if !selected.is_empty() && !selected.eq_ignore_ascii_case("combined") {
        tags.push(format!("agent:{}", selected.to_lowercase().replace(' ', "_")));
    }

    let query = user_query.to_lowercase();
    let topics: [(&str, &[&str]); 6] = [
        ("math", &["calculate", "compute", "math"]),
        ("code", &["code", "program", "function"]),
        ("database", &["sql", "database", "query"]),
        ("research", &["research", "find", "search"]),
        ("strategy", &["plan", "strategy", "approach"]),
        ("explanation", &["explain", "why", "how"]),
    ];
    for (tag, words) in topics {
        if words.iter().any(|w| query.contains(w)) {
            tags.push(tag.to_string());
        }
    }

    tags.push(
        if matches!(decision.verdict, Verdict::Loop { .. }) {
            "iterative"
        } else {
            "direct"
        }
        .to_string(),
    );
    tags.push(format!("date:{}", date));
    tags
}
