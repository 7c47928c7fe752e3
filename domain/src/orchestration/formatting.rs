//! User-facing text for terminal outcomes

use crate::agent::AgentResult;
use crate::review::{Decision, NextStepsPolicy};
use crate::thinker::Classification;

const ANSWER: &str = "Answer:";
const WHY: &str = "Why:";
const AGENTS_FOUND: &str = "What Each Agent Found:";
const ISSUES: &str = "Potential Issues:";
const NEXT_STEPS: &str = "Suggested Next Steps:";

/// Body of the labelled section in `text`: from after `label` up to a blank
/// line or a line starting with one of `stops`.
fn section<'a>(text: &'a str, label: &str, stops: &[&str]) -> Option<&'a str> {
    let start = text.find(label)? + label.len();
    let rest = &text[start..];
    let mut end = rest.find("\n\n").unwrap_or(rest.len());
    for stop in stops {
        if let Some(pos) = rest.find(&format!("\n{}", stop)) {
            end = end.min(pos);
        }
    }
    let body = rest[..end].trim();
    (!body.is_empty()).then_some(body)
}

/// True when the reviewer already produced the structured layout.
fn is_preformatted(text: &str) -> bool {
    text.contains(ANSWER)
        && (text.contains(WHY) || text.contains(AGENTS_FOUND) || text.contains(NEXT_STEPS))
}

/// Format a final answer as Answer / Why / What Each Agent Found / Potential
/// Issues / Suggested Next Steps.
///
/// Text that already has that structure is kept as is, with the next-steps
/// policy applied only if it lacks a next-steps section.
pub fn format_final_text(
    answer: &str,
    reasoning: &str,
    results: &[AgentResult],
    policy: NextStepsPolicy,
) -> String {
    if is_preformatted(answer) {
        let mut text = answer.trim_end().to_string();
        if !NextStepsPolicy::has_next_steps(answer)
            && let Some(suggestion) = policy.suggestion(answer)
        {
            text.push_str(&format!("\n\n**{}** {}", NEXT_STEPS, suggestion));
        }
        return text;
    }

    let answer_section = section(answer, ANSWER, &[WHY, ISSUES, NEXT_STEPS]);
    let why_section = section(answer, WHY, &[ISSUES, NEXT_STEPS]);

    let (main, why, issues, next_steps) = if answer_section.is_none() && why_section.is_none() {
        (answer.trim(), reasoning, None, None)
    } else {
        (
            answer_section.unwrap_or_else(|| answer.lines().next().unwrap_or_default()),
            why_section.unwrap_or(reasoning),
            section(answer, ISSUES, &[NEXT_STEPS]),
            section(answer, NEXT_STEPS, &[]),
        )
    };

    let mut text = format!("**Answer:** {}\n\n**Why:** {}\n\n", main, why);

    let summaries: Vec<&AgentResult> = results.iter().filter(|r| !r.summary.is_empty()).collect();
    if !summaries.is_empty() {
        text.push_str(&format!("**{}**\n", AGENTS_FOUND));
        for result in summaries {
            text.push_str(&format!("• **{}:** {}\n", result.display_name, result.summary));
        }
        text.push('\n');
    }

    if let Some(issues) = issues
        && !issues.eq_ignore_ascii_case("none")
    {
        text.push_str(&format!("**{}** {}\n\n", ISSUES, issues));
    }

    if let Some(steps) = next_steps.or_else(|| policy.suggestion(answer)) {
        text.push_str(&format!("**{}** {}\n\n", NEXT_STEPS, steps));
    }

    text.trim_end().to_string()
}

/// Timing line appended to final answers.
pub fn timing_footer(iterations: usize, seconds: f64) -> String {
    if iterations > 1 {
        format!("_Resolved after {} iterations in {:.1}s_", iterations, seconds)
    } else {
        format!("_Processed in {:.1}s_", seconds)
    }
}

/// Message for a clarification requested by an agent.
pub fn format_agent_clarification(result: &AgentResult) -> String {
    let so_far = result
        .result
        .split_once("Answer: ")
        .and_then(|(_, rest)| rest.lines().next())
        .filter(|line| !line.trim().is_empty())
        .unwrap_or("Processing incomplete");
    format!(
        "**Clarification Needed**\n\n**Question:** {}\n\n**Results So Far:** {}\n\n\
         **Next Steps:** Please provide more details to continue processing",
        result.clarification_question, so_far
    )
}

/// Message for a clarification requested by the reviewer.
pub fn format_reviewer_clarification(decision: &Decision) -> String {
    let question = decision.question().unwrap_or_default();
    let thinking = if decision.thinking_process.is_empty() {
        "Need more information from user"
    } else {
        decision.thinking_process.as_str()
    };
    let why = if decision.reasoning.is_empty() {
        "This information will help me provide a more accurate and helpful response."
    } else {
        decision.reasoning.as_str()
    };
    format!(
        "**Clarification Needed**\n\n{}\n\n**Question:** {}\n\n**Why I'm asking:** {}\n\n\
         Please provide this information so I can better assist you.",
        thinking, question, why
    )
}

/// Processing announcement sent at the start of each iteration.
pub fn processing_announcement(
    classification: &Classification,
    iteration: usize,
    max_iterations: usize,
) -> String {
    format!(
        "**Chief Agent Analysis** (Iteration {}/{})\n\n**Problem Assessment:**\n\
         I've analyzed your request as a {}.\n{}.\n\n**Solution Approach:**\n{}.\n\n\
         **Agent Assignments:**\n{}\n\nNow coordinating these agents to solve your request...",
        iteration + 1,
        max_iterations,
        classification.identified_type.as_str().replace('_', " "),
        classification.analysis.trim_end_matches('.'),
        classification.rationale.trim_end_matches('.'),
        classification.assignments()
    )
}

/// Text of the `loop_continue` event announcing iteration `next_iteration`
/// (zero-based).
pub fn refinement_notice(decision: &Decision, next_iteration: usize, max_iterations: usize) -> String {
    let thinking = if decision.thinking_process.is_empty() {
        "Analyzing how to improve the answer..."
    } else {
        decision.thinking_process.as_str()
    };
    format!(
        "Refining Answer (Iteration {}/{}, {} loops remaining)\n\n\
         **Chief Agent's Analysis:**\n{}\n\n**Next Approach:**\n{}\n\n\
         Running additional analysis...",
        next_iteration + 1,
        max_iterations,
        max_iterations.saturating_sub(next_iteration + 1),
        thinking,
        decision.guidance().unwrap_or_default()
    )
}
