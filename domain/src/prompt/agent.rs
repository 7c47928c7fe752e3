//! Prompt profiles for backend-driven specialist agents
//!
//! Each specialist is the same procedure (one completion, wrapped as an
//! `Answer:` / `Why:` result) with different prompts and constants.

use crate::agent::AgentKind;
use crate::core::string::truncate;

/// Prompts and constants for one specialist agent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpecialistProfile {
    pub kind: AgentKind,
    pub system: &'static str,
    /// Prefix placed before the task in the user prompt
    pub request_prefix: &'static str,
    pub max_tokens: u32,
    pub temperature: f32,
    pub confidence: f64,
    pub method: &'static str,
    pub explanation: &'static str,
    /// Heading placed after `Answer:`
    pub heading: &'static str,
    /// Sentence placed after `Why:`
    pub why: &'static str,
    /// Verb phrase used to build the summary
    pub summary_prefix: &'static str,
}

impl SpecialistProfile {
    /// User prompt for `task`, with optional rendered context.
    pub fn user_prompt(&self, task: &str, context: Option<&str>) -> String {
        match context {
            Some(context) => format!("{}{}\n\nContext:\n{}", self.request_prefix, task, context),
            None => format!("{}{}", self.request_prefix, task),
        }
    }

    /// Result text wrapping the backend's reply.
    pub fn format_result(&self, reply: &str) -> String {
        format!(
            "Answer: {}\n\n{}\n\nWhy: {}",
            self.heading,
            reply.trim(),
            self.why
        )
    }

    pub fn summary(&self, task: &str) -> String {
        format!("{} {}", self.summary_prefix, truncate(task, 80))
    }
}

/// Specialist profiles
pub struct AgentPromptTemplate;

impl AgentPromptTemplate {
    pub const MATH: SpecialistProfile = SpecialistProfile {
        kind: AgentKind::MathDerivation,
        system: r#"You are a mathematical expert who derives formulas from first principles.
- Start from fundamental axioms and definitions
- Show each step of the derivation clearly
- Explain the reasoning behind each transformation
- Use proper mathematical notation
- Include any assumptions or constraints
- Provide the final formula and its applications"#,
        request_prefix: "Derive from first principles: ",
        max_tokens: 1500,
        temperature: 0.3,
        confidence: 0.85,
        method: "First principles derivation",
        explanation: "Mathematical derivation from axioms",
        heading: "Mathematical Derivation from First Principles",
        why: "Derived the formula step-by-step from fundamental mathematical principles",
        summary_prefix: "Derived formula from first principles for:",
    };

    pub const RESEARCH: SpecialistProfile = SpecialistProfile {
        kind: AgentKind::Research,
        system: r#"You are a research assistant. Based on the query, provide:
1. A list of relevant sources
2. Key content and findings from each source
3. A summary of the most important information
4. Citations and references

Format your response as:
- Source 1: [URL/Title] - Key findings
- Source 2: [URL/Title] - Key findings
etc.

Then provide a comprehensive summary."#,
        request_prefix: "Research this topic and find relevant sources: ",
        max_tokens: 1000,
        temperature: 0.5,
        confidence: 0.75,
        method: "Research synthesis",
        explanation: "Found and analyzed relevant sources",
        heading: "Research Results",
        why: "Compiled relevant sources and information for the topic",
        summary_prefix: "Compiled sources on:",
    };

    pub const STRATEGY: SpecialistProfile = SpecialistProfile {
        kind: AgentKind::Strategy,
        system: r#"You are a strategic planning expert. Create detailed action plans that include:
1. Breaking down the problem into manageable steps
2. Identifying which specialized agents should be used (available agents: Coding Agent, Shell Executor, SQL Agent, Math Agent, Research Agent, Data Agent, Notes Agent, File Manager)
3. Determining the sequence of operations
4. Specifying how to gather source material
5. How to analyze data and compile results

Format as a numbered step-by-step plan with:
- Step number and title
- Agent(s) to use
- Input/output for each step
- Dependencies between steps"#,
        request_prefix: "Create a strategic plan to address: ",
        max_tokens: 1200,
        temperature: 0.4,
        confidence: 0.80,
        method: "Strategic planning",
        explanation: "Developed detailed execution strategy",
        heading: "Strategic Action Plan",
        why: "Created a step-by-step plan with specific agent assignments",
        summary_prefix: "Planned steps for:",
    };

    pub const SCHEMA: SpecialistProfile = SpecialistProfile {
        kind: AgentKind::SchemaAnalysis,
        system: r#"You are a data analysis expert. Based on the user's query and any schema information provided:
1. List relevant tables and their purposes
2. Suggest SQL queries that would help answer the question
3. Explain what each query would return
4. Recommend data transformations or joins if needed

Format SQL queries properly with:
- Clear comments explaining the purpose
- Proper JOIN clauses if needed
- Appropriate WHERE conditions
- GROUP BY and aggregations as necessary"#,
        request_prefix: "Suggest relevant SQL queries for: ",
        max_tokens: 800,
        temperature: 0.3,
        confidence: 0.70,
        method: "Database analysis and SQL generation",
        explanation: "Analyzed schema and suggested queries",
        heading: "Database Analysis and SQL Suggestions",
        why: "Analyzed the available data and suggested relevant SQL queries",
        summary_prefix: "Suggested queries for:",
    };

    pub const NOTES: SpecialistProfile = SpecialistProfile {
        kind: AgentKind::Documentation,
        system: r#"You are a note-taking expert. Create concise, well-organized notes that:
1. Capture key findings and insights
2. Use bullet points and clear headings
3. Include important formulas, code snippets, or data
4. Add tags for easy searching later
5. Reference sources when applicable

Format notes with:
- Clear titles
- Categories/tags
- Key points
- Action items if any"#,
        request_prefix: "Create notes from the following content:\n",
        max_tokens: 600,
        temperature: 0.3,
        confidence: 0.85,
        method: "Intelligent note creation",
        explanation: "Created organized notes from findings",
        heading: "Notes Created",
        why: "Created structured notes from the provided content",
        summary_prefix: "Created notes for:",
    };

    /// Profile for a specialist kind, if it is one
    pub fn profile(kind: AgentKind) -> Option<SpecialistProfile> {
        match kind {
            AgentKind::MathDerivation => Some(Self::MATH),
            AgentKind::Research => Some(Self::RESEARCH),
            AgentKind::Strategy => Some(Self::STRATEGY),
            AgentKind::SchemaAnalysis => Some(Self::SCHEMA),
            AgentKind::Documentation => Some(Self::NOTES),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiles_match_kinds() {
        for kind in AgentKind::ALL {
            if let Some(profile) = AgentPromptTemplate::profile(kind) {
                assert_eq!(profile.kind, kind);
                assert!((0.0..=1.0).contains(&profile.confidence));
            }
        }
        assert!(AgentPromptTemplate::profile(AgentKind::SystemSearch).is_none());
    }

    #[test]
    fn test_format_result_has_answer_section() {
        let text = AgentPromptTemplate::MATH.format_result("  E = mc^2 \n");
        assert!(text.starts_with("Answer: Mathematical Derivation from First Principles\n\nE = mc^2"));
        assert!(text.ends_with("Why: Derived the formula step-by-step from fundamental mathematical principles"));
    }

    #[test]
    fn test_user_prompt_with_context() {
        let prompt = AgentPromptTemplate::STRATEGY.user_prompt("ship it", Some("Iteration: 2"));
        assert_eq!(
            prompt,
            "Create a strategic plan to address: ship it\n\nContext:\nIteration: 2"
        );
    }
}
