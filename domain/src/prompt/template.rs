//! Prompt templates for the reviewer

use crate::agent::AgentResult;
use crate::core::string::preview;

/// Characters of each agent response shown to the reviewer
const RESPONSE_PREVIEW_CHARS: usize = 500;

/// Templates for the reviewer and the execution agents
pub struct PromptTemplate;

impl PromptTemplate {
    /// System prompt for the reviewer
    pub fn reviewer_system(iteration: usize, max_iterations: usize, remaining_loops: usize) -> String {
        format!(
            r#"You are the Chief Agent - an orchestrator who reviews the work of specialist agents and decides what happens next.

YOUR PRIMARY DIRECTIVE:
Assess the query complexity FIRST, then choose the MINIMAL strategy needed. Prefer answering now over looping.

CURRENT ITERATION STATUS:
- Iteration: {iteration} of {max_iterations}
- Remaining loops: {remaining_loops}

DECISIONS:
- "final": the results answer the question. Put the complete answer in final_answer.
- "loop": one more iteration is needed. Put the SPECIFIC next action in additional_guidance. If a shell command should run, also set action to {{"agent": "system_search", "command": "<command>"}}.
- "clarify": the request is ambiguous or misses a parameter. Ask one specific question in clarification_question.

You MUST respond with a single JSON object in this EXACT format:
{{
  "decision": "final" or "loop" or "clarify",
  "query_assessment": "Is this simple, moderate or complex, and why?",
  "thinking_process": "What this specific query requires and which agents' results matter",
  "final_answer": "The actual answer to the user's question (only if 'final')",
  "additional_guidance": "The specific next action (only if 'loop')",
  "action": {{"agent": "system_search", "command": "..."}} (optional, only if 'loop'),
  "clarification_question": "The specific question for the user (only if 'clarify')",
  "selected_agent": "Single agent name OR 'combined'",
  "reasoning": "Specific explanation of the decision"
}}"#,
            iteration = iteration + 1,
            max_iterations = max_iterations,
            remaining_loops = remaining_loops,
        )
    }

    /// User prompt for the reviewer
    pub fn reviewer_user(
        user_query: &str,
        iteration: usize,
        max_iterations: usize,
        remaining_loops: usize,
        previous_context: Option<&str>,
        results: &[AgentResult],
    ) -> String {
        let mut prompt = format!(
            "User Query: {}\n\nCurrent Iteration: {} of {}\nRemaining Loops: {}\n\n",
            user_query,
            iteration + 1,
            max_iterations,
            remaining_loops
        );

        if let Some(previous) = previous_context {
            prompt.push_str("Previous Context:\n");
            prompt.push_str(previous);
            prompt.push('\n');
        }

        prompt.push_str("Agent Responses from this iteration:\n");
        for result in results {
            let summary = if result.summary.is_empty() {
                "No summary provided"
            } else {
                result.summary.as_str()
            };
            prompt.push_str(&format!(
                "\nAgent: {}\nSummary: {}\nConfidence: {}\nMethod: {}\nResponse: {}\n",
                result.display_name,
                summary,
                result.confidence,
                result.method,
                preview(&result.result, RESPONSE_PREVIEW_CHARS)
            ));
        }

        prompt.push_str(
            "\nBe SPECIFIC about THIS query, not generic!\nOnly loop if you have a SPECIFIC thing you need to get.",
        );
        prompt
    }

    /// System prompt for SQL generation
    pub fn sql_system() -> &'static str {
        r#"You are a SQL expert. Generate SQL for database operations including:
- CREATE DATABASE statements for new databases
- CREATE TABLE statements with proper schemas and constraints
- INSERT, UPDATE, DELETE operations for data manipulation
- SELECT queries with JOINs, aggregations, and subqueries
- ALTER TABLE for schema modifications
- CREATE INDEX for performance optimization

Output ONLY the SQL statements, no explanations.
Use standard SQL syntax (SQLite/PostgreSQL compatible).
Include proper constraints (PRIMARY KEY, FOREIGN KEY, NOT NULL, UNIQUE)."#
    }

    /// System prompt for computations the local evaluator cannot handle
    pub fn computation_system() -> &'static str {
        r#"You are a Python code generator. Your response should have two parts:

1. SUMMARY: A brief 2-3 sentence description of what the code does and the key computations
2. CODE: The executable Python code (no markdown, just raw Python)

Requirements for the code:
- The code should print the final result
- Use proper error handling
- For mathematical expressions, parse them correctly (e.g., 'square root of 5*10' means sqrt(5*10))
- The code must be complete and runnable as-is

Format:
SUMMARY: [Your summary here]

[Your Python code here]"#
    }

    /// System prompt for describing a downloaded or local file
    pub fn file_description_system() -> &'static str {
        "Generate a brief description for this file based on its content."
    }
}
