//! Computation agent ("Coding Agent")
//!
//! Plain arithmetic is evaluated locally. Anything else goes to the reasoning
//! backend for a short program, which then runs through a [`CommandRunner`]
//! in its own temp directory under the runner's timeout and output caps.

use super::command::{CommandError, CommandOutput, CommandRunner};
use super::expression::{evaluate, extract_expression, format_number};
use super::{NO_BACKEND_DETAIL, backend_failure};
use async_trait::async_trait;
use cedar_application::{Agent, AgentError, CompletionRequest, LlmGateway};
use cedar_domain::{AgentKind, AgentResult, ConversationContext, PromptTemplate, truncate};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const LOCAL_CONFIDENCE: f64 = 0.95;
const EXECUTED_CONFIDENCE: f64 = 0.95;
const SILENT_CONFIDENCE: f64 = 0.5;
const EXECUTION_ERROR_CONFIDENCE: f64 = 0.3;
const EVALUATION_ERROR_CONFIDENCE: f64 = 0.3;
const CLARIFICATION_CONFIDENCE: f64 = 0.2;

const BACKEND_MAX_TOKENS: u32 = 500;
const BACKEND_TEMPERATURE: f32 = 0.1;

const DEFAULT_INTERPRETER: &str = "python3";
const DEFAULT_SCRIPT_NAME: &str = "generated.py";
const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(30);

const CLARIFICATION_QUESTION: &str =
    "Could you please specify exactly what calculation or operation you'd like me to perform?";

/// Summary and program split out of a code-generation reply
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedCode {
    pub summary: String,
    pub code: String,
}

impl GeneratedCode {
    /// Split a `SUMMARY: ...` reply into its summary and code, dropping a
    /// surrounding code fence.
    pub fn parse(reply: &str, task: &str) -> Self {
        let reply = reply.trim();
        let mut summary = String::new();
        let mut code = reply.to_string();

        if let Some((_, rest)) = reply.split_once("SUMMARY:") {
            if let Some((head, body)) = rest.split_once("\n\n") {
                summary = head.trim().to_string();
                code = body.trim().to_string();
            } else {
                let lines: Vec<&str> = rest.lines().collect();
                if let Some(start) = (1..lines.len()).find(|&i| !lines[i].trim().is_empty()) {
                    summary = lines[0].trim().to_string();
                    code = lines[start..].join("\n").trim().to_string();
                }
            }
        }

        if code.starts_with("```") {
            code = code.split_once('\n').map(|(_, body)| body).unwrap_or("").to_string();
            if let Some(body) = code.trim_end().strip_suffix("```") {
                code = body.to_string();
            }
        }

        if summary.is_empty() {
            summary = format!("Generated and executed code to solve: {}", truncate(task, 100));
        }

        Self { summary, code }
    }

    fn preview(&self, language: &str) -> String {
        format!("**Code to execute:**\n```{}\n{}\n```\n\n", language, self.code.trim_end())
    }
}

pub struct ComputationAgent {
    gateway: Option<Arc<dyn LlmGateway>>,
    runner: CommandRunner,
    interpreter: String,
    script_name: String,
}

impl ComputationAgent {
    pub fn new(gateway: Option<Arc<dyn LlmGateway>>) -> Self {
        Self {
            gateway,
            runner: CommandRunner::new(DEFAULT_RUN_TIMEOUT),
            interpreter: DEFAULT_INTERPRETER.to_string(),
            script_name: DEFAULT_SCRIPT_NAME.to_string(),
        }
    }

    pub fn with_runner(mut self, runner: CommandRunner) -> Self {
        self.runner = runner;
        self
    }

    /// Program used to run generated code, and the file name it is saved as
    pub fn with_interpreter(
        mut self,
        interpreter: impl Into<String>,
        script_name: impl Into<String>,
    ) -> Self {
        self.interpreter = interpreter.into();
        self.script_name = script_name.into();
        self
    }

    fn is_ambiguous(task: &str) -> bool {
        let lower = task.to_lowercase();
        lower.contains("unclear") || lower.contains("ambiguous") || task.matches('?').count() > 2
    }

    fn clarification() -> AgentResult {
        AgentResult::new(
            AgentKind::Computation,
            "Results So Far: Unable to generate code due to unclear requirements\n\n\
             Next Steps: Clarify the specific calculation or operation needed",
            CLARIFICATION_CONFIDENCE,
            "Needs clarification",
        )
        .with_explanation("Query is ambiguous")
        .with_clarification(CLARIFICATION_QUESTION)
    }

    fn evaluate_locally(task: &str) -> Option<AgentResult> {
        let expression = extract_expression(task)?;
        let result = match evaluate(&expression) {
            Ok(value) => {
                let answer = format_number(value);
                AgentResult::new(
                    AgentKind::Computation,
                    format!(
                        "**Expression:** `{}`\n\nAnswer: {}\n\nWhy: Evaluated the arithmetic \
                         expression exactly",
                        expression, answer
                    ),
                    LOCAL_CONFIDENCE,
                    "Local arithmetic evaluation",
                )
                .with_explanation("Evaluated the expression locally")
                .with_summary(format!("Computed {} = {}", expression, answer))
            }
            Err(e) => AgentResult::new(
                AgentKind::Computation,
                format!(
                    "**Expression:** `{}`\n\nAnswer: Unable to complete the calculation due to \
                     an error\n\n**Execution Error:** {}\n\nWhy: The expression could not be \
                     evaluated\n\nSuggested Next Steps: Check the expression and try again",
                    expression, e
                ),
                EVALUATION_ERROR_CONFIDENCE,
                "Local arithmetic evaluation",
            )
            .with_explanation(format!("Evaluation failed: {}", e)),
        };
        Some(result)
    }

    async fn generate_and_run(
        &self,
        gateway: &dyn LlmGateway,
        task: &str,
        context: Option<&ConversationContext>,
    ) -> AgentResult {
        let user = match context {
            Some(context) => format!("{}\n\nContext:\n{}", task, context.render(task)),
            None => task.to_string(),
        };
        let request = CompletionRequest::new(PromptTemplate::computation_system(), user)
            .with_max_tokens(BACKEND_MAX_TOKENS)
            .with_temperature(BACKEND_TEMPERATURE);

        let reply = match gateway.complete(request).await {
            Ok(reply) => reply,
            Err(e) => return backend_failure(AgentKind::Computation, "Code generation", e),
        };
        let generated = GeneratedCode::parse(&reply, task);
        debug!(code = %generated.code, "Generated code");

        let outcome = self
            .runner
            .run_script(&self.interpreter, &self.script_name, &generated.code)
            .await;
        self.report(&generated, outcome)
    }

    fn report(
        &self,
        generated: &GeneratedCode,
        outcome: Result<CommandOutput, CommandError>,
    ) -> AgentResult {
        let preview = generated.preview(self.language());
        let failure = match outcome {
            Ok(output) if output.success() => {
                let stdout = output.stdout.trim();
                info!(duration_ms = output.duration.as_millis() as u64, "Generated code ran");
                let answer = if stdout.is_empty() {
                    "Code executed successfully"
                } else {
                    stdout
                };
                let mut text = format!(
                    "{}Answer: {}\n\nWhy: Generated and executed code to compute the exact result",
                    preview, answer
                );
                let stderr = output.stderr.trim();
                if !stderr.is_empty() {
                    text.push_str(&format!(
                        "\n\nPotential Issues: {}\n\nSuggested Next Steps: Review the error \
                         messages and adjust the query if needed",
                        stderr
                    ));
                }
                let confidence = if stdout.is_empty() {
                    SILENT_CONFIDENCE
                } else {
                    EXECUTED_CONFIDENCE
                };
                return AgentResult::new(
                    AgentKind::Computation,
                    text,
                    confidence,
                    "LLM-generated and executed code",
                )
                .with_explanation("Generated and executed code")
                .with_summary(generated.summary.clone());
            }
            Ok(output) => {
                let stderr = output.stderr.trim();
                if stderr.is_empty() {
                    format!("Exited with code {}", output.exit_code)
                } else {
                    stderr.to_string()
                }
            }
            Err(e) => e.to_string(),
        };

        warn!(error = %truncate(&failure, 200), "Generated code failed");
        AgentResult::new(
            AgentKind::Computation,
            format!(
                "{}Answer: Unable to complete the calculation due to an error\n\n\
                 **Execution Error:** {}\n\nWhy: The generated code encountered an execution \
                 error\n\nPotential Issues: The code failed during execution - see error \
                 above\n\nSuggested Next Steps: Review the code and error, then provide a more \
                 specific query",
                preview, failure
            ),
            EXECUTION_ERROR_CONFIDENCE,
            "LLM code generation with execution error",
        )
        .with_explanation("Code execution error")
        .with_summary(generated.summary.clone())
        .with_rerun(format!("Execution error: {}", truncate(&failure, 100)))
    }

    /// Fence label for the code preview
    fn language(&self) -> &str {
        match self.script_name.rsplit_once('.').map(|(_, ext)| ext) {
            Some("py") => "python",
            Some("sh") => "sh",
            Some(ext) => ext,
            None => "",
        }
    }
}

#[async_trait]
impl Agent for ComputationAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Computation
    }

    async fn process(
        &self,
        task: &str,
        context: Option<&ConversationContext>,
    ) -> Result<AgentResult, AgentError> {
        info!(task = %truncate(task, 100), "Computation agent started");

        if Self::is_ambiguous(task) {
            debug!("Computation request is ambiguous");
            return Ok(Self::clarification());
        }

        if let Some(result) = Self::evaluate_locally(task) {
            return Ok(result);
        }

        match &self.gateway {
            Some(gateway) => Ok(self.generate_and_run(gateway.as_ref(), task, context).await),
            None => Ok(AgentResult::configuration_error(
                AgentKind::Computation,
                task,
                NO_BACKEND_DETAIL,
            )),
        }
    }
}
