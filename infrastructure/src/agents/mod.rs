//! Concrete agents
//!
//! One [`Agent`] implementation per [`AgentKind`]. Backend-driven agents take
//! an optional [`LlmGateway`]; without one they answer with a
//! configuration-error result instead of failing.

mod command;
mod computation;
mod database;
mod expression;
mod file_transfer;
mod shell;
mod specialist;

pub use command::{CommandError, CommandOutput, CommandRunner};
pub use computation::{ComputationAgent, GeneratedCode};
pub use database::DatabaseAgent;
pub use expression::{ExpressionError, evaluate, extract_expression, format_number};
pub use file_transfer::FileTransferAgent;
pub use shell::{CommandSource, ShellAgent, extract_command};
pub use specialist::SpecialistAgent;

use cedar_application::{Agent, AgentRegistry, LlmGateway};
use cedar_domain::{AgentKind, AgentPromptTemplate, AgentResult};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Runtime settings shared by the side-effecting agents
#[derive(Debug, Clone, PartialEq)]
pub struct AgentSettings {
    /// Where shell commands run; `None` keeps the process working directory
    pub shell_working_dir: Option<PathBuf>,
    pub shell_timeout: Duration,
    /// Program that runs backend-generated code
    pub code_interpreter: String,
    pub code_timeout: Duration,
    /// Parent of the per-invocation download directories
    pub download_dir: PathBuf,
    pub max_download_bytes: u64,
    pub download_timeout: Duration,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            shell_working_dir: dirs::home_dir(),
            shell_timeout: Duration::from_secs(60),
            code_interpreter: "python3".to_string(),
            code_timeout: Duration::from_secs(30),
            download_dir: std::env::temp_dir().join("cedar-downloads"),
            max_download_bytes: 25 * 1024 * 1024,
            download_timeout: Duration::from_secs(30),
        }
    }
}

/// Build a registry with every agent kind, minus `disabled`.
pub fn build_registry(
    gateway: Option<Arc<dyn LlmGateway>>,
    settings: &AgentSettings,
    disabled: &[AgentKind],
) -> AgentRegistry {
    let shell_runner = CommandRunner::new(settings.shell_timeout)
        .with_working_dir(settings.shell_working_dir.clone());
    let computation = ComputationAgent::new(gateway.clone())
        .with_runner(CommandRunner::new(settings.code_timeout))
        .with_interpreter(&settings.code_interpreter, script_name(&settings.code_interpreter));
    let file_transfer = FileTransferAgent::new(settings.download_dir.clone())
        .with_gateway(gateway.clone())
        .with_max_bytes(settings.max_download_bytes)
        .with_timeout(settings.download_timeout);

    let mut registry = AgentRegistry::new()
        .with(Arc::new(computation))
        .with(Arc::new(ShellAgent::new(gateway.clone()).with_runner(shell_runner)))
        .with(Arc::new(DatabaseAgent::new(gateway.clone())))
        .with(Arc::new(file_transfer));

    for profile in [
        AgentPromptTemplate::MATH,
        AgentPromptTemplate::RESEARCH,
        AgentPromptTemplate::STRATEGY,
        AgentPromptTemplate::SCHEMA,
        AgentPromptTemplate::NOTES,
    ] {
        let agent: Arc<dyn Agent> = Arc::new(SpecialistAgent::new(profile, gateway.clone()));
        registry.register(agent);
    }

    registry.without(disabled)
}

/// File name for generated code, by interpreter
fn script_name(interpreter: &str) -> &'static str {
    let program = std::path::Path::new(interpreter)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(interpreter);
    match program {
        p if p.starts_with("python") => "generated.py",
        "node" => "generated.js",
        "ruby" => "generated.rb",
        _ => "generated.sh",
    }
}

/// Low-confidence result for a backend call that failed inside an agent.
pub(crate) fn backend_failure(
    kind: AgentKind,
    operation: &str,
    error: impl std::fmt::Display,
) -> AgentResult {
    AgentResult::new(
        kind,
        format!("Answer: {} failed\n\nPotential issues: {}", operation, error),
        0.1,
        "Error",
    )
    .with_explanation(format!("{} failed", operation))
    .with_summary(format!("{} failed: {}", kind.display_name(), error))
}

/// Detail used in configuration-error results when no backend is configured.
pub(crate) const NO_BACKEND_DETAIL: &str = "No reasoning backend configured";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_has_every_kind() {
        let registry = build_registry(None, &AgentSettings::default(), &[]);
        assert_eq!(registry.len(), AgentKind::ALL.len());
        for kind in AgentKind::ALL {
            assert_eq!(registry.get(kind).map(|a| a.kind()), Some(kind));
        }
    }

    #[test]
    fn test_disabled_kinds_are_left_out() {
        let registry = build_registry(
            None,
            &AgentSettings::default(),
            &[AgentKind::SystemSearch, AgentKind::FileTransfer],
        );
        assert_eq!(registry.len(), AgentKind::ALL.len() - 2);
        assert!(!registry.contains(AgentKind::SystemSearch));
        assert!(registry.contains(AgentKind::Computation));
    }

    #[test]
    fn test_script_name_follows_interpreter() {
        assert_eq!(script_name("python3"), "generated.py");
        assert_eq!(script_name("/usr/bin/python3.12"), "generated.py");
        assert_eq!(script_name("sh"), "generated.sh");
    }

    #[test]
    fn test_agent_timeout_leaves_room_for_shell_report() {
        let settings = AgentSettings::default();
        let params = cedar_application::ExecutionParams::default();
        // The shell agent reports its own timeout, then may call the backend
        assert!(params.agent_timeout > settings.shell_timeout + Duration::from_secs(60));
        assert!(params.agent_timeout > settings.code_timeout + Duration::from_secs(60));
    }

    #[test]
    fn test_backend_failure_shape() {
        let result = backend_failure(AgentKind::Research, "Research", "HTTP 500");
        assert_eq!(result.confidence, 0.1);
        assert_eq!(result.method, "Error");
        assert!(result.result.starts_with("Answer: Research failed"));
        assert!(result.result.contains("Potential issues: HTTP 500"));
    }
}
