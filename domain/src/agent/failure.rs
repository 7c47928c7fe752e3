//! Agent crash classification
//!
//! When an agent fails unexpectedly (an error escapes `process`, it panics, or
//! it exceeds its time budget), the dispatcher converts the failure into a
//! confidence-0 [`AgentResult`]. The remediation text is chosen from the error
//! type and message so the reviewer and the user can see what went wrong.

use super::kind::AgentKind;
use super::result::AgentResult;
use crate::core::string::truncate;
use serde::{Deserialize, Serialize};

/// Method label for synthesized crash results
pub const AGENT_EXCEPTION_METHOD: &str = "Agent Exception";

/// Broad category of an agent failure, used to pick remediation hints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    Credentials,
    Network,
    Timeout,
    Permission,
    MissingDependency,
    Panic,
    Unknown,
}

impl FailureClass {
    /// Classify by error type name first, then by message substrings.
    pub fn detect(error_type: &str, message: &str) -> Self {
        let error_type = error_type.to_lowercase();
        let message = message.to_lowercase();

        if error_type.contains("panic") {
            return FailureClass::Panic;
        }
        if error_type.contains("timeout") || message.contains("timeout") || message.contains("timed out")
        {
            return FailureClass::Timeout;
        }
        if message.contains("api_key") || message.contains("api key") || message.contains("credential")
        {
            return FailureClass::Credentials;
        }
        if message.contains("permission") || message.contains("access denied") {
            return FailureClass::Permission;
        }
        if error_type.contains("network")
            || message.contains("connection")
            || message.contains("network")
        {
            return FailureClass::Network;
        }
        if message.contains("module") || message.contains("import") || message.contains("not found")
        {
            return FailureClass::MissingDependency;
        }
        FailureClass::Unknown
    }

    /// Targeted remediation hints
    pub fn remediation(&self) -> &'static [&'static str] {
        match self {
            FailureClass::Credentials => &[
                "Ensure the API key environment variable is set",
                "Check the API key is valid and has proper permissions",
            ],
            FailureClass::Network => &[
                "Check network connectivity",
                "Verify firewall settings allow API access",
            ],
            FailureClass::Timeout => &[
                "The operation took too long to complete",
                "Try a simpler query or break it into smaller parts",
            ],
            FailureClass::Permission => &[
                "The agent was denied access to a file, directory, or command",
                "Check file permissions or choose a location the app can read",
            ],
            FailureClass::MissingDependency => &[
                "A required program or resource was not found",
                "Check that all dependencies are installed and on PATH",
            ],
            FailureClass::Panic => &[
                "The agent hit an internal bug and stopped",
                "Retry the request; report the issue if it repeats",
            ],
            FailureClass::Unknown => &[
                "Check the agent's configuration",
                "Review the error message for specific issues",
            ],
        }
    }
}

/// An unexpected failure raised by an agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentFailure {
    /// Error type name (e.g. "Timeout", "Io", "Panic")
    pub error_type: String,
    /// Error message
    pub message: String,
}

impl AgentFailure {
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            message: message.into(),
        }
    }

    pub fn class(&self) -> FailureClass {
        FailureClass::detect(&self.error_type, &self.message)
    }

    /// Convert into the synthetic result the dispatcher hands to the reviewer.
    pub fn into_result(self, kind: AgentKind, task: &str) -> AgentResult {
        let class = self.class();
        let details = format!(
            "Exception Type: {}\nError Message: {}\nAgent: {}\nTask: {}",
            self.error_type,
            self.message,
            kind.agent_name(),
            truncate(task, 200)
        );
        let mut fix = String::from("Review the error details and check:");
        for hint in class.remediation() {
            fix.push_str("\n- ");
            fix.push_str(hint);
        }

        AgentResult::new(
            kind,
            format!(
                "**Agent Failure Report:**\n\n{name} encountered an unexpected error and could \
                 not complete the task.\n\n**Error Details:**\n```\n{details}\n```\n\n\
                 **Suggested Fix:**\n{fix}\n\n**What the Chief Agent should know:**\nThis agent \
                 crashed during execution. The error has been logged and detailed information is \
                 provided above for troubleshooting.",
                name = kind.display_name(),
            ),
            0.0,
            AGENT_EXCEPTION_METHOD,
        )
        .with_explanation(format!("Agent crashed: {}", self.error_type))
        .with_summary(format!(
            "{} failed with {}: {}",
            kind.display_name(),
            self.error_type,
            truncate(&self.message, 100)
        ))
    }
}
