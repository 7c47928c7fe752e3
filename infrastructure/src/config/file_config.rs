//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and mapped onto application types with
//! [`FileConfig::execution_params`] and [`FileAgentsConfig::settings`].

use crate::agents::AgentSettings;
use cedar_application::ExecutionParams;
use cedar_domain::{AgentKind, NextStepsPolicy};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Configuration validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigValidationError {
    #[error("{0} cannot be 0")]
    ZeroValue(&'static str),

    #[error("model name cannot be empty")]
    EmptyModelName,

    #[error("unknown agent in agents.disabled: '{0}'")]
    UnknownAgent(String),

    #[error("invalid orchestrator.next_steps: '{0}' (expected disabled, generic or contextual)")]
    InvalidNextSteps(String),
}

/// Raw orchestrator configuration from TOML
///
/// # Example
///
/// ```toml
/// [orchestrator]
/// max_iterations = 10
/// agent_timeout_secs = 180
/// reviewer_timeout_secs = 60
/// deadline_secs = 600
/// next_steps = "generic"     # "disabled", "generic", "contextual"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileOrchestratorConfig {
    pub max_iterations: usize,
    pub agent_timeout_secs: u64,
    pub reviewer_timeout_secs: u64,
    pub deadline_secs: u64,
    pub next_steps: String,
}

impl Default for FileOrchestratorConfig {
    fn default() -> Self {
        let params = ExecutionParams::default();
        Self {
            max_iterations: params.max_iterations,
            agent_timeout_secs: params.agent_timeout.as_secs(),
            reviewer_timeout_secs: params.reviewer_timeout.as_secs(),
            deadline_secs: params.deadline.as_secs(),
            next_steps: params.next_steps.to_string(),
        }
    }
}

/// Raw reasoning backend configuration from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileReviewerConfig {
    /// Model name sent to the chat completions endpoint
    pub model: String,
    /// Base URL of an OpenAI-compatible API
    pub base_url: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Direct API key (not recommended, use the env var instead)
    pub api_key: Option<String>,
    /// Token budget for reviewer replies
    pub max_tokens: u32,
}

impl Default for FileReviewerConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            api_key: None,
            max_tokens: 800,
        }
    }
}

impl FileReviewerConfig {
    /// API key from the config file or the configured environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .filter(|key| !key.trim().is_empty())
    }
}

/// Raw `[agents.shell]` configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileShellConfig {
    /// Working directory for commands (default: home directory)
    pub working_dir: Option<PathBuf>,
    pub timeout_secs: u64,
}

impl Default for FileShellConfig {
    fn default() -> Self {
        Self {
            working_dir: None,
            timeout_secs: 60,
        }
    }
}

/// Raw `[agents.code]` configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileCodeConfig {
    /// Program that runs generated code
    pub interpreter: String,
    pub timeout_secs: u64,
}

impl Default for FileCodeConfig {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Raw agent configuration from TOML
///
/// # Example
///
/// ```toml
/// [agents]
/// disabled = ["file_transfer"]
/// download_dir = "~/Downloads/cedar"
/// max_download_bytes = 26214400
///
/// [agents.shell]
/// working_dir = "~/Projects"
/// timeout_secs = 60
///
/// [agents.code]
/// interpreter = "python3"
/// timeout_secs = 30
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileAgentsConfig {
    /// Agent kinds not to register
    pub disabled: Vec<String>,
    pub shell: FileShellConfig,
    pub code: FileCodeConfig,
    /// Where downloads land (default: system temp dir)
    pub download_dir: Option<PathBuf>,
    pub max_download_bytes: u64,
    pub download_timeout_secs: u64,
}

impl Default for FileAgentsConfig {
    fn default() -> Self {
        Self {
            disabled: Vec::new(),
            shell: FileShellConfig::default(),
            code: FileCodeConfig::default(),
            download_dir: None,
            max_download_bytes: 25 * 1024 * 1024,
            download_timeout_secs: 30,
        }
    }
}

impl FileAgentsConfig {
    pub fn disabled_kinds(&self) -> Result<Vec<AgentKind>, ConfigValidationError> {
        self.disabled
            .iter()
            .map(|name| {
                name.parse::<AgentKind>()
                    .map_err(|_| ConfigValidationError::UnknownAgent(name.clone()))
            })
            .collect()
    }

    /// Runtime settings for the concrete agents.
    pub fn settings(&self) -> AgentSettings {
        let defaults = AgentSettings::default();
        AgentSettings {
            shell_working_dir: self
                .shell
                .working_dir
                .as_deref()
                .map(expand_home)
                .or(defaults.shell_working_dir),
            shell_timeout: Duration::from_secs(self.shell.timeout_secs),
            code_interpreter: self.code.interpreter.clone(),
            code_timeout: Duration::from_secs(self.code.timeout_secs),
            download_dir: self
                .download_dir
                .as_deref()
                .map(expand_home)
                .unwrap_or(defaults.download_dir),
            max_download_bytes: self.max_download_bytes,
            download_timeout: Duration::from_secs(self.download_timeout_secs),
        }
    }
}

/// Raw event delivery configuration from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileEventsConfig {
    pub ack_timeout_ms: u64,
}

impl Default for FileEventsConfig {
    fn default() -> Self {
        Self {
            ack_timeout_ms: ExecutionParams::default().ack_timeout.as_millis() as u64,
        }
    }
}

/// Raw note persistence configuration from TOML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileNotesConfig {
    /// Directory for markdown notes; notes are not saved when unset
    pub directory: Option<PathBuf>,
}

/// Raw logging configuration from TOML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    /// JSONL transcript path; no transcript when unset
    pub conversation_log: Option<PathBuf>,
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub orchestrator: FileOrchestratorConfig,
    pub reviewer: FileReviewerConfig,
    pub agents: FileAgentsConfig,
    pub events: FileEventsConfig,
    pub notes: FileNotesConfig,
    pub logging: FileLoggingConfig,
}

impl FileConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let orchestrator = &self.orchestrator;
        if orchestrator.max_iterations == 0 {
            return Err(ConfigValidationError::ZeroValue("orchestrator.max_iterations"));
        }
        if orchestrator.agent_timeout_secs == 0 {
            return Err(ConfigValidationError::ZeroValue("orchestrator.agent_timeout_secs"));
        }
        if orchestrator.reviewer_timeout_secs == 0 {
            return Err(ConfigValidationError::ZeroValue("orchestrator.reviewer_timeout_secs"));
        }
        if orchestrator.deadline_secs == 0 {
            return Err(ConfigValidationError::ZeroValue("orchestrator.deadline_secs"));
        }
        if self.agents.shell.timeout_secs == 0 {
            return Err(ConfigValidationError::ZeroValue("agents.shell.timeout_secs"));
        }
        if self.agents.code.timeout_secs == 0 {
            return Err(ConfigValidationError::ZeroValue("agents.code.timeout_secs"));
        }
        if self.agents.download_timeout_secs == 0 {
            return Err(ConfigValidationError::ZeroValue("agents.download_timeout_secs"));
        }
        if self.events.ack_timeout_ms == 0 {
            return Err(ConfigValidationError::ZeroValue("events.ack_timeout_ms"));
        }

        if self.reviewer.model.trim().is_empty() {
            return Err(ConfigValidationError::EmptyModelName);
        }

        orchestrator
            .next_steps
            .parse::<NextStepsPolicy>()
            .map_err(|_| ConfigValidationError::InvalidNextSteps(orchestrator.next_steps.clone()))?;
        self.agents.disabled_kinds()?;

        Ok(())
    }

    /// Loop control parameters; call after [`validate`](Self::validate).
    pub fn execution_params(&self) -> ExecutionParams {
        let orchestrator = &self.orchestrator;
        ExecutionParams::default()
            .with_max_iterations(orchestrator.max_iterations)
            .with_agent_timeout(Duration::from_secs(orchestrator.agent_timeout_secs))
            .with_reviewer_timeout(Duration::from_secs(orchestrator.reviewer_timeout_secs))
            .with_deadline(Duration::from_secs(orchestrator.deadline_secs))
            .with_ack_timeout(Duration::from_millis(self.events.ack_timeout_ms))
            .with_reviewer_max_tokens(self.reviewer.max_tokens)
            .with_next_steps(orchestrator.next_steps.parse().unwrap_or_default())
    }
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &std::path::Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    path.to_path_buf()
}
