//! Classification value objects

use crate::agent::AgentKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How much work the classifier expects a message to need
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    #[default]
    Simple,
    Moderate,
    Complex,
}

impl Complexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Complexity::Simple => "simple",
            Complexity::Moderate => "moderate",
            Complexity::Complex => "complex",
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identified type of request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    SimpleCalculation,
    FileSearch,
    SqlQuery,
    DataProcessing,
    MathematicalDerivation,
    Research,
    Planning,
    Documentation,
    Computation,
    ShellCommand,
    FileDownload,
    GeneralQuery,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::SimpleCalculation => "simple_calculation",
            TaskType::FileSearch => "file_search",
            TaskType::SqlQuery => "sql_query",
            TaskType::DataProcessing => "data_processing",
            TaskType::MathematicalDerivation => "mathematical_derivation",
            TaskType::Research => "research",
            TaskType::Planning => "planning",
            TaskType::Documentation => "documentation",
            TaskType::Computation => "computation",
            TaskType::ShellCommand => "shell_command",
            TaskType::FileDownload => "file_download",
            TaskType::GeneralQuery => "general_query",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of classifying one message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub complexity: Complexity,
    pub identified_type: TaskType,
    /// Short analysis of the request
    pub analysis: String,
    /// Non-empty, ordered, duplicate-free
    pub agents_to_use: Vec<AgentKind>,
    /// Why these agents were selected
    pub rationale: String,
}

impl Classification {
    /// Bulleted list of what each selected agent will do
    pub fn assignments(&self) -> String {
        self.agents_to_use
            .iter()
            .map(|kind| format!("• **{}**: {}", kind.display_name(), kind.assignment()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Comma-separated display names
    pub fn agent_names(&self) -> String {
        self.agents_to_use
            .iter()
            .map(|kind| kind.display_name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
