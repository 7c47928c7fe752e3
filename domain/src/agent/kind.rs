//! Agent catalogue
//!
//! Every capability unit the orchestrator knows about is one variant of
//! [`AgentKind`]. The kind carries the stable machine name (used in logs,
//! events, and persisted notes) and the user-facing display name.

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Kind of agent (capability unit)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    /// Arithmetic and general computation
    #[serde(alias = "CodeAgent")]
    Computation,
    /// Shell commands and searching the local machine
    #[serde(alias = "ShellAgent")]
    SystemSearch,
    /// SQL generation
    #[serde(alias = "SQLAgent")]
    Database,
    /// Derivations from first principles
    #[serde(alias = "MathAgent")]
    MathDerivation,
    /// Literature and source synthesis
    #[serde(alias = "ResearchAgent")]
    Research,
    /// Action plans
    #[serde(alias = "StrategyAgent")]
    Strategy,
    /// Database schema analysis and query suggestions
    #[serde(alias = "DataAgent")]
    SchemaAnalysis,
    /// Structured notes of findings
    #[serde(alias = "NotesAgent")]
    Documentation,
    /// URL downloads and local file inspection
    #[serde(alias = "FileAgent")]
    FileTransfer,
}

impl AgentKind {
    /// All kinds, in a stable order
    pub const ALL: [AgentKind; 9] = [
        AgentKind::Computation,
        AgentKind::SystemSearch,
        AgentKind::Database,
        AgentKind::MathDerivation,
        AgentKind::Research,
        AgentKind::Strategy,
        AgentKind::SchemaAnalysis,
        AgentKind::Documentation,
        AgentKind::FileTransfer,
    ];

    /// Config / wire identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Computation => "computation",
            AgentKind::SystemSearch => "system_search",
            AgentKind::Database => "database",
            AgentKind::MathDerivation => "math_derivation",
            AgentKind::Research => "research",
            AgentKind::Strategy => "strategy",
            AgentKind::SchemaAnalysis => "schema_analysis",
            AgentKind::Documentation => "documentation",
            AgentKind::FileTransfer => "file_transfer",
        }
    }

    /// Stable agent name recorded in [`AgentResult::agent_name`](super::AgentResult)
    pub fn agent_name(&self) -> &'static str {
        match self {
            AgentKind::Computation => "CodeAgent",
            AgentKind::SystemSearch => "ShellAgent",
            AgentKind::Database => "SQLAgent",
            AgentKind::MathDerivation => "MathAgent",
            AgentKind::Research => "ResearchAgent",
            AgentKind::Strategy => "StrategyAgent",
            AgentKind::SchemaAnalysis => "DataAgent",
            AgentKind::Documentation => "NotesAgent",
            AgentKind::FileTransfer => "FileAgent",
        }
    }

    /// User-facing label
    pub fn display_name(&self) -> &'static str {
        match self {
            AgentKind::Computation => "Coding Agent",
            AgentKind::SystemSearch => "Shell Executor",
            AgentKind::Database => "SQL Agent",
            AgentKind::MathDerivation => "Math Agent",
            AgentKind::Research => "Research Agent",
            AgentKind::Strategy => "Strategy Agent",
            AgentKind::SchemaAnalysis => "Data Agent",
            AgentKind::Documentation => "Notes Agent",
            AgentKind::FileTransfer => "File Manager",
        }
    }

    /// One-line description of what the agent will do, used in the
    /// processing announcement.
    pub fn assignment(&self) -> &'static str {
        match self {
            AgentKind::Computation => "Will compute the exact result",
            AgentKind::SystemSearch => {
                "Will run system commands to complete the requested operation"
            }
            AgentKind::Database => {
                "Will create database queries or schema modifications as needed"
            }
            AgentKind::MathDerivation => {
                "Will derive formulas from first principles and show mathematical proofs"
            }
            AgentKind::Research => "Will search for relevant sources and compile information",
            AgentKind::Strategy => "Will create a detailed action plan for solving this problem",
            AgentKind::SchemaAnalysis => {
                "Will analyze database schemas and suggest appropriate queries"
            }
            AgentKind::Documentation => "Will document findings and create organized notes",
            AgentKind::FileTransfer => "Will download files or analyze file paths as requested",
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AgentKind {
    type Err = DomainError;

    /// Accepts the wire identifier, the agent name, or the display name
    /// (case-insensitive).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        AgentKind::ALL
            .into_iter()
            .find(|kind| {
                kind.as_str().eq_ignore_ascii_case(needle)
                    || kind.agent_name().eq_ignore_ascii_case(needle)
                    || kind.display_name().eq_ignore_ascii_case(needle)
            })
            .ok_or_else(|| DomainError::UnknownAgentKind(needle.to_string()))
    }
}
