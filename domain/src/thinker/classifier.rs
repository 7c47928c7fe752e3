//! Keyword and pattern based classifier
//!
//! Rules are checked in a fixed order and the first match wins. Word-like
//! keywords are matched on word boundaries so that short command names such
//! as `rm` or `ls` do not fire inside ordinary words.

use super::classification::{Classification, Complexity, TaskType};
use crate::agent::AgentKind;
use crate::core::string::truncate;
use regex::Regex;
use std::sync::LazyLock;

/// Messages shorter than this may be treated as simple calculations
const SIMPLE_CALCULATION_MAX_LEN: usize = 50;

static ARITHMETIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\s\d.+\-*/%^()=?]+$").expect("valid regex")
});
static URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("valid regex"));
static FILE_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(/\S+\.[A-Za-z]{2,4}|[A-Za-z]:\\\S+|\./\S+)").expect("valid regex")
});
static BACKTICKED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`[^`]+`").expect("valid regex"));

const CALCULATION_PHRASES: &[&str] = &["what is", "calculate", "compute"];

const FILE_SEARCH_PHRASES: &[&str] = &[
    "find files",
    "find all files",
    "search for files",
    "files on my computer",
    "files on my machine",
    "on my machine",
    "on my computer",
    "files related to",
    "search my computer",
    "search my machine",
    "look for files",
    "locate files",
    "list files",
    "show files",
    "what files",
    "files containing",
    "containing the word",
    "grep",
];

const SQL_WORDS: &[&str] = &["sql", "select", "create table", "database"];
const DATA_WORDS: &[&str] = &[
    "data",
    "dataset",
    "csv",
    "excel",
    "json",
    "analyze",
    "statistics",
    "correlation",
];
const DATA_EXTENSIONS: &[&str] = &[".csv", ".json", ".xlsx"];
const DERIVATION_WORDS: &[&str] = &["derive", "proof", "theorem", "maxwell", "equation"];
const RESEARCH_WORDS: &[&str] = &[
    "research",
    "paper",
    "papers",
    "literature",
    "citation",
    "citations",
    "peer-review",
];
const PLANNING_WORDS: &[&str] = &["plan", "strategy", "roadmap", "approach"];
const NOTE_WORDS: &[&str] = &["note", "notes", "summarize", "document this"];
const COMPUTATION_WORDS: &[&str] = &["calculate", "compute", "model", "simulate", "algorithm"];
const SHELL_WORDS: &[&str] = &[
    "grep",
    "find",
    "ls",
    "cat",
    "brew install",
    "pip install",
    "npm install",
    "apt-get",
    "chmod",
    "mkdir",
    "rm",
    "cp",
    "mv",
];

/// True when `phrase` occurs in `text` delimited by non-word characters.
fn contains_word(text: &str, phrase: &str) -> bool {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    text.match_indices(phrase).any(|(start, _)| {
        let end = start + phrase.len();
        let before = text[..start].chars().next_back();
        let after = text[end..].chars().next();
        !before.is_some_and(is_word) && !after.is_some_and(is_word)
    })
}

fn any_word(text: &str, words: &[&str]) -> bool {
    words.iter().any(|w| contains_word(text, w))
}

fn any_phrase(text: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|p| text.contains(p))
}

/// Deterministic task classifier
///
/// Optionally restricted to the agent kinds that are actually registered; the
/// selection is then filtered and falls back to a registered kind so it is
/// never empty.
#[derive(Debug, Clone, Default)]
pub struct TaskClassifier {
    available: Option<Vec<AgentKind>>,
}

impl TaskClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict selections to `kinds`.
    pub fn with_available(mut self, kinds: impl IntoIterator<Item = AgentKind>) -> Self {
        self.available = Some(kinds.into_iter().collect());
        self
    }

    pub fn classify(&self, message: &str) -> Classification {
        let mut classification = classify_message(message);
        if let Some(available) = &self.available {
            restrict(&mut classification, available);
        }
        classification
    }
}

fn restrict(classification: &mut Classification, available: &[AgentKind]) {
    let before = classification.agents_to_use.len();
    classification
        .agents_to_use
        .retain(|kind| available.contains(kind));

    if classification.agents_to_use.is_empty() {
        let fallback = if available.contains(&AgentKind::Computation) || available.is_empty() {
            AgentKind::Computation
        } else {
            available[0]
        };
        classification.agents_to_use.push(fallback);
        classification.rationale.push_str(&format!(
            " (preferred agents unavailable, falling back to {})",
            fallback.display_name()
        ));
    } else if classification.agents_to_use.len() < before {
        classification
            .rationale
            .push_str(" (some preferred agents unavailable)");
    }
}

fn build(
    complexity: Complexity,
    identified_type: TaskType,
    analysis: String,
    agents: &[AgentKind],
    rationale: impl Into<String>,
) -> Classification {
    Classification {
        complexity,
        identified_type,
        analysis,
        agents_to_use: agents.to_vec(),
        rationale: rationale.into(),
    }
}

fn classify_message(message: &str) -> Classification {
    let text = message.to_lowercase();
    let trimmed = message.trim();

    if trimmed.len() < SIMPLE_CALCULATION_MAX_LEN
        && ((ARITHMETIC.is_match(trimmed) && trimmed.chars().any(|c| c.is_ascii_digit()))
            || any_phrase(&text, CALCULATION_PHRASES))
    {
        return build(
            Complexity::Simple,
            TaskType::SimpleCalculation,
            format!("Simple calculation: {}", trimmed),
            &[AgentKind::Computation],
            format!(
                "User asks '{}' - this is a simple calculation that only needs the Coding Agent",
                trimmed
            ),
        );
    }

    if any_phrase(&text, FILE_SEARCH_PHRASES)
        || (contains_word(&text, "find") && text.contains("file"))
    {
        return build(
            Complexity::Simple,
            TaskType::FileSearch,
            format!("User wants to find files related to: {}", truncate(trimmed, 100)),
            &[AgentKind::SystemSearch],
            "File search query - only the Shell Executor is needed with find/grep commands",
        );
    }

    if any_word(&text, SQL_WORDS) {
        return build(
            Complexity::Simple,
            TaskType::SqlQuery,
            "SQL operation requested".to_string(),
            &[AgentKind::Database],
            "SQL query - only the SQL Agent is needed",
        );
    }

    let has_data_path =
        FILE_PATH.is_match(message) && DATA_EXTENSIONS.iter().any(|ext| text.contains(ext));
    if any_word(&text, DATA_WORDS) || has_data_path {
        return build(
            Complexity::Moderate,
            TaskType::DataProcessing,
            "Data processing task".to_string(),
            &[AgentKind::Computation, AgentKind::SchemaAnalysis],
            "Data task - Coding Agent for analysis, Data Agent for schema and queries",
        );
    }

    if any_word(&text, DERIVATION_WORDS) {
        return build(
            Complexity::Complex,
            TaskType::MathematicalDerivation,
            "Complex derivation requested".to_string(),
            &[AgentKind::MathDerivation, AgentKind::Computation],
            "Mathematical derivation - Math Agent for theory, Coding Agent for verification",
        );
    }

    if any_word(&text, RESEARCH_WORDS) {
        return build(
            Complexity::Moderate,
            TaskType::Research,
            "Research synthesis requested".to_string(),
            &[AgentKind::Research],
            "Research question - only the Research Agent is needed",
        );
    }

    if any_word(&text, PLANNING_WORDS) {
        return build(
            Complexity::Moderate,
            TaskType::Planning,
            "Planning task".to_string(),
            &[AgentKind::Strategy],
            "Planning request - only the Strategy Agent is needed",
        );
    }

    if any_word(&text, NOTE_WORDS) {
        return build(
            Complexity::Simple,
            TaskType::Documentation,
            "Note taking requested".to_string(),
            &[AgentKind::Documentation],
            "Documentation request - only the Notes Agent is needed",
        );
    }

    if any_word(&text, COMPUTATION_WORDS) {
        return build(
            Complexity::Simple,
            TaskType::Computation,
            "Computational task".to_string(),
            &[AgentKind::Computation],
            "Computation - only the Coding Agent is needed",
        );
    }

    if BACKTICKED.is_match(message) || any_word(&text, SHELL_WORDS) {
        return build(
            Complexity::Simple,
            TaskType::ShellCommand,
            "Shell command execution".to_string(),
            &[AgentKind::SystemSearch],
            "Shell command - only the Shell Executor is needed",
        );
    }

    if URL.is_match(message) {
        return build(
            Complexity::Simple,
            TaskType::FileDownload,
            "File download from URL".to_string(),
            &[AgentKind::FileTransfer],
            "URL download - only the File Manager is needed",
        );
    }

    build(
        Complexity::Moderate,
        TaskType::GeneralQuery,
        format!("General query: {}", truncate(trimmed, 100)),
        &[AgentKind::Computation],
        "General query - starting with the Coding Agent, more can be added if needed",
    )
}
