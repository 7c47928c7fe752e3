//! Shell executor agent
//!
//! Finds a command in the task text, runs it through [`CommandRunner`] and
//! reports the outcome. When the reviewer asked for a specific command the
//! orchestrator passes it in backticks, which take precedence over every
//! other extraction rule.

use super::command::{CommandError, CommandOutput, CommandRunner};
use async_trait::async_trait;
use cedar_application::{Agent, AgentError, CompletionRequest, LlmGateway};
use cedar_domain::{AgentKind, AgentResult, ConversationContext, prefix, truncate};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Commands recognized at the start of a task or line
const KNOWN_COMMANDS: [&str; 22] = [
    "ls", "cd", "pwd", "grep", "find", "cat", "echo", "pip", "npm", "brew", "apt-get", "chmod",
    "mkdir", "rm", "cp", "mv", "curl", "wget", "git", "docker", "python", "node",
];

const OUTPUT_PREVIEW_CHARS: usize = 1000;
const ERROR_PREVIEW_CHARS: usize = 500;
const MAX_FOLLOW_UPS: usize = 3;
const SEARCH_RESULT_LIMIT: usize = 50;

const ANALYSIS_MAX_TOKENS: u32 = 800;
const ANALYSIS_TEMPERATURE: f32 = 0.2;

const ANALYSIS_SYSTEM: &str = r#"You analyze the output of shell commands for a user.
Explain what the output means, point out anything notable or wrong, and keep it short.
Start your reply with a line "SUMMARY:" followed by a one or two sentence summary."#;

static BACKTICK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`]+)`").expect("valid regex"));

static PREFIXED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:Execute|Run|Command):\s*(.+?)(?:\n|$)").expect("valid regex")
});

static QUOTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(?:run|execute|shell)\s+["']([^"']+)["']"#).expect("valid regex")
});

static FILES_CONTAINING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)\bfiles?\s+(?:that\s+contain|containing|mentioning|with\s+the\s+text)\s+["']?([\w.\-]+)["']?"#,
    )
    .expect("valid regex")
});

static FILES_NAMED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bfiles?\s+(?:named|called)\s+["']?([\w.*\-]+)["']?"#).expect("valid regex")
});

static SEARCH_ROOT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:in|under|inside)\s+(~?/[\w./\-]*|\./[\w./\-]*|\.)(?:\s|$)")
        .expect("valid regex")
});

/// How the command was obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandSource {
    Explicit,
    FileSearch,
    Inferred,
}

/// Find the shell command a task asks for.
///
/// Precedence: backticks, an `Execute:`/`Run:`/`Command:` prefix, a quoted
/// string after run/execute/shell, file-search phrasing, a task that starts
/// with a known command, then the first command-like line.
pub fn extract_command(task: &str) -> Option<(String, CommandSource)> {
    if let Some(caps) = BACKTICK.captures(task) {
        return non_empty(&caps[1]).map(|c| (c, CommandSource::Explicit));
    }
    if let Some(caps) = PREFIXED.captures(task)
        && let Some(command) = non_empty(&caps[1])
    {
        return Some((command, CommandSource::Explicit));
    }
    if let Some(caps) = QUOTED.captures(task) {
        return non_empty(&caps[1]).map(|c| (c, CommandSource::Explicit));
    }
    if let Some(command) = file_search_command(task) {
        return Some((command, CommandSource::FileSearch));
    }

    let first_line = task.trim().lines().next().unwrap_or_default().trim();
    if starts_with_known_command(first_line) {
        return Some((first_line.to_string(), CommandSource::Inferred));
    }

    task.lines()
        .map(str::trim)
        .find(|line| looks_like_command(line))
        .map(|line| (line.to_string(), CommandSource::Inferred))
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn first_word(line: &str) -> &str {
    line.split_whitespace().next().unwrap_or_default()
}

fn starts_with_known_command(line: &str) -> bool {
    KNOWN_COMMANDS.contains(&first_word(line))
}

fn looks_like_command(line: &str) -> bool {
    if line.is_empty() || line.ends_with('?') {
        return false;
    }
    starts_with_known_command(line)
        || ((line.contains(" | ") || line.contains(" > ") || line.contains(" && "))
            && !first_word(line).chars().any(|c| c.is_uppercase()))
}

/// Translate "find files containing X" / "files named X" into a bounded
/// search program.
fn file_search_command(task: &str) -> Option<String> {
    let root = SEARCH_ROOT
        .captures(task)
        .map(|caps| caps[1].to_string())
        .unwrap_or_else(|| ".".to_string());
    let root = shell_quote(&root).replacen("'~/", "~/'", 1);

    if let Some(caps) = FILES_CONTAINING.captures(task) {
        let term = shell_quote(&caps[1]);
        let program = if which::which("rg").is_ok() {
            format!("rg -l --max-count 1 -- {} {}", term, root)
        } else {
            format!("grep -rIl -- {} {}", term, root)
        };
        return Some(format!(
            "{} 2>/dev/null | head -n {}",
            program, SEARCH_RESULT_LIMIT
        ));
    }

    if let Some(caps) = FILES_NAMED.captures(task) {
        let name = &caps[1];
        let pattern = if name.contains('*') {
            name.to_string()
        } else {
            format!("*{}*", name)
        };
        return Some(format!(
            "find {} -name {} -not -path '*/.*' 2>/dev/null | head -n {}",
            root,
            shell_quote(&pattern),
            SEARCH_RESULT_LIMIT
        ));
    }

    None
}

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

pub struct ShellAgent {
    runner: CommandRunner,
    gateway: Option<Arc<dyn LlmGateway>>,
}

impl ShellAgent {
    pub fn new(gateway: Option<Arc<dyn LlmGateway>>) -> Self {
        Self {
            runner: CommandRunner::new(Duration::from_secs(60)),
            gateway,
        }
    }

    // ==================== Builder Methods ====================

    pub fn with_runner(mut self, runner: CommandRunner) -> Self {
        self.runner = runner;
        self
    }

    fn no_command() -> AgentResult {
        AgentResult::new(
            AgentKind::SystemSearch,
            "Answer: No executable shell command found in your request\n\n\
             Why: The request did not contain a recognizable command\n\n\
             Suggested Next Steps: Put the command in backticks, e.g. `ls -la`, or start \
             the request with \"Run:\"",
            0.1,
            "No command found",
        )
        .with_explanation("No shell command identified in the request")
    }

    fn timed_out(command: &str, timeout: Duration) -> AgentResult {
        AgentResult::new(
            AgentKind::SystemSearch,
            format!(
                "Answer: Command timed out after {} seconds\n\n**Executed Command:**\n\
                 ```bash\n{}\n```\n\nWhy: The command did not finish within its time budget\n\n\
                 Suggested Next Steps: Narrow the command (limit the directory or output) and retry",
                timeout.as_secs(),
                command
            ),
            0.3,
            "Timeout",
        )
        .with_explanation(format!("Timed out: {}", truncate(command, 50)))
    }

    fn execution_error(command: &str, error: &CommandError) -> AgentResult {
        AgentResult::new(
            AgentKind::SystemSearch,
            format!(
                "Answer: Failed to execute command\n\n**Executed Command:**\n```bash\n{}\n```\n\n\
                 **Error:** {}\n\nWhy: The command could not be started or monitored",
                command, error
            ),
            0.2,
            "Execution error",
        )
        .with_explanation(format!("Execution error: {}", error))
    }

    async fn analyze(
        &self,
        command: &str,
        output: &CommandOutput,
        context: Option<&ConversationContext>,
    ) -> String {
        let basic = basic_analysis(output);
        let Some(gateway) = &self.gateway else {
            return basic;
        };

        let mut user = format!(
            "Command: {}\nExit code: {}\n\nStdout:\n{}\n\nStderr:\n{}",
            command,
            output.exit_code,
            prefix(&output.stdout, 3000),
            prefix(&output.stderr, 1000)
        );
        if let Some(context) = context {
            user.push_str(&format!("\n\nContext:\n{}", context.render(command)));
        }
        let request = CompletionRequest::new(ANALYSIS_SYSTEM, user)
            .with_max_tokens(ANALYSIS_MAX_TOKENS)
            .with_temperature(ANALYSIS_TEMPERATURE);

        match gateway.complete(request).await {
            Ok(reply) => extract_summary(&reply).unwrap_or(basic),
            Err(e) => {
                warn!(error = %e, "Shell output analysis failed, using basic analysis");
                basic
            }
        }
    }

    fn report(
        command: &str,
        output: &CommandOutput,
        analysis: &str,
        runner: &CommandRunner,
    ) -> String {
        let headline = if output.success() {
            "Command executed successfully".to_string()
        } else {
            format!("Command failed with exit code {}", output.exit_code)
        };

        let mut text = format!(
            "Answer: {}\n\n**Executed Command:**\n```bash\n{}\n```\n\n**Analysis:**\n{}\n\n\
             **Execution Details:**\n- Exit code: {}\n- Duration: {:.2}s\n- Working directory: {}\n",
            headline,
            command,
            analysis,
            output.exit_code,
            output.duration.as_secs_f64(),
            runner
                .working_dir()
                .map(|d| d.display().to_string())
                .unwrap_or_else(|| "(current)".to_string()),
        );
        if output.stdout_truncated {
            text.push_str("- Output truncated\n");
        }

        if !output.stdout.trim().is_empty() {
            text.push_str(&format!(
                "\n**Output Preview:**\n```\n{}\n```\n",
                prefix(output.stdout.trim_end(), OUTPUT_PREVIEW_CHARS)
            ));
        }
        if !output.stderr.trim().is_empty() {
            text.push_str(&format!(
                "\n**Error Output:**\n```\n{}\n```\n",
                prefix(output.stderr.trim_end(), ERROR_PREVIEW_CHARS)
            ));
        }

        let follow_ups = follow_up_commands(command, output);
        if !follow_ups.is_empty() {
            text.push_str("\n**Follow-up Commands:**\n");
            for follow_up in follow_ups {
                text.push_str(&format!("- `{}`\n", follow_up));
            }
        }

        text.push_str("\nWhy: Direct shell command execution with full system access\n\n");
        text.push_str("Suggested Next Steps: ");
        text.push_str(if output.success() {
            "Review the output above and refine the command if more detail is needed"
        } else {
            "Check the error output above and adjust the command"
        });
        text
    }
}

/// Summary without a reasoning backend
fn basic_analysis(output: &CommandOutput) -> String {
    let mut parts = Vec::new();
    if output.success() {
        parts.push("The command completed successfully.".to_string());
    } else {
        parts.push(format!(
            "The command failed with exit code {}.",
            output.exit_code
        ));
    }

    let lines = output.stdout.lines().filter(|l| !l.trim().is_empty()).count();
    if lines > 0 {
        parts.push(format!("Generated {} lines of output.", lines));
    }

    let stderr = output.stderr.to_lowercase();
    if stderr.contains("command not found") {
        parts.push("The command is not installed or not on PATH.".to_string());
    } else if stderr.contains("permission denied") {
        parts.push("Permission was denied; elevated privileges may be required.".to_string());
    } else if stderr.contains("no such file or directory") {
        parts.push("A file or directory in the command does not exist.".to_string());
    }

    parts.join(" ")
}

/// Text after `SUMMARY:` up to the next blank line, or the whole reply.
fn extract_summary(reply: &str) -> Option<String> {
    let reply = reply.trim();
    if reply.is_empty() {
        return None;
    }
    let summary = match reply.split_once("SUMMARY:") {
        Some((_, rest)) => rest.split("\n\n").next().unwrap_or_default().trim(),
        None => reply,
    };
    (!summary.is_empty()).then(|| summary.to_string())
}

fn follow_up_commands(command: &str, output: &CommandOutput) -> Vec<String> {
    let mut follow_ups = Vec::new();
    let program = first_word(command);

    if !output.success() {
        if output.stderr.to_lowercase().contains("command not found") {
            follow_ups.push(format!("which {}", program));
        }
        if output.stderr.to_lowercase().contains("permission denied") {
            follow_ups.push("ls -la".to_string());
        }
    }

    match program {
        "ls" => follow_ups.push("ls -la".to_string()),
        "git" => {
            follow_ups.push("git status".to_string());
            follow_ups.push("git log --oneline -5".to_string());
        }
        "grep" | "rg" | "find" => follow_ups.push(format!("{} | wc -l", command)),
        "docker" => follow_ups.push("docker ps".to_string()),
        "pip" => follow_ups.push("pip list".to_string()),
        "npm" => follow_ups.push("npm ls --depth=0".to_string()),
        _ => {}
    }

    follow_ups.retain(|c| c != command);
    follow_ups.dedup();
    follow_ups.truncate(MAX_FOLLOW_UPS);
    follow_ups
}

#[async_trait]
impl Agent for ShellAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::SystemSearch
    }

    async fn process(
        &self,
        task: &str,
        context: Option<&ConversationContext>,
    ) -> Result<AgentResult, AgentError> {
        let Some((command, source)) = extract_command(task) else {
            debug!("No shell command found in task");
            return Ok(Self::no_command());
        };
        info!(command = %truncate(&command, 100), ?source, "Executing shell command");

        let output = match self.runner.run(&command).await {
            Ok(output) => output,
            Err(CommandError::TimedOut(timeout)) => return Ok(Self::timed_out(&command, timeout)),
            Err(e) => {
                warn!(error = %e, "Shell command failed to execute");
                return Ok(Self::execution_error(&command, &e));
            }
        };

        let analysis = self.analyze(&command, &output, context).await;
        let confidence = if output.success() { 0.9 } else { 0.6 };
        let summary = if output.success() {
            format!("Ran `{}` successfully", truncate(&command, 50))
        } else {
            format!("`{}` exited with {}", truncate(&command, 50), output.exit_code)
        };

        Ok(AgentResult::new(
            AgentKind::SystemSearch,
            Self::report(&command, &output, &analysis, &self.runner),
            confidence,
            format!("Shell execution (exit code: {})", output.exit_code),
        )
        .with_explanation(format!("Executed: {}", truncate(&command, 50)))
        .with_summary(summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cedar_application::GatewayError;

    #[test]
    fn test_backticks_win() {
        let (command, source) =
            extract_command("Execute: `df -h`\n\nOriginal request: show disk usage").unwrap();
        assert_eq!(command, "df -h");
        assert_eq!(source, CommandSource::Explicit);
    }

    #[test]
    fn test_prefix_and_quoted_forms() {
        assert_eq!(
            extract_command("Run: ls -la /tmp\nthanks").unwrap().0,
            "ls -la /tmp"
        );
        assert_eq!(
            extract_command("please execute 'uname -a' for me").unwrap().0,
            "uname -a"
        );
    }

    #[test]
    fn test_known_command_at_start() {
        assert_eq!(extract_command("git status").unwrap().0, "git status");
        assert_eq!(
            extract_command("I need this:\nls ~/Documents").unwrap().0,
            "ls ~/Documents"
        );
    }

    #[test]
    fn test_pipeline_line() {
        assert_eq!(
            extract_command("count lines\nwc -l notes.txt | sort").unwrap().0,
            "wc -l notes.txt | sort"
        );
    }

    #[test]
    fn test_file_search_translation() {
        let (command, source) =
            extract_command("find files containing foo on my machine").unwrap();
        assert_eq!(source, CommandSource::FileSearch);
        assert!(command.contains("'foo'"));
        assert!(command.starts_with("rg -l") || command.starts_with("grep -rIl"));
        assert!(command.ends_with("| head -n 50"));

        let (command, _) =
            extract_command("look for files named report.pdf in ~/Documents").unwrap();
        assert!(command.starts_with("find ~/'Documents'"));
        assert!(command.contains("-name '*report.pdf*'"));
    }

    #[test]
    fn test_no_command() {
        assert!(extract_command("tell me something nice").is_none());
        assert!(extract_command("Which directory should I use?").is_none());
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    fn output(exit_code: i32, stdout: &str, stderr: &str) -> CommandOutput {
        CommandOutput {
            exit_code,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            duration: Duration::from_millis(10),
            stdout_truncated: false,
            stderr_truncated: false,
        }
    }

    #[test]
    fn test_basic_analysis_hints() {
        let ok = basic_analysis(&output(0, "a\nb\n", ""));
        assert_eq!(ok, "The command completed successfully. Generated 2 lines of output.");

        let missing = basic_analysis(&output(127, "", "sh: 1: frob: command not found"));
        assert!(missing.contains("exit code 127"));
        assert!(missing.contains("not installed"));
    }

    #[test]
    fn test_extract_summary() {
        assert_eq!(
            extract_summary("SUMMARY: Disk is 40% full.\n\nDetails...").as_deref(),
            Some("Disk is 40% full.")
        );
        assert_eq!(extract_summary("plain text").as_deref(), Some("plain text"));
        assert!(extract_summary("  ").is_none());
    }

    #[test]
    fn test_follow_ups_are_capped() {
        let follow_ups = follow_up_commands("git pull", &output(0, "", ""));
        assert_eq!(follow_ups, vec!["git status", "git log --oneline -5"]);
        assert!(follow_up_commands("frob", &output(127, "", "command not found")).len() <= 3);
    }

    #[tokio::test]
    async fn test_process_runs_command() {
        let temp_dir = tempfile::tempdir().unwrap();
        let agent = ShellAgent::new(None).with_runner(
            CommandRunner::new(Duration::from_secs(5))
                .with_working_dir(Some(temp_dir.path().to_path_buf())),
        );
        let result = agent.process("Run: echo cedar", None).await.unwrap();

        assert_eq!(result.confidence, 0.9);
        assert_eq!(result.method, "Shell execution (exit code: 0)");
        assert_eq!(result.explanation, "Executed: echo cedar");
        assert!(result.result.starts_with("Answer: Command executed successfully"));
        assert!(result.result.contains("**Output Preview:**\n```\ncedar\n```"));
        assert!(result.result.contains("Why: Direct shell command execution"));
    }

    #[tokio::test]
    async fn test_process_reports_failure() {
        let agent = ShellAgent::new(None)
            .with_runner(CommandRunner::new(Duration::from_secs(5)));
        let result = agent.process("`exit 4`", None).await.unwrap();
        assert_eq!(result.confidence, 0.6);
        assert!(result.result.starts_with("Answer: Command failed with exit code 4"));
    }

    #[tokio::test]
    async fn test_process_timeout() {
        let agent = ShellAgent::new(None)
            .with_runner(CommandRunner::new(Duration::from_millis(200)));
        let result = agent.process("`sleep 5`", None).await.unwrap();
        assert_eq!(result.confidence, 0.3);
        assert_eq!(result.method, "Timeout");
    }

    #[tokio::test]
    async fn test_process_without_command() {
        let agent = ShellAgent::new(None);
        let result = agent.process("hello there", None).await.unwrap();
        assert_eq!(result.confidence, 0.1);
        assert_eq!(result.method, "No command found");
    }

    struct Summarizer;

    #[async_trait]
    impl LlmGateway for Summarizer {
        fn model(&self) -> &str {
            "summarizer"
        }

        async fn complete(&self, request: CompletionRequest) -> Result<String, GatewayError> {
            assert!(request.user.contains("Command: echo hi"));
            Ok("SUMMARY: Printed a greeting.\n\nNothing else to note.".to_string())
        }
    }

    #[tokio::test]
    async fn test_backend_analysis_is_used() {
        let agent = ShellAgent::new(Some(Arc::new(Summarizer)))
            .with_runner(CommandRunner::new(Duration::from_secs(5)));
        let result = agent.process("`echo hi`", None).await.unwrap();
        assert!(result.result.contains("**Analysis:**\nPrinted a greeting."));
    }
}
