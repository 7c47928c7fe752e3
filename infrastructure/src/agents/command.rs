//! Shell process runner
//!
//! Runs one command through `sh -c` (or one script through an interpreter) on
//! a blocking worker with a hard timeout and bounded captured output. Every
//! invocation gets its own temporary directory, exported as `TMPDIR` and
//! removed afterwards. On unix the command leads its own process group, and
//! the whole group is killed once the run is over.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// Maximum characters of stdout kept
pub const MAX_STDOUT_CHARS: usize = 5000;

/// Maximum characters of stderr kept
pub const MAX_STDERR_CHARS: usize = 2000;

/// Bytes buffered per character kept; anything past this is read and dropped
const BYTES_PER_CHAR: usize = 4;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long pipe readers get to finish once the process group is killed
const KILL_GRACE: Duration = Duration::from_millis(500);

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Failed to spawn command: {0}")]
    Spawn(std::io::Error),

    #[error("Failed to create temporary directory: {0}")]
    TempDir(std::io::Error),

    #[error("Failed to write script: {0}")]
    Script(std::io::Error),

    #[error("Working directory does not exist: {0}")]
    MissingWorkingDir(PathBuf),

    #[error("Command timed out after {} seconds", .0.as_secs())]
    TimedOut(Duration),

    #[error("Failed to wait for process: {0}")]
    Wait(std::io::Error),

    #[error("Worker thread failed: {0}")]
    Worker(String),
}

/// Captured result of a finished command
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutput {
    /// Exit code, `-1` when killed by a signal
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
    pub stdout_truncated: bool,
    pub stderr_truncated: bool,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs shell commands with a timeout, an optional working directory and a
/// private temp directory
#[derive(Debug, Clone)]
pub struct CommandRunner {
    timeout: Duration,
    working_dir: Option<PathBuf>,
}

impl CommandRunner {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            working_dir: None,
        }
    }

    pub fn with_working_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.working_dir = dir;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    /// Run `command` off the async workers.
    pub async fn run(&self, command: &str) -> Result<CommandOutput, CommandError> {
        let runner = self.clone();
        let command = command.to_string();
        tokio::task::spawn_blocking(move || runner.run_blocking(&command))
            .await
            .map_err(|e| CommandError::Worker(e.to_string()))?
    }

    /// Run `command` on the current thread.
    pub fn run_blocking(&self, command: &str) -> Result<CommandOutput, CommandError> {
        self.execute(|_| {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(command);
            Ok(cmd)
        })
    }

    /// Write `source` into the run's temp directory as `file_name` and run it
    /// with `interpreter`, off the async workers. Without a configured working
    /// directory the script runs inside its temp directory.
    pub async fn run_script(
        &self,
        interpreter: &str,
        file_name: &str,
        source: &str,
    ) -> Result<CommandOutput, CommandError> {
        let runner = self.clone();
        let (interpreter, file_name, source) =
            (interpreter.to_string(), file_name.to_string(), source.to_string());
        tokio::task::spawn_blocking(move || {
            runner.run_script_blocking(&interpreter, &file_name, &source)
        })
        .await
        .map_err(|e| CommandError::Worker(e.to_string()))?
    }

    /// Blocking form of [`run_script`](Self::run_script).
    pub fn run_script_blocking(
        &self,
        interpreter: &str,
        file_name: &str,
        source: &str,
    ) -> Result<CommandOutput, CommandError> {
        self.execute(|temp_dir| {
            let script = temp_dir.join(file_name);
            std::fs::write(&script, source).map_err(CommandError::Script)?;
            let mut cmd = Command::new(interpreter);
            cmd.arg(script).current_dir(temp_dir);
            Ok(cmd)
        })
    }

    fn execute(
        &self,
        build: impl FnOnce(&Path) -> Result<Command, CommandError>,
    ) -> Result<CommandOutput, CommandError> {
        let start = Instant::now();

        if let Some(dir) = &self.working_dir
            && !dir.is_dir()
        {
            return Err(CommandError::MissingWorkingDir(dir.clone()));
        }

        let temp_dir = tempfile::Builder::new()
            .prefix("cedar-shell-")
            .tempdir()
            .map_err(CommandError::TempDir)?;

        let mut cmd = build(temp_dir.path())?;
        cmd.env("TMPDIR", temp_dir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        // Make the child receive SIGTERM if this process dies first
        #[cfg(target_os = "linux")]
        {
            use std::os::unix::process::CommandExt;
            unsafe {
                cmd.pre_exec(|| {
                    libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM);
                    Ok(())
                });
            }
        }

        debug!(command = ?cmd, temp_dir = %temp_dir.path().display(), "Spawning command");
        let child = cmd.spawn().map_err(CommandError::Spawn)?;
        let captured = wait_with_timeout(child, self.timeout)?;

        let stdout = String::from_utf8_lossy(&captured.stdout.bytes);
        let stderr = String::from_utf8_lossy(&captured.stderr.bytes);
        let (stdout, stdout_cut) = cap_chars(&stdout, MAX_STDOUT_CHARS);
        let (stderr, stderr_cut) = cap_chars(&stderr, MAX_STDERR_CHARS);

        Ok(CommandOutput {
            exit_code: captured.status.code().unwrap_or(-1),
            stdout,
            stderr,
            duration: start.elapsed(),
            stdout_truncated: stdout_cut || captured.stdout.overflowed,
            stderr_truncated: stderr_cut || captured.stderr.overflowed,
        })
    }
}

/// Bytes read from one pipe
#[derive(Debug, Default)]
struct Drained {
    bytes: Vec<u8>,
    /// More output arrived than was kept
    overflowed: bool,
}

struct Captured {
    status: ExitStatus,
    stdout: Drained,
    stderr: Drained,
}

/// Wait for a child process, killing its process group once `timeout` has
/// elapsed.
///
/// Pipes are drained on their own threads so a chatty child cannot block on
/// a full pipe while we wait for it. Background jobs that keep a pipe open
/// after the main process exits are killed at the same deadline.
fn wait_with_timeout(mut child: Child, timeout: Duration) -> Result<Captured, CommandError> {
    let stdout = drain(child.stdout.take(), MAX_STDOUT_CHARS * BYTES_PER_CHAR);
    let stderr = drain(child.stderr.take(), MAX_STDERR_CHARS * BYTES_PER_CHAR);
    let deadline = Instant::now() + timeout;

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if Instant::now() >= deadline {
                    warn!(timeout_secs = timeout.as_secs(), "Command timed out, killing");
                    kill_group(&mut child);
                    let _ = child.wait();
                    return Err(CommandError::TimedOut(timeout));
                }
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                kill_group(&mut child);
                let _ = child.wait();
                return Err(CommandError::Wait(e));
            }
        }
    };

    let mut out = receive(&stdout, deadline);
    let mut err = receive(&stderr, deadline);
    if out.is_none() || err.is_none() {
        warn!(
            timeout_secs = timeout.as_secs(),
            "Background processes still hold the output pipes, killing"
        );
    }
    kill_group(&mut child);

    let grace = Instant::now() + KILL_GRACE;
    if out.is_none() {
        out = receive(&stdout, grace);
    }
    if err.is_none() {
        err = receive(&stderr, grace);
    }

    Ok(Captured {
        status,
        stdout: out.unwrap_or_default(),
        stderr: err.unwrap_or_default(),
    })
}

/// Kill every process in the child's group, then the child itself.
fn kill_group(child: &mut Child) {
    #[cfg(target_os = "linux")]
    {
        if let Ok(pid) = libc::pid_t::try_from(child.id()) {
            unsafe {
                libc::kill(-pid, libc::SIGKILL);
            }
        }
    }
    let _ = child.kill();
}

/// Read a pipe to EOF on a helper thread, keeping at most `limit` bytes.
fn drain<R: Read + Send + 'static>(pipe: Option<R>, limit: usize) -> Option<Receiver<Drained>> {
    pipe.map(|mut pipe| {
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let mut bytes = Vec::new();
            let _ = pipe.by_ref().take(limit as u64).read_to_end(&mut bytes);
            let overflowed = std::io::copy(&mut pipe, &mut std::io::sink())
                .map(|extra| extra > 0)
                .unwrap_or(false);
            let _ = tx.send(Drained { bytes, overflowed });
        });
        rx
    })
}

/// Wait for a drain until `deadline`. A missing pipe counts as drained.
fn receive(rx: &Option<Receiver<Drained>>, deadline: Instant) -> Option<Drained> {
    match rx {
        None => Some(Drained::default()),
        Some(rx) => rx
            .recv_timeout(deadline.saturating_duration_since(Instant::now()))
            .ok(),
    }
}

/// Keep at most `max` characters. Returns whether anything was cut.
fn cap_chars(s: &str, max: usize) -> (String, bool) {
    match s.char_indices().nth(max) {
        Some((idx, _)) => (s[..idx].to_string(), true),
        None => (s.to_string(), false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echo() {
        let runner = CommandRunner::new(Duration::from_secs(5));
        let output = runner.run_blocking("echo hello").unwrap();
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "hello");
        assert!(output.stderr.is_empty());
    }

    #[test]
    fn test_working_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let runner = CommandRunner::new(Duration::from_secs(5))
            .with_working_dir(Some(temp_dir.path().to_path_buf()));
        let output = runner.run_blocking("pwd").unwrap();
        let name = temp_dir.path().file_name().unwrap().to_str().unwrap();
        assert!(output.stdout.contains(name));
    }

    #[test]
    fn test_missing_working_dir() {
        let runner = CommandRunner::new(Duration::from_secs(5))
            .with_working_dir(Some(PathBuf::from("/nonexistent/directory")));
        assert!(matches!(
            runner.run_blocking("echo test"),
            Err(CommandError::MissingWorkingDir(_))
        ));
    }

    #[test]
    fn test_nonzero_exit_and_stderr() {
        let runner = CommandRunner::new(Duration::from_secs(5));
        let output = runner.run_blocking("echo oops >&2; exit 3").unwrap();
        assert_eq!(output.exit_code, 3);
        assert_eq!(output.stderr.trim(), "oops");
    }

    #[test]
    fn test_timeout_kills_process() {
        let runner = CommandRunner::new(Duration::from_millis(200));
        let start = Instant::now();
        let err = runner.run_blocking("sleep 5").unwrap_err();
        assert!(matches!(err, CommandError::TimedOut(_)));
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_output_is_capped() {
        let runner = CommandRunner::new(Duration::from_secs(5));
        let output = runner
            .run_blocking("i=0; while [ $i -lt 700 ]; do echo 0123456789; i=$((i+1)); done")
            .unwrap();
        assert_eq!(output.stdout.chars().count(), MAX_STDOUT_CHARS);
        assert!(output.stdout_truncated);
    }

    #[test]
    fn test_background_job_does_not_outlive_timeout() {
        let runner = CommandRunner::new(Duration::from_secs(1));
        let start = Instant::now();
        let output = runner.run_blocking("sleep 8 & echo hi").unwrap();
        assert!(start.elapsed() < Duration::from_secs(4));
        assert_eq!(output.stdout.trim(), "hi");
        assert!(output.success());
    }

    #[test]
    fn test_large_output_is_not_buffered() {
        let runner = CommandRunner::new(Duration::from_secs(10));
        let output = runner
            .run_blocking("head -c 2000000 /dev/zero | tr '\\0' 'a'")
            .unwrap();
        assert!(output.success());
        assert_eq!(output.stdout.chars().count(), MAX_STDOUT_CHARS);
        assert!(output.stdout_truncated);
    }

    #[test]
    fn test_run_script_in_private_tmpdir() {
        let runner = CommandRunner::new(Duration::from_secs(5));
        let output = runner
            .run_script_blocking("sh", "answer.sh", "echo \"$0\"\necho 42\n")
            .unwrap();
        let mut lines = output.stdout.lines();
        assert!(lines.next().unwrap().contains("cedar-shell-"));
        assert_eq!(lines.next(), Some("42"));

        let cwd = runner.run_script_blocking("sh", "cwd.sh", "pwd").unwrap();
        assert!(cwd.stdout.contains("cedar-shell-"));
    }

    #[test]
    fn test_missing_interpreter_is_spawn_error() {
        let runner = CommandRunner::new(Duration::from_secs(5));
        assert!(matches!(
            runner.run_script_blocking("cedar-no-such-interpreter", "x.py", "print(1)"),
            Err(CommandError::Spawn(_))
        ));
    }

    #[test]
    fn test_private_tmpdir_is_removed() {
        let runner = CommandRunner::new(Duration::from_secs(5));
        let first = runner.run_blocking("echo $TMPDIR").unwrap();
        let second = runner.run_blocking("echo $TMPDIR").unwrap();
        let first_dir = first.stdout.trim().to_string();
        assert!(first_dir.contains("cedar-shell-"));
        assert_ne!(first_dir, second.stdout.trim());
        assert!(!Path::new(&first_dir).exists());
    }

    #[tokio::test]
    async fn test_async_run() {
        let runner = CommandRunner::new(Duration::from_secs(5));
        let output = runner.run("printf abc").await.unwrap();
        assert_eq!(output.stdout, "abc");
    }

    #[test]
    fn test_cap_chars_is_char_safe() {
        assert_eq!(cap_chars("héllo", 2), ("hé".to_string(), true));
        assert_eq!(cap_chars("hi", 5), ("hi".to_string(), false));
    }
}
