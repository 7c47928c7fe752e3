//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;

/// CLI arguments for cedar
#[derive(Parser, Debug)]
#[command(name = "cedar")]
#[command(author, version, about = "Multi-agent orchestration - agents work, a chief agent decides")]
#[command(long_about = r#"
Cedar routes a request to a small set of specialist agents, runs them
concurrently, and lets a reviewing Chief Agent decide whether the answer is
final, needs another iteration, or needs clarification from you.

Configuration files are loaded from (in priority order):
1. CEDAR_* environment variables (e.g. CEDAR_ORCHESTRATOR__MAX_ITERATIONS=3)
2. --config <path>     Explicit config file
3. ./cedar.toml        Project-level config (or ./.cedar.toml)
4. ~/.config/cedar/config.toml   Global config

Example:
  cedar "2+2"
  cedar "find files containing TODO in ./src"
  cedar --json "research the history of the Rust borrow checker"
"#)]
pub struct Cli {
    /// The request to orchestrate
    #[arg(required_unless_present = "show_config")]
    pub message: Option<String>,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,

    /// Override orchestrator.max_iterations
    #[arg(long, value_name = "N")]
    pub max_iterations: Option<usize>,

    /// Stream raw events to stdout as JSON lines
    #[arg(long)]
    pub json: bool,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
