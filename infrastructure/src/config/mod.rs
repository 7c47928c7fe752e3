//! Configuration file loading for cedar
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `CEDAR_*` environment variables
//! 2. `--config <path>` specified file
//! 3. Project root: `./cedar.toml` or `./.cedar.toml`
//! 4. Global: `~/.config/cedar/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    ConfigValidationError, FileAgentsConfig, FileConfig, FileEventsConfig, FileLoggingConfig,
    FileNotesConfig, FileOrchestratorConfig, FileReviewerConfig, FileShellConfig, expand_home,
};
pub use loader::ConfigLoader;
