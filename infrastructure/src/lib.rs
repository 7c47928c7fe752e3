//! Infrastructure layer for cedar
//!
//! This crate contains adapters that implement the ports defined in the
//! application layer: the concrete agents, the OpenAI-compatible reasoning
//! gateway, event transports, note storage, transcript logging and
//! configuration file loading.

pub mod agents;
pub mod config;
pub mod events;
pub mod llm;
pub mod logging;
pub mod notes;

// Re-export commonly used types
pub use agents::{AgentSettings, build_registry};
pub use config::{ConfigLoader, ConfigValidationError, FileConfig};
pub use events::{ChannelEventSink, JsonlEventSink};
pub use llm::OpenAiGateway;
pub use logging::JsonlConversationLogger;
pub use notes::MarkdownNoteSink;
