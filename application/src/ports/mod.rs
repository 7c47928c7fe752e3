//! Port definitions (interfaces for external adapters)

pub mod agent;
pub mod conversation_logger;
pub mod event_sink;
pub mod llm_gateway;
pub mod note_sink;
