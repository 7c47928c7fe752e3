//! Application layer for cedar
//!
//! This crate contains use cases, port definitions, the event bus and
//! application configuration. It depends only on the domain layer.

pub mod config;
pub mod events;
pub mod ports;
pub mod registry;
pub mod use_cases;

// Re-export commonly used types
pub use config::ExecutionParams;
pub use events::{AckInfo, AckRegistry, EventBus, PendingAck};
pub use ports::{
    agent::{Agent, AgentError},
    conversation_logger::{ConversationEvent, ConversationLogger, NoConversationLogger},
    event_sink::{EventSink, NoEventSink, TransportError},
    llm_gateway::{CompletionRequest, GatewayError, LlmGateway},
    note_sink::{NoNoteSink, NoteSink, NoteSinkError},
};
pub use registry::AgentRegistry;
pub use use_cases::dispatch::Dispatcher;
pub use use_cases::orchestrate::{OrchestrateError, OrchestrateInput, OrchestrateUseCase};
pub use use_cases::review::ReviewerController;
