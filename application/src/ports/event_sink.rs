//! Event transport port
//!
//! The event bus hands serialized-ready envelopes to an [`EventSink`]. A
//! failing sink never cancels agent work; the bus logs and carries on.

use async_trait::async_trait;
use cedar_domain::EventEnvelope;
use thiserror::Error;

/// Errors from an event transport
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Transport closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Destination for orchestration events
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn send(&self, envelope: &EventEnvelope) -> Result<(), TransportError>;
}

/// Sink that drops every event
pub struct NoEventSink;

#[async_trait]
impl EventSink for NoEventSink {
    async fn send(&self, _envelope: &EventEnvelope) -> Result<(), TransportError> {
        Ok(())
    }
}
