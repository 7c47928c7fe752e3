//! In-process event transport over a tokio channel

use async_trait::async_trait;
use cedar_application::{EventSink, TransportError};
use cedar_domain::EventEnvelope;
use tokio::sync::mpsc;

/// Forwards envelopes to a bounded channel. Sending waits while the channel
/// is full; a dropped receiver is reported as [`TransportError::Closed`].
pub struct ChannelEventSink {
    tx: mpsc::Sender<EventEnvelope>,
}

impl ChannelEventSink {
    /// Create a sink and the receiver it feeds.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<EventEnvelope>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EventSink for ChannelEventSink {
    async fn send(&self, envelope: &EventEnvelope) -> Result<(), TransportError> {
        self.tx
            .send(envelope.clone())
            .await
            .map_err(|_| TransportError::Closed)
    }
}
