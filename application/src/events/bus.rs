//! Event bus
//!
//! `emit` is fire-and-forget: a failing sink is logged and ignored, so a
//! disconnected observer never cancels agent work. Callers await each emit
//! before the next, which keeps per-iteration ordering intact.

use super::ack::{AckInfo, AckRegistry, PendingAck};
use crate::ports::event_sink::EventSink;
use cedar_domain::{Event, EventEnvelope};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub struct EventBus {
    sink: Arc<dyn EventSink>,
    acks: Arc<AckRegistry>,
    thread_id: Option<String>,
}

impl EventBus {
    pub fn new(sink: Arc<dyn EventSink>, ack_timeout: Duration) -> Self {
        Self {
            sink,
            acks: Arc::new(AckRegistry::new(ack_timeout)),
            thread_id: None,
        }
    }

    /// Attach a conversation/thread id to acknowledgment records.
    pub fn with_thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    /// Send an event, requesting acknowledgment when the event type calls
    /// for it. Returns the `eid` if one was assigned.
    pub async fn publish(&self, event: Event) -> Option<String> {
        if event.requires_ack() {
            Some(self.emit_with_ack(event).await)
        } else {
            self.emit(event).await;
            None
        }
    }

    /// Send an event without acknowledgment.
    pub async fn emit(&self, event: Event) {
        self.deliver(EventEnvelope::new(event)).await;
    }

    /// Send an event with a fresh `eid` and watch its acknowledgment deadline.
    pub async fn emit_with_ack(&self, event: Event) -> String {
        let info = AckInfo {
            event_type: event.event_type().to_string(),
            function: event.function().map(str::to_string),
            thread_id: self.thread_id.clone(),
        };
        let eid = self.acks.register(info);
        self.watch(eid.clone());
        self.deliver(EventEnvelope::with_eid(event, eid.clone())).await;
        eid
    }

    /// Mark an event acknowledged. Returns whether it was pending.
    pub fn acknowledge(&self, eid: &str) -> bool {
        let acked = self.acks.acknowledge(eid);
        debug!(eid, acked, "Acknowledgment received");
        acked
    }

    pub fn pending_acks(&self) -> Vec<PendingAck> {
        self.acks.pending()
    }

    pub fn ack_registry(&self) -> Arc<AckRegistry> {
        Arc::clone(&self.acks)
    }

    async fn deliver(&self, envelope: EventEnvelope) {
        let event_type = envelope.event.event_type();
        if let Err(e) = self.sink.send(&envelope).await {
            warn!(event_type, "Event delivery failed: {}", e);
        } else {
            debug!(event_type, eid = ?envelope.eid, "Event delivered");
        }
    }

    fn watch(&self, eid: String) {
        let acks = Arc::clone(&self.acks);
        let timeout = acks.timeout();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(info) = acks.expire(&eid) {
                warn!(
                    "[ack-timeout] eid={} type={} function={} thread={}",
                    eid,
                    info.event_type,
                    info.function.as_deref().unwrap_or("-"),
                    info.thread_id.as_deref().unwrap_or("-"),
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::event_sink::TransportError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        envelopes: Mutex<Vec<EventEnvelope>>,
    }

    #[async_trait]
    impl EventSink for RecordingSink {
        async fn send(&self, envelope: &EventEnvelope) -> Result<(), TransportError> {
            self.envelopes.lock().unwrap().push(envelope.clone());
            Ok(())
        }
    }

    struct ClosedSink;

    #[async_trait]
    impl EventSink for ClosedSink {
        async fn send(&self, _envelope: &EventEnvelope) -> Result<(), TransportError> {
            Err(TransportError::Closed)
        }
    }

    #[tokio::test]
    async fn test_publish_assigns_eid_only_when_required() {
        let sink = Arc::new(RecordingSink::default());
        let bus = EventBus::new(sink.clone(), Duration::from_secs(10));

        let eid = bus
            .publish(Event::processing("working", 0, 10, vec![]))
            .await;
        let none = bus
            .publish(Event::NoteSaved {
                note_id: "n1".into(),
                iteration: 1,
                is_final: true,
                message: "saved".into(),
            })
            .await;

        assert!(eid.is_some());
        assert!(none.is_none());

        let envelopes = sink.envelopes.lock().unwrap();
        assert_eq!(envelopes.len(), 2);
        assert_eq!(envelopes[0].eid, eid);
        assert_eq!(envelopes[1].eid, None);
        assert_eq!(bus.pending_acks().len(), 1);
    }

    #[tokio::test]
    async fn test_acknowledge_clears_pending() {
        let bus = EventBus::new(Arc::new(RecordingSink::default()), Duration::from_secs(10))
            .with_thread_id("t-1");
        let eid = bus
            .emit_with_ack(Event::Error {
                message: "x".into(),
            })
            .await;
        let pending = bus.pending_acks();
        assert_eq!(pending[0].info.thread_id.as_deref(), Some("t-1"));
        assert!(bus.acknowledge(&eid));
        assert!(bus.pending_acks().is_empty());
    }

    #[tokio::test]
    async fn test_missed_deadline_is_pruned() {
        let bus = EventBus::new(Arc::new(RecordingSink::default()), Duration::from_millis(10));
        bus.emit_with_ack(Event::processing("x", 0, 1, vec![])).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(bus.pending_acks().is_empty());
    }

    #[tokio::test]
    async fn test_failing_sink_does_not_panic() {
        let bus = EventBus::new(Arc::new(ClosedSink), Duration::from_secs(10));
        bus.emit(Event::Error {
            message: "gone".into(),
        })
        .await;
        let eid = bus.emit_with_ack(Event::processing("x", 0, 1, vec![])).await;
        assert!(!eid.is_empty());
    }
}
