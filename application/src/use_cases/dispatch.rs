//! Dispatch use case
//!
//! Fans one task out to the selected agents and gathers exactly one result per
//! agent. Errors, panics and timeouts are caught at this boundary and turned
//! into confidence-0 results, so one failing agent never hides its siblings.

use crate::events::EventBus;
use crate::ports::agent::Agent;
use crate::registry::AgentRegistry;
use cedar_domain::{AgentFailure, AgentKind, AgentResult, ConversationContext, Event};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Runs selected agents concurrently
pub struct Dispatcher {
    registry: Arc<AgentRegistry>,
    agent_timeout: Duration,
}

impl Dispatcher {
    pub fn new(registry: Arc<AgentRegistry>, agent_timeout: Duration) -> Self {
        Self {
            registry,
            agent_timeout,
        }
    }

    /// Run `kinds` on `task` and return their results in selection order.
    ///
    /// One `agent_result` event is emitted per agent as it completes, so
    /// events follow completion order.
    pub async fn dispatch(
        &self,
        kinds: &[AgentKind],
        task: &str,
        context: Option<&ConversationContext>,
        bus: &EventBus,
        iteration: usize,
    ) -> Vec<AgentResult> {
        info!(
            iteration = iteration + 1,
            "Dispatching {} agent(s): {:?}",
            kinds.len(),
            kinds
        );

        let mut slots: Vec<Option<AgentResult>> = vec![None; kinds.len()];
        let mut join_set = JoinSet::new();

        for (index, &kind) in kinds.iter().enumerate() {
            let Some(agent) = self.registry.get(kind) else {
                warn!(agent = %kind, "Selected agent is not registered");
                let result =
                    AgentResult::configuration_error(kind, task, "Agent is not registered or disabled");
                bus.emit(Event::agent_result(&result, iteration)).await;
                slots[index] = Some(result);
                continue;
            };

            let task = task.to_string();
            let context = context.cloned();
            let timeout = self.agent_timeout;
            join_set.spawn(async move {
                let result = Self::run_agent(agent, kind, &task, context.as_ref(), timeout).await;
                (index, result)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, result)) => {
                    info!(
                        agent = %result.agent_name,
                        confidence = result.confidence,
                        method = %result.method,
                        "Agent completed"
                    );
                    bus.emit(Event::agent_result(&result, iteration)).await;
                    slots[index] = Some(result);
                }
                Err(e) => {
                    warn!("Agent task join error: {}", e);
                }
            }
        }

        // Anything still empty was aborted before reporting back
        let mut results = Vec::with_capacity(kinds.len());
        for (slot, &kind) in slots.into_iter().zip(kinds) {
            match slot {
                Some(result) => results.push(result),
                None => {
                    let result = AgentFailure::new("Aborted", "Agent task ended without a result")
                        .into_result(kind, task);
                    bus.emit(Event::agent_result(&result, iteration)).await;
                    results.push(result);
                }
            }
        }
        results
    }

    async fn run_agent(
        agent: Arc<dyn Agent>,
        kind: AgentKind,
        task: &str,
        context: Option<&ConversationContext>,
        timeout: Duration,
    ) -> AgentResult {
        let call = AssertUnwindSafe(agent.process(task, context)).catch_unwind();
        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(Ok(result))) => result,
            Ok(Ok(Err(e))) => {
                warn!(agent = %kind, "Agent failed: {}", e);
                e.to_failure().into_result(kind, task)
            }
            Ok(Err(panic)) => {
                let message = panic_message(panic.as_ref());
                warn!(agent = %kind, "Agent panicked: {}", message);
                AgentFailure::new("Panic", message).into_result(kind, task)
            }
            Err(_) => {
                warn!(
                    agent = %kind,
                    timeout_secs = timeout.as_secs(),
                    "Agent timed out"
                );
                debug!(agent = %kind, "Dropping in-flight agent call");
                AgentFailure::new(
                    "Timeout",
                    format!("Agent timed out after {}s", timeout.as_secs_f64()),
                )
                .into_result(kind, task)
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::agent::AgentError;
    use crate::ports::event_sink::{EventSink, TransportError};
    use async_trait::async_trait;
    use cedar_domain::EventEnvelope;
    use std::sync::Mutex;

    enum Behavior {
        Succeed(f64),
        Fail,
        Panic,
        Sleep(Duration),
    }

    struct ScriptedAgent {
        kind: AgentKind,
        behavior: Behavior,
    }

    #[async_trait]
    impl Agent for ScriptedAgent {
        fn kind(&self) -> AgentKind {
            self.kind
        }

        async fn process(
            &self,
            task: &str,
            _context: Option<&ConversationContext>,
        ) -> Result<AgentResult, AgentError> {
            match &self.behavior {
                Behavior::Succeed(confidence) => Ok(AgentResult::new(
                    self.kind,
                    format!("done: {}", task),
                    *confidence,
                    "scripted",
                )),
                Behavior::Fail => Err(AgentError::Execution("connection refused".into())),
                Behavior::Panic => panic!("agent exploded"),
                Behavior::Sleep(d) => {
                    tokio::time::sleep(*d).await;
                    Ok(AgentResult::new(self.kind, "late", 0.9, "scripted"))
                }
            }
        }
    }

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

    fn agent(kind: AgentKind, behavior: Behavior) -> Arc<dyn Agent> {
        Arc::new(ScriptedAgent { kind, behavior })
    }

    #[tokio::test]
    async fn test_one_result_per_agent_despite_failures() {
        let registry = AgentRegistry::new()
            .with(agent(AgentKind::Computation, Behavior::Succeed(0.95)))
            .with(agent(AgentKind::Research, Behavior::Fail))
            .with(agent(AgentKind::Strategy, Behavior::Panic));
        let dispatcher = Dispatcher::new(Arc::new(registry), Duration::from_secs(5));
        let sink = Arc::new(RecordingSink::default());
        let bus = EventBus::new(sink.clone(), Duration::from_secs(10));

        let kinds = [AgentKind::Computation, AgentKind::Research, AgentKind::Strategy];
        let results = dispatcher.dispatch(&kinds, "2+2", None, &bus, 0).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].result, "done: 2+2");
        assert_eq!(results[1].confidence, 0.0);
        assert_eq!(results[1].method, "Agent Exception");
        assert!(results[1].result.contains("Check network connectivity"));
        assert_eq!(results[2].explanation, "Agent crashed: Panic");
        assert!(results[2].result.contains("agent exploded"));

        let envelopes = sink.envelopes.lock().unwrap();
        assert_eq!(envelopes.len(), 3);
        assert!(envelopes.iter().all(|e| e.event.event_type() == "agent_result"));
    }

    #[tokio::test]
    async fn test_timeout_becomes_result() {
        let registry = AgentRegistry::new()
            .with(agent(AgentKind::SystemSearch, Behavior::Sleep(Duration::from_secs(30))))
            .with(agent(AgentKind::Computation, Behavior::Succeed(0.5)));
        let dispatcher = Dispatcher::new(Arc::new(registry), Duration::from_millis(50));
        let bus = EventBus::new(Arc::new(RecordingSink::default()), Duration::from_secs(10));

        let kinds = [AgentKind::SystemSearch, AgentKind::Computation];
        let results = dispatcher.dispatch(&kinds, "ls", None, &bus, 0).await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].explanation, "Agent crashed: Timeout");
        assert!(results[0].result.contains("Try a simpler query"));
        assert_eq!(results[1].confidence, 0.5);
    }

    #[tokio::test]
    async fn test_unregistered_agent_is_configuration_error() {
        let dispatcher = Dispatcher::new(Arc::new(AgentRegistry::new()), Duration::from_secs(1));
        let bus = EventBus::new(Arc::new(RecordingSink::default()), Duration::from_secs(10));

        let results = dispatcher
            .dispatch(&[AgentKind::FileTransfer], "https://x", None, &bus, 0)
            .await;
        assert_eq!(results.len(), 1);
        assert!(results[0].is_configuration_error());
    }

    #[tokio::test]
    async fn test_events_follow_completion_order() {
        let registry = AgentRegistry::new()
            .with(agent(AgentKind::Research, Behavior::Sleep(Duration::from_millis(200))))
            .with(agent(AgentKind::Computation, Behavior::Succeed(0.9)));
        let dispatcher = Dispatcher::new(Arc::new(registry), Duration::from_secs(5));
        let sink = Arc::new(RecordingSink::default());
        let bus = EventBus::new(sink.clone(), Duration::from_secs(10));

        let kinds = [AgentKind::Research, AgentKind::Computation];
        let results = dispatcher.dispatch(&kinds, "q", None, &bus, 0).await;

        // Results keep selection order
        assert_eq!(results[0].agent_name, "ResearchAgent");
        // Events follow completion order
        let envelopes = sink.envelopes.lock().unwrap();
        match &envelopes[0].event {
            Event::AgentResult { agent_name, .. } => assert_eq!(agent_name, "Coding Agent"),
            other => panic!("unexpected event {:?}", other),
        }
    }
}
