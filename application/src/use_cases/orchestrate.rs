//! Orchestrate use case
//!
//! Drives one message through the bounded Classify → Dispatch → Review loop
//! and produces exactly one terminal [`Outcome`]. The loop is an explicit
//! `loop` over [`LoopState`]; an overall deadline and an optional
//! cancellation token stop it at the next suspension point and force a final
//! answer from the best available result.

use super::dispatch::Dispatcher;
use super::review::ReviewerController;
use crate::config::ExecutionParams;
use crate::events::EventBus;
use crate::ports::conversation_logger::{
    ConversationEvent, ConversationLogger, NoConversationLogger,
};
use crate::ports::llm_gateway::LlmGateway;
use crate::ports::note_sink::{NoNoteSink, NoteSink};
use crate::registry::AgentRegistry;
use cedar_domain::orchestration::{
    format_agent_clarification, format_final_text, format_reviewer_clarification,
    processing_announcement, refinement_notice, timing_footer,
};
use cedar_domain::{
    AgentKind, AgentResult, CHIEF_ROLE, Clarification, Classification, ConversationContext,
    Decision, DomainError, Event, FinalAnswer, FinalMetadata, FinalPayload, IterationContext,
    LoopState, Outcome, Task, TaskClassifier, TerminationReason, Verdict,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Method label on final payloads
pub const FINAL_METHOD: &str = "Chief Agent Decision";

/// Errors that prevent orchestration from starting
#[derive(Error, Debug)]
pub enum OrchestrateError {
    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] DomainError),
}

/// Input for the Orchestrate use case
#[derive(Debug, Clone, Default)]
pub struct OrchestrateInput {
    /// The user's message
    pub message: String,
    /// Prior turns and attached resources
    pub context: Option<ConversationContext>,
    /// Cancels the loop at the next suspension point
    pub cancellation: Option<CancellationToken>,
}

impl OrchestrateInput {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            cancellation: None,
        }
    }

    pub fn with_context(mut self, context: ConversationContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

/// Use case for orchestrating one message
pub struct OrchestrateUseCase {
    registry: Arc<AgentRegistry>,
    dispatcher: Dispatcher,
    reviewer: ReviewerController,
    params: ExecutionParams,
    note_sink: Arc<dyn NoteSink>,
    conversation_logger: Arc<dyn ConversationLogger>,
}

/// Per-message clock and cancellation
struct Bounds {
    started: Instant,
    deadline: tokio::time::Instant,
    cancel: CancellationToken,
}

impl OrchestrateUseCase {
    pub fn new(
        registry: Arc<AgentRegistry>,
        gateway: Option<Arc<dyn LlmGateway>>,
        params: ExecutionParams,
    ) -> Self {
        let dispatcher = Dispatcher::new(registry.clone(), params.agent_timeout);
        let reviewer = ReviewerController::new(gateway)
            .with_timeout(params.reviewer_timeout)
            .with_max_tokens(params.reviewer_max_tokens);
        Self {
            registry,
            dispatcher,
            reviewer,
            params,
            note_sink: Arc::new(NoNoteSink),
            conversation_logger: Arc::new(NoConversationLogger),
        }
    }

    pub fn with_note_sink(mut self, sink: Arc<dyn NoteSink>) -> Self {
        self.note_sink = sink;
        self
    }

    pub fn with_conversation_logger(mut self, logger: Arc<dyn ConversationLogger>) -> Self {
        self.conversation_logger = logger;
        self
    }

    pub fn params(&self) -> &ExecutionParams {
        &self.params
    }

    /// Orchestrate one message, streaming events to `bus`.
    ///
    /// Only an empty message is an error; everything else ends in a final
    /// answer or a clarification request.
    pub async fn execute(
        &self,
        input: OrchestrateInput,
        bus: &EventBus,
    ) -> Result<Outcome, OrchestrateError> {
        let bounds = Bounds {
            started: Instant::now(),
            deadline: tokio::time::Instant::now() + self.params.deadline,
            cancel: input.cancellation.unwrap_or_default(),
        };

        let task = match Task::new(input.message) {
            Ok(task) => task,
            Err(e) => {
                warn!("Rejected request: {}", e);
                bus.emit(Event::Error {
                    message: e.to_string(),
                })
                .await;
                return Err(e.into());
            }
        };
        let task = match input.context {
            Some(context) => task.with_context(context),
            None => task,
        };

        let classification = TaskClassifier::new()
            .with_available(self.registry.kinds())
            .classify(task.message());
        info!(
            task_type = classification.identified_type.as_str(),
            complexity = classification.complexity.as_str(),
            "Selected agents: {}",
            classification.agent_names()
        );
        self.conversation_logger
            .log(ConversationEvent::classification(task.message(), &classification));

        let outcome = self.run_loop(&task, &classification, &bounds, bus).await?;

        self.conversation_logger.log(ConversationEvent::outcome(&outcome));
        match &outcome {
            Outcome::Final(answer) => {
                bus.publish(Event::final_answer(answer)).await;
            }
            Outcome::Clarify(clarification) => {
                bus.publish(Event::clarify(clarification)).await;
            }
        }
        Ok(outcome)
    }

    async fn run_loop(
        &self,
        task: &Task,
        classification: &Classification,
        bounds: &Bounds,
        bus: &EventBus,
    ) -> Result<Outcome, OrchestrateError> {
        let max_iterations = self.params.max_iterations;
        let shell_selected = classification
            .agents_to_use
            .contains(&AgentKind::SystemSearch);
        let agent_labels: Vec<String> = classification
            .agents_to_use
            .iter()
            .map(|kind| kind.display_name().to_string())
            .collect();

        let mut state = LoopState::Thinking;
        let mut iteration = IterationContext::first(task.message(), max_iterations);
        let mut last_results: Vec<AgentResult> = Vec::new();

        loop {
            if let Err(e) = iteration.ensure_can_dispatch() {
                info!("{}", e);
                state = state.transition(LoopState::Final)?;
                debug!(state = state.as_str(), "Forced termination");
                return Ok(self.forced_final(
                    &last_results,
                    iteration.iteration_index(),
                    TerminationReason::MaxIterationsReached,
                    bounds,
                ));
            }
            state = state.transition(LoopState::Dispatching)?;
            let index = iteration.iteration_index();

            bus.publish(Event::processing(
                processing_announcement(classification, index, max_iterations),
                index,
                max_iterations,
                agent_labels.clone(),
            ))
            .await;

            let context = self.agent_context(task, &iteration);
            let dispatched = self.bounded(
                bounds,
                self.dispatcher.dispatch(
                    &classification.agents_to_use,
                    iteration.message(),
                    context.as_ref(),
                    bus,
                    index,
                ),
            );
            let results = match dispatched.await {
                Ok(results) => results,
                Err(reason) => {
                    state.transition(LoopState::Final)?;
                    return Ok(self.forced_final(&last_results, index, reason, bounds));
                }
            };
            for result in &results {
                self.conversation_logger
                    .log(ConversationEvent::agent_result(index, result));
            }

            // An agent asking for clarification ends the message; the
            // reviewer is not consulted
            if let Some(asking) = results.iter().find(|r| r.needs_clarification) {
                state.transition(LoopState::Clarifying)?;
                info!(agent = %asking.agent_name, "Agent requested clarification");
                let decision = Decision::agent_clarification(asking);
                self.record_decision(task, &results, &decision, index, bus)
                    .await;
                return Ok(Outcome::Clarify(Clarification {
                    question: asking.clarification_question.clone(),
                    text: format_agent_clarification(asking),
                    role: asking.display_name.clone(),
                    iterations: index + 1,
                }));
            }

            state = state.transition(LoopState::Reviewing)?;
            let decision = match self
                .bounded(bounds, self.reviewer.review(&iteration, &results))
                .await
            {
                Ok(decision) => decision,
                Err(reason) => {
                    state.transition(LoopState::Final)?;
                    return Ok(self.forced_final(&results, index + 1, reason, bounds));
                }
            };
            self.record_decision(task, &results, &decision, index, bus)
                .await;

            match &decision.verdict {
                Verdict::Final { .. } => {
                    state.transition(LoopState::Final)?;
                    return Ok(Outcome::Final(self.final_answer(
                        &decision,
                        &results,
                        index + 1,
                        TerminationReason::Decided,
                        bounds,
                    )));
                }
                Verdict::Clarify { question } => {
                    state.transition(LoopState::Clarifying)?;
                    return Ok(Outcome::Clarify(Clarification {
                        question: question.clone(),
                        text: format_reviewer_clarification(&decision),
                        role: CHIEF_ROLE.to_string(),
                        iterations: index + 1,
                    }));
                }
                Verdict::Loop { guidance, action } => {
                    state = state.transition(LoopState::Looping)?;
                    let next =
                        iteration.next(guidance, action.as_ref(), shell_selected, results.clone());
                    if next.ensure_can_dispatch().is_err() {
                        info!(max_iterations, "Maximum iterations reached");
                        state.transition(LoopState::Final)?;
                        return Ok(self.forced_final(
                            &results,
                            index + 1,
                            TerminationReason::MaxIterationsReached,
                            bounds,
                        ));
                    }

                    info!(
                        iteration = next.iteration_index() + 1,
                        "Reviewer requested another iteration: {}", guidance
                    );
                    bus.publish(Event::LoopContinue {
                        iteration: next.iteration_index() + 1,
                        max_iterations,
                        remaining_loops: next.remaining_loops(),
                        guidance: guidance.clone(),
                        text: refinement_notice(&decision, next.iteration_index(), max_iterations),
                    })
                    .await;

                    last_results = results;
                    iteration = next;
                }
            }
        }
    }

    /// Race `future` against cancellation and the overall deadline.
    async fn bounded<F: Future>(
        &self,
        bounds: &Bounds,
        future: F,
    ) -> Result<F::Output, TerminationReason> {
        tokio::select! {
            biased;
            _ = bounds.cancel.cancelled() => {
                warn!("Orchestration cancelled");
                Err(TerminationReason::Cancelled)
            }
            _ = tokio::time::sleep_until(bounds.deadline) => {
                warn!(deadline_secs = self.params.deadline.as_secs(), "Orchestration deadline exceeded");
                Err(TerminationReason::DeadlineExceeded)
            }
            output = future => Ok(output),
        }
    }

    /// Context handed to agents: the caller's context plus prior findings.
    fn agent_context(&self, task: &Task, iteration: &IterationContext) -> Option<ConversationContext> {
        let index = iteration.iteration_index();
        match task.context() {
            Some(context) => Some(context.for_iteration(index, iteration.prior_findings())),
            None if index > 0 => {
                Some(ConversationContext::new().for_iteration(index, iteration.prior_findings()))
            }
            None => None,
        }
    }

    /// Log the decision and persist notes for the iteration.
    async fn record_decision(
        &self,
        task: &Task,
        results: &[AgentResult],
        decision: &Decision,
        index: usize,
        bus: &EventBus,
    ) {
        self.conversation_logger
            .log(ConversationEvent::decision(index, decision));

        match self
            .note_sink
            .save_iteration_notes(task.message(), results, decision, index)
            .await
        {
            Ok(Some(note_id)) => {
                debug!(note_id = %note_id, "Iteration notes saved");
                bus.emit(Event::NoteSaved {
                    note_id,
                    iteration: index + 1,
                    is_final: !matches!(decision.verdict, Verdict::Loop { .. }),
                    message: format!("Iteration {} analysis saved to Notes", index + 1),
                })
                .await;
            }
            Ok(None) => {}
            Err(e) => warn!("Failed to save iteration notes: {}", e),
        }
    }

    /// Final answer when the loop is stopped before the reviewer decided.
    fn forced_final(
        &self,
        results: &[AgentResult],
        iterations: usize,
        reason: TerminationReason,
        bounds: &Bounds,
    ) -> Outcome {
        let decision = Decision::fallback(
            results,
            format!("Stopped ({}) - using best available result", reason.as_str()),
        );
        Outcome::Final(self.final_answer(&decision, results, iterations, reason, bounds))
    }

    fn final_answer(
        &self,
        decision: &Decision,
        results: &[AgentResult],
        iterations: usize,
        termination: TerminationReason,
        bounds: &Bounds,
    ) -> FinalAnswer {
        let elapsed = bounds.started.elapsed().as_secs_f64();
        let body = format_final_text(
            decision.answer().unwrap_or_default(),
            &decision.reasoning,
            results,
            self.params.next_steps,
        );

        let mut text = String::new();
        if let Some(notice) = termination.notice(self.params.max_iterations) {
            text.push_str(&notice);
            text.push_str("\n\n");
        }
        text.push_str(&body);
        text.push_str("\n\n");
        text.push_str(&timing_footer(iterations, elapsed));

        let confidence = results
            .iter()
            .map(|r| r.confidence)
            .fold(0.0_f64, f64::max);
        let selected_agent = if decision.selected_agent.is_empty() {
            CHIEF_ROLE.to_string()
        } else {
            decision.selected_agent.clone()
        };

        info!(
            iterations,
            termination = termination.as_str(),
            selected = %selected_agent,
            "Final answer ready in {:.1}s",
            elapsed
        );

        FinalAnswer {
            text,
            payload: FinalPayload {
                role: CHIEF_ROLE.to_string(),
                selected_agent,
                chief_reasoning: decision.reasoning.clone(),
                confidence,
                method: FINAL_METHOD.to_string(),
                orchestration_time: elapsed,
                iterations,
                termination,
                metadata: FinalMetadata {
                    all_results: results.to_vec(),
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::agent::{Agent, AgentError};
    use crate::ports::event_sink::{EventSink, TransportError};
    use crate::ports::llm_gateway::{CompletionRequest, GatewayError};
    use crate::ports::note_sink::NoteSinkError;
    use async_trait::async_trait;
    use cedar_domain::EventEnvelope;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    // ==================== Test doubles ====================

    #[derive(Clone)]
    enum Script {
        Reply(String, f64),
        Clarify(String),
        Panic,
        Sleep(Duration),
    }

    struct ScriptedAgent {
        kind: AgentKind,
        script: Script,
        tasks: Mutex<Vec<String>>,
    }

    impl ScriptedAgent {
        fn new(kind: AgentKind, script: Script) -> Arc<Self> {
            Arc::new(Self {
                kind,
                script,
                tasks: Mutex::new(Vec::new()),
            })
        }
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
            self.tasks.lock().unwrap().push(task.to_string());
            match &self.script {
                Script::Reply(text, confidence) => Ok(AgentResult::new(
                    self.kind,
                    text.clone(),
                    *confidence,
                    "scripted",
                )
                .with_summary(format!("{} says {}", self.kind.display_name(), text))),
                Script::Clarify(question) => Ok(AgentResult::new(
                    self.kind,
                    "Answer: need more detail",
                    0.3,
                    "scripted",
                )
                .with_clarification(question.clone())),
                Script::Panic => panic!("scripted panic"),
                Script::Sleep(d) => {
                    tokio::time::sleep(*d).await;
                    Ok(AgentResult::new(self.kind, "slow", 0.5, "scripted"))
                }
            }
        }
    }

    struct ScriptedGateway {
        replies: Mutex<VecDeque<String>>,
        calls: Mutex<usize>,
    }

    impl ScriptedGateway {
        fn new(replies: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl LlmGateway for ScriptedGateway {
        fn model(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _request: CompletionRequest) -> Result<String, GatewayError> {
            *self.calls.lock().unwrap() += 1;
            let mut replies = self.replies.lock().unwrap();
            // The last reply repeats forever
            let reply = if replies.len() > 1 {
                replies.pop_front()
            } else {
                replies.front().cloned()
            };
            reply.ok_or_else(|| GatewayError::Other("no reply scripted".into()))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        envelopes: Mutex<Vec<EventEnvelope>>,
    }

    impl RecordingSink {
        fn types(&self) -> Vec<&'static str> {
            self.envelopes
                .lock()
                .unwrap()
                .iter()
                .map(|e| e.event.event_type())
                .collect()
        }
    }

    #[async_trait]
    impl EventSink for RecordingSink {
        async fn send(&self, envelope: &EventEnvelope) -> Result<(), TransportError> {
            self.envelopes.lock().unwrap().push(envelope.clone());
            Ok(())
        }
    }

    /// Observer that went away: every send fails
    #[derive(Default)]
    struct DisconnectedSink {
        attempts: Mutex<usize>,
    }

    #[async_trait]
    impl EventSink for DisconnectedSink {
        async fn send(&self, _envelope: &EventEnvelope) -> Result<(), TransportError> {
            *self.attempts.lock().unwrap() += 1;
            Err(TransportError::Closed)
        }
    }

    struct CountingNoteSink {
        saved: Mutex<Vec<(usize, &'static str)>>,
    }

    #[async_trait]
    impl NoteSink for CountingNoteSink {
        async fn save_iteration_notes(
            &self,
            _user_query: &str,
            _results: &[AgentResult],
            decision: &Decision,
            iteration: usize,
        ) -> Result<Option<String>, NoteSinkError> {
            let mut saved = self.saved.lock().unwrap();
            saved.push((iteration, decision.kind()));
            Ok(Some(format!("note-{}", saved.len())))
        }
    }

    struct FailingNoteSink;

    #[async_trait]
    impl NoteSink for FailingNoteSink {
        async fn save_iteration_notes(
            &self,
            _user_query: &str,
            _results: &[AgentResult],
            _decision: &Decision,
            _iteration: usize,
        ) -> Result<Option<String>, NoteSinkError> {
            Err(NoteSinkError::Rejected("disk full".into()))
        }
    }

    fn bus() -> (EventBus, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        (EventBus::new(sink.clone(), Duration::from_secs(10)), sink)
    }

    fn use_case(
        agents: Vec<Arc<dyn Agent>>,
        gateway: Option<Arc<dyn LlmGateway>>,
        params: ExecutionParams,
    ) -> OrchestrateUseCase {
        let registry = agents
            .into_iter()
            .fold(AgentRegistry::new(), |registry, agent| registry.with(agent));
        OrchestrateUseCase::new(Arc::new(registry), gateway, params)
    }

    fn final_of(outcome: &Outcome) -> &FinalAnswer {
        match outcome {
            Outcome::Final(answer) => answer,
            other => panic!("expected final, got {:?}", other),
        }
    }

    const LOOP_REPLY: &str = r#"{"decision": "loop", "additional_guidance": "Check again with more precision", "selected_agent": "combined", "reasoning": "not sure yet"}"#;

    // ==================== Scenarios ====================

    #[tokio::test]
    async fn test_simple_arithmetic_finishes_in_one_iteration() {
        let computation = ScriptedAgent::new(
            AgentKind::Computation,
            Script::Reply("Answer: 4".into(), 0.95),
        );
        let orchestrator = use_case(vec![computation.clone()], None, ExecutionParams::default());
        let (bus, sink) = bus();

        let outcome = orchestrator
            .execute(OrchestrateInput::new("2+2"), &bus)
            .await
            .unwrap();

        let answer = final_of(&outcome);
        assert_eq!(answer.payload.iterations, 1);
        assert_eq!(answer.payload.selected_agent, "Coding Agent");
        assert_eq!(answer.payload.confidence, 0.95);
        assert_eq!(answer.payload.method, FINAL_METHOD);
        assert_eq!(answer.payload.termination, TerminationReason::Decided);
        assert!(answer.text.contains("4"));
        assert!(answer.text.ends_with('_'));
        assert_eq!(sink.types(), vec!["action", "agent_result", "final"]);
        assert_eq!(computation.tasks.lock().unwrap().as_slice(), ["2+2"]);
    }

    #[tokio::test]
    async fn test_all_configuration_errors_fall_back_to_first() {
        struct Unconfigured(AgentKind);

        #[async_trait]
        impl Agent for Unconfigured {
            fn kind(&self) -> AgentKind {
                self.0
            }

            async fn process(
                &self,
                task: &str,
                _context: Option<&ConversationContext>,
            ) -> Result<AgentResult, AgentError> {
                Ok(AgentResult::configuration_error(self.0, task, "no backend"))
            }
        }

        let orchestrator = use_case(
            vec![
                Arc::new(Unconfigured(AgentKind::MathDerivation)),
                Arc::new(Unconfigured(AgentKind::Computation)),
            ],
            None,
            ExecutionParams::default(),
        );
        let (bus, sink) = bus();

        let outcome = orchestrator
            .execute(OrchestrateInput::new("derive the quadratic formula"), &bus)
            .await
            .unwrap();

        let answer = final_of(&outcome);
        assert_eq!(answer.payload.metadata.all_results.len(), 2);
        assert!(answer.payload.metadata.all_results.iter().all(|r| r.confidence == 0.0));
        // Ties go to the first result in selection order
        assert_eq!(answer.payload.selected_agent, "Math Agent");
        assert_eq!(sink.types().last(), Some(&"final"));
    }

    #[tokio::test]
    async fn test_file_search_uses_shell_only() {
        let shell = ScriptedAgent::new(
            AgentKind::SystemSearch,
            Script::Reply("Answer: /tmp/foo.txt".into(), 0.9),
        );
        let research =
            ScriptedAgent::new(AgentKind::Research, Script::Reply("Answer: ?".into(), 0.5));
        let orchestrator = use_case(
            vec![shell.clone(), research.clone()],
            None,
            ExecutionParams::default(),
        );
        let (bus, sink) = bus();

        orchestrator
            .execute(
                OrchestrateInput::new("find files containing foo on my machine"),
                &bus,
            )
            .await
            .unwrap();

        assert_eq!(shell.tasks.lock().unwrap().len(), 1);
        assert!(research.tasks.lock().unwrap().is_empty());
        let envelopes = sink.envelopes.lock().unwrap();
        match &envelopes[0].event {
            Event::Action { agents, .. } => assert_eq!(agents, &vec!["Shell Executor".to_string()]),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_agent_clarification_skips_reviewer() {
        let shell = ScriptedAgent::new(
            AgentKind::SystemSearch,
            Script::Clarify("Which directory?".into()),
        );
        let gateway = ScriptedGateway::new(&[LOOP_REPLY]);
        let orchestrator = use_case(
            vec![shell],
            Some(gateway.clone()),
            ExecutionParams::default(),
        );
        let (bus, sink) = bus();

        let outcome = orchestrator
            .execute(OrchestrateInput::new("list files in the folder"), &bus)
            .await
            .unwrap();

        match &outcome {
            Outcome::Clarify(clarification) => {
                assert_eq!(clarification.question, "Which directory?");
                assert_eq!(clarification.role, "Shell Executor");
            }
            other => panic!("expected clarify, got {:?}", other),
        }
        assert_eq!(gateway.calls(), 0);
        assert_eq!(sink.types(), vec!["action", "agent_result", "clarify"]);
    }

    #[tokio::test]
    async fn test_invalid_reviewer_json_falls_back_without_retry() {
        let computation = ScriptedAgent::new(
            AgentKind::Computation,
            Script::Reply("Answer: 4".into(), 0.95),
        );
        let gateway = ScriptedGateway::new(&["the answer is probably 4"]);
        let orchestrator = use_case(
            vec![computation],
            Some(gateway.clone()),
            ExecutionParams::default(),
        );
        let (bus, _sink) = bus();

        let outcome = orchestrator
            .execute(OrchestrateInput::new("2+2"), &bus)
            .await
            .unwrap();

        let answer = final_of(&outcome);
        assert_eq!(gateway.calls(), 1);
        assert_eq!(
            answer.payload.chief_reasoning,
            crate::use_cases::review::PARSE_FAILED_REASON
        );
        assert_eq!(answer.payload.iterations, 1);
    }

    // ==================== Loop control ====================

    #[tokio::test]
    async fn test_max_iterations_yields_exactly_one_final() {
        let computation = ScriptedAgent::new(
            AgentKind::Computation,
            Script::Reply("Answer: 4".into(), 0.8),
        );
        let gateway = ScriptedGateway::new(&[LOOP_REPLY]);
        let orchestrator = use_case(
            vec![computation.clone()],
            Some(gateway.clone()),
            ExecutionParams::default().with_max_iterations(3),
        );
        let (bus, sink) = bus();

        let outcome = orchestrator
            .execute(OrchestrateInput::new("2+2"), &bus)
            .await
            .unwrap();

        let answer = final_of(&outcome);
        assert_eq!(answer.payload.termination, TerminationReason::MaxIterationsReached);
        assert_eq!(answer.payload.iterations, 3);
        assert!(answer.text.starts_with("**Note:** Maximum iterations (3) reached."));
        assert_eq!(gateway.calls(), 3);

        let types = sink.types();
        assert_eq!(types.iter().filter(|t| **t == "final").count(), 1);
        assert_eq!(types.iter().filter(|t| **t == "loop_continue").count(), 2);
        assert_eq!(types.iter().filter(|t| **t == "action").count(), 3);
        assert_eq!(types.last(), Some(&"final"));

        // Looped tasks start from the original message each time
        let tasks = computation.tasks.lock().unwrap();
        assert_eq!(tasks[0], "2+2");
        assert_eq!(
            tasks[2],
            "2+2\n\nRefinement guidance: Check again with more precision"
        );
    }

    #[tokio::test]
    async fn test_loop_then_final() {
        let computation = ScriptedAgent::new(
            AgentKind::Computation,
            Script::Reply("Answer: 4".into(), 0.9),
        );
        let gateway = ScriptedGateway::new(&[
            LOOP_REPLY,
            r#"{"decision": "final", "final_answer": "Answer: 4\n\nWhy: checked twice", "selected_agent": "Coding Agent", "reasoning": "consistent"}"#,
        ]);
        let notes = Arc::new(CountingNoteSink {
            saved: Mutex::new(Vec::new()),
        });
        let orchestrator = use_case(
            vec![computation],
            Some(gateway.clone()),
            ExecutionParams::default().with_next_steps(cedar_domain::NextStepsPolicy::Disabled),
        )
        .with_note_sink(notes.clone());
        let (bus, sink) = bus();

        let outcome = orchestrator
            .execute(OrchestrateInput::new("2+2"), &bus)
            .await
            .unwrap();

        let answer = final_of(&outcome);
        assert_eq!(answer.payload.iterations, 2);
        assert!(answer.text.starts_with("Answer: 4\n\nWhy: checked twice"));
        assert!(answer.text.contains("_Resolved after 2 iterations in"));
        assert_eq!(
            sink.types(),
            vec![
                "action",
                "agent_result",
                "note_saved",
                "loop_continue",
                "action",
                "agent_result",
                "note_saved",
                "final"
            ]
        );
        assert_eq!(
            notes.saved.lock().unwrap().as_slice(),
            [(0, "loop"), (1, "final")]
        );
    }

    #[tokio::test]
    async fn test_shell_action_becomes_execute_task() {
        let shell = ScriptedAgent::new(
            AgentKind::SystemSearch,
            Script::Reply("Answer: ok".into(), 0.7),
        );
        let gateway = ScriptedGateway::new(&[
            r#"{"decision": "loop", "additional_guidance": "check disk usage", "action": {"agent": "system_search", "command": "df -h"}, "reasoning": "need numbers"}"#,
            r#"{"decision": "final", "final_answer": "plenty of space", "reasoning": "df output"}"#,
        ]);
        let orchestrator = use_case(vec![shell.clone()], Some(gateway), ExecutionParams::default());
        let (bus, _sink) = bus();

        orchestrator
            .execute(OrchestrateInput::new("run `ls` in my home"), &bus)
            .await
            .unwrap();

        let tasks = shell.tasks.lock().unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[1], "Execute: `df -h`\n\nOriginal request: run `ls` in my home");
    }

    #[tokio::test]
    async fn test_panicking_agent_does_not_hide_siblings() {
        let panicking = ScriptedAgent::new(AgentKind::Computation, Script::Panic);
        let math = ScriptedAgent::new(
            AgentKind::MathDerivation,
            Script::Reply("Answer: x = (-b ± √(b²-4ac)) / 2a".into(), 0.85),
        );
        let orchestrator = use_case(vec![panicking, math], None, ExecutionParams::default());
        let (bus, _sink) = bus();

        let outcome = orchestrator
            .execute(OrchestrateInput::new("derive the quadratic formula"), &bus)
            .await
            .unwrap();

        let answer = final_of(&outcome);
        let all = &answer.payload.metadata.all_results;
        assert_eq!(all.len(), 2);
        assert!(all.iter().any(|r| r.explanation == "Agent crashed: Panic"));
        assert_eq!(answer.payload.selected_agent, "Math Agent");
    }

    #[tokio::test]
    async fn test_deadline_forces_final() {
        let slow = ScriptedAgent::new(AgentKind::Computation, Script::Sleep(Duration::from_secs(30)));
        let orchestrator = use_case(
            vec![slow],
            None,
            ExecutionParams::default().with_deadline(Duration::from_millis(50)),
        );
        let (bus, sink) = bus();

        let outcome = orchestrator
            .execute(OrchestrateInput::new("2+2"), &bus)
            .await
            .unwrap();

        let answer = final_of(&outcome);
        assert_eq!(answer.payload.termination, TerminationReason::DeadlineExceeded);
        assert!(answer.text.starts_with("**Note:** Processing time limit reached."));
        assert_eq!(sink.types(), vec!["action", "final"]);
    }

    #[tokio::test]
    async fn test_cancellation_forces_final() {
        let slow = ScriptedAgent::new(AgentKind::Computation, Script::Sleep(Duration::from_secs(30)));
        let orchestrator = use_case(vec![slow], None, ExecutionParams::default());
        let (bus, _sink) = bus();
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let outcome = orchestrator
            .execute(OrchestrateInput::new("2+2").with_cancellation(token), &bus)
            .await
            .unwrap();

        assert_eq!(
            final_of(&outcome).payload.termination,
            TerminationReason::Cancelled
        );
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected_with_error_event() {
        let orchestrator = use_case(vec![], None, ExecutionParams::default());
        let (bus, sink) = bus();

        let err = orchestrator
            .execute(OrchestrateInput::new("   "), &bus)
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestrateError::InvalidRequest(DomainError::EmptyTask)));
        assert_eq!(sink.types(), vec!["error"]);
    }

    #[tokio::test]
    async fn test_note_failure_does_not_abort() {
        let computation = ScriptedAgent::new(
            AgentKind::Computation,
            Script::Reply("Answer: 4".into(), 0.95),
        );
        let orchestrator = use_case(vec![computation], None, ExecutionParams::default())
            .with_note_sink(Arc::new(FailingNoteSink));
        let (bus, sink) = bus();

        let outcome = orchestrator
            .execute(OrchestrateInput::new("2+2"), &bus)
            .await
            .unwrap();
        assert!(outcome.is_final());
        assert!(!sink.types().contains(&"note_saved"));
    }

    #[tokio::test]
    async fn test_terminal_events_request_acks() {
        let computation = ScriptedAgent::new(
            AgentKind::Computation,
            Script::Reply("Answer: 4".into(), 0.95),
        );
        let orchestrator = use_case(vec![computation], None, ExecutionParams::default());
        let (bus, sink) = bus();

        orchestrator
            .execute(OrchestrateInput::new("2+2"), &bus)
            .await
            .unwrap();

        let envelopes = sink.envelopes.lock().unwrap();
        assert!(envelopes[0].eid.is_some());
        assert!(envelopes[1].eid.is_none());
        assert!(envelopes[2].eid.is_some());
        assert_eq!(bus.pending_acks().len(), 2);
    }

    #[tokio::test]
    async fn test_disconnected_observer_still_gets_terminal_outcome() {
        let computation = ScriptedAgent::new(
            AgentKind::Computation,
            Script::Reply("Answer: 4".into(), 0.9),
        );
        let gateway = ScriptedGateway::new(&[
            LOOP_REPLY,
            r#"{"decision": "final", "final_answer": "Answer: 4", "selected_agent": "Coding Agent", "reasoning": "consistent"}"#,
        ]);
        let orchestrator = use_case(
            vec![computation.clone()],
            Some(gateway.clone()),
            ExecutionParams::default(),
        );
        let sink = Arc::new(DisconnectedSink::default());
        let bus = EventBus::new(sink.clone(), Duration::from_secs(10));

        let outcome = orchestrator
            .execute(OrchestrateInput::new("2+2"), &bus)
            .await
            .unwrap();

        let answer = final_of(&outcome);
        assert_eq!(answer.payload.iterations, 2);
        assert!(answer.text.starts_with("Answer: 4"));
        assert_eq!(computation.tasks.lock().unwrap().len(), 2);
        assert_eq!(gateway.calls(), 2);
        // action, agent_result, loop_continue, action, agent_result, final
        assert_eq!(*sink.attempts.lock().unwrap(), 6);
    }
}
