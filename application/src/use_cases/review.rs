//! Review use case
//!
//! The reviewer ("Chief Agent") reads one iteration's results and decides
//! whether to answer, loop, or ask the user. Every failure path (no backend,
//! a backend error or timeout, an unparseable reply) degrades to the
//! deterministic fallback, so `review` never errors and never retries.

use crate::ports::llm_gateway::{CompletionRequest, LlmGateway};
use cedar_domain::{
    AgentResult, Decision, IterationContext, PromptTemplate, parse_decision_response, truncate,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const REVIEWER_TEMPERATURE: f32 = 0.3;

/// Fallback reason when no backend is configured
pub const NO_BACKEND_REASON: &str = "No LLM available - using best available result";
/// Fallback reason when the reply is not a usable decision
pub const PARSE_FAILED_REASON: &str = "JSON parsing failed - using best available result";

pub struct ReviewerController {
    gateway: Option<Arc<dyn LlmGateway>>,
    timeout: Duration,
    max_tokens: u32,
}

impl ReviewerController {
    pub fn new(gateway: Option<Arc<dyn LlmGateway>>) -> Self {
        Self {
            gateway,
            timeout: Duration::from_secs(60),
            max_tokens: 800,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Decide on this iteration's results.
    pub async fn review(&self, iteration: &IterationContext, results: &[AgentResult]) -> Decision {
        let Some(gateway) = &self.gateway else {
            info!("No reviewer backend, using best available result");
            return Decision::fallback(results, NO_BACKEND_REASON);
        };

        let previous = iteration.previous_context();
        let request = CompletionRequest::new(
            PromptTemplate::reviewer_system(
                iteration.iteration_index(),
                iteration.max_iterations(),
                iteration.remaining_loops(),
            ),
            PromptTemplate::reviewer_user(
                iteration.original_message(),
                iteration.iteration_index(),
                iteration.max_iterations(),
                iteration.remaining_loops(),
                previous.as_deref(),
                results,
            ),
        )
        .with_max_tokens(self.max_tokens)
        .with_temperature(REVIEWER_TEMPERATURE);

        debug!(model = gateway.model(), "Requesting reviewer decision");

        let reply = match tokio::time::timeout(self.timeout, gateway.complete(request)).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                warn!("Reviewer backend failed: {}", e);
                return Decision::fallback(results, chief_error(&e.to_string()));
            }
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "Reviewer timed out");
                return Decision::fallback(
                    results,
                    chief_error(&format!("timed out after {}s", self.timeout.as_secs())),
                );
            }
        };

        match parse_decision_response(&reply) {
            Ok(decision) => {
                info!(
                    decision = decision.kind(),
                    selected = %decision.selected_agent,
                    "Reviewer decided"
                );
                decision
            }
            Err(e) => {
                warn!("Reviewer reply unusable: {}", e);
                debug!("Reviewer reply: {}", truncate(&reply, 500));
                Decision::fallback(results, PARSE_FAILED_REASON)
            }
        }
    }
}

fn chief_error(detail: &str) -> String {
    format!("Chief Agent error: {}", truncate(detail, 100))
}
