//! Backend-driven specialist agents
//!
//! Math, research, strategy, data and notes agents share one procedure: a
//! single completion with the profile's prompts, wrapped as an
//! `Answer:`/`Why:` result.

use super::{NO_BACKEND_DETAIL, backend_failure};
use async_trait::async_trait;
use cedar_application::{Agent, AgentError, CompletionRequest, LlmGateway};
use cedar_domain::{AgentKind, AgentResult, ConversationContext, SpecialistProfile, truncate};
use std::sync::Arc;
use tracing::info;

pub struct SpecialistAgent {
    profile: SpecialistProfile,
    gateway: Option<Arc<dyn LlmGateway>>,
}

impl SpecialistAgent {
    pub fn new(profile: SpecialistProfile, gateway: Option<Arc<dyn LlmGateway>>) -> Self {
        Self { profile, gateway }
    }
}

#[async_trait]
impl Agent for SpecialistAgent {
    fn kind(&self) -> AgentKind {
        self.profile.kind
    }

    async fn process(
        &self,
        task: &str,
        context: Option<&ConversationContext>,
    ) -> Result<AgentResult, AgentError> {
        let profile = &self.profile;
        info!(
            agent = profile.kind.agent_name(),
            task = %truncate(task, 100),
            "Specialist started"
        );

        let Some(gateway) = &self.gateway else {
            return Ok(AgentResult::configuration_error(
                profile.kind,
                task,
                NO_BACKEND_DETAIL,
            ));
        };

        let rendered = context.map(|c| c.render(task));
        let request =
            CompletionRequest::new(profile.system, profile.user_prompt(task, rendered.as_deref()))
                .with_max_tokens(profile.max_tokens)
                .with_temperature(profile.temperature);

        match gateway.complete(request).await {
            Ok(reply) => Ok(AgentResult::new(
                profile.kind,
                profile.format_result(&reply),
                profile.confidence,
                profile.method,
            )
            .with_explanation(profile.explanation)
            .with_summary(profile.summary(task))),
            Err(e) => Ok(backend_failure(profile.kind, profile.kind.display_name(), e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cedar_application::GatewayError;
    use cedar_domain::AgentPromptTemplate;
    use std::sync::Mutex;

    struct Echo {
        seen: Mutex<Option<CompletionRequest>>,
        fail: bool,
    }

    #[async_trait]
    impl LlmGateway for Echo {
        fn model(&self) -> &str {
            "echo"
        }

        async fn complete(&self, request: CompletionRequest) -> Result<String, GatewayError> {
            *self.seen.lock().unwrap() = Some(request);
            if self.fail {
                Err(GatewayError::Timeout)
            } else {
                Ok("  derived result  ".to_string())
            }
        }
    }

    fn echo(fail: bool) -> Arc<Echo> {
        Arc::new(Echo {
            seen: Mutex::new(None),
            fail,
        })
    }

    #[tokio::test]
    async fn test_profile_drives_result() {
        let gateway = echo(false);
        let agent = SpecialistAgent::new(AgentPromptTemplate::MATH, Some(gateway.clone()));
        assert_eq!(agent.kind(), AgentKind::MathDerivation);

        let result = agent.process("derive the area of a circle", None).await.unwrap();
        let profile = AgentPromptTemplate::MATH;
        assert_eq!(result.confidence, profile.confidence);
        assert_eq!(result.method, profile.method);
        assert_eq!(result.result, profile.format_result("derived result"));

        let seen = gateway.seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen.system, profile.system);
        assert_eq!(seen.max_tokens, profile.max_tokens);
        assert_eq!(seen.user, profile.user_prompt("derive the area of a circle", None));
    }

    #[tokio::test]
    async fn test_context_reaches_prompt() {
        let gateway = echo(false);
        let agent = SpecialistAgent::new(AgentPromptTemplate::RESEARCH, Some(gateway.clone()));
        let context = ConversationContext::new().for_iteration(1, vec!["Coding Agent: 4".into()]);
        agent.process("research rust", Some(&context)).await.unwrap();

        let seen = gateway.seen.lock().unwrap().clone().unwrap();
        assert!(seen.user.contains("Previous Results:\n- Coding Agent: 4"));
    }

    #[tokio::test]
    async fn test_without_backend() {
        let agent = SpecialistAgent::new(AgentPromptTemplate::STRATEGY, None);
        let result = agent.process("plan a launch", None).await.unwrap();
        assert!(result.is_configuration_error());
        assert_eq!(result.display_name, "Strategy Agent");
    }

    #[tokio::test]
    async fn test_backend_failure() {
        let agent = SpecialistAgent::new(AgentPromptTemplate::NOTES, Some(echo(true)));
        let result = agent.process("take notes", None).await.unwrap();
        assert_eq!(result.confidence, 0.1);
        assert_eq!(result.method, "Error");
        assert!(result.result.starts_with("Answer: Notes Agent failed"));
    }
}
