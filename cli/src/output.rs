//! Human-readable rendering of orchestration events

use cedar_domain::{Event, EventEnvelope};

const RULE: &str = "------------------------------------------------------------";

/// Text to print for one event, or `None` for events that stay quiet.
pub fn render(envelope: &EventEnvelope, verbose: bool) -> Option<String> {
    match &envelope.event {
        Event::Action { text, .. } => verbose.then(|| format!("{}\n{}", text, RULE)),
        Event::AgentResult {
            agent_name,
            metadata,
            summary,
            ..
        } => {
            let detail = if summary.is_empty() {
                metadata.method.as_str()
            } else {
                summary.as_str()
            };
            Some(format!(
                "[{}] {:.2} - {}",
                agent_name, metadata.confidence, detail
            ))
        }
        Event::NoteSaved { message, .. } => verbose.then(|| message.clone()),
        Event::LoopContinue { text, .. } => Some(format!("\n{}\n{}", text, RULE)),
        Event::Final { text, .. } => Some(format!("\n{}", text)),
        Event::Clarify { text, .. } => Some(format!("\n{}", text)),
        Event::Error { message } => Some(format!("Error: {}", message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cedar_domain::{AgentKind, AgentResult};

    #[test]
    fn test_agent_result_line() {
        let result = AgentResult::new(AgentKind::Computation, "Answer: 4", 0.95, "eval")
            .with_summary("Computed 2+2 = 4");
        let envelope = EventEnvelope::new(Event::agent_result(&result, 0));
        assert_eq!(
            render(&envelope, false).unwrap(),
            "[Coding Agent] 0.95 - Computed 2+2 = 4"
        );
    }

    #[test]
    fn test_announcements_only_when_verbose() {
        let envelope = EventEnvelope::new(Event::processing("thinking", 0, 10, vec![]));
        assert!(render(&envelope, false).is_none());
        assert!(render(&envelope, true).unwrap().starts_with("thinking"));
    }
}
