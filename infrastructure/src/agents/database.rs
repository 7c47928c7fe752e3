//! SQL agent
//!
//! Turns a database request into SQL via the reasoning backend. The SQL is
//! returned for review, never executed.

use super::{NO_BACKEND_DETAIL, backend_failure};
use async_trait::async_trait;
use cedar_application::{Agent, AgentError, CompletionRequest, LlmGateway};
use cedar_domain::{AgentKind, AgentResult, ConversationContext, PromptTemplate, truncate};
use std::sync::Arc;
use tracing::{debug, info};

const MAX_TOKENS: u32 = 300;
const TEMPERATURE: f32 = 0.1;

const DATABASE_WORDS: [&str; 11] = [
    "sql", "database", "table", "select", "query", "create", "insert", "update", "delete",
    "alter", "index",
];

pub struct DatabaseAgent {
    gateway: Option<Arc<dyn LlmGateway>>,
}

impl DatabaseAgent {
    pub fn new(gateway: Option<Arc<dyn LlmGateway>>) -> Self {
        Self { gateway }
    }
}

fn is_database_task(task: &str) -> bool {
    let lower = task.to_lowercase();
    DATABASE_WORDS.iter().any(|word| lower.contains(word))
}

/// Strip a surrounding markdown code fence, if any.
fn strip_fence(sql: &str) -> &str {
    let sql = sql.trim();
    let Some(rest) = sql.strip_prefix("```") else {
        return sql;
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Label for the kind of statement generated
fn operation_type(sql: &str) -> &'static str {
    let upper = sql.to_uppercase();
    const OPERATIONS: [(&str, &str); 8] = [
        ("CREATE DATABASE", "Database Creation"),
        ("CREATE TABLE", "Table Creation"),
        ("INSERT", "Data Insertion"),
        ("UPDATE", "Data Update"),
        ("DELETE", "Data Deletion"),
        ("ALTER TABLE", "Schema Modification"),
        ("CREATE INDEX", "Index Creation"),
        ("SELECT", "Data Query"),
    ];
    OPERATIONS
        .iter()
        .find(|(keyword, _)| upper.contains(keyword))
        .map_or("SQL Operation", |(_, label)| *label)
}

#[async_trait]
impl Agent for DatabaseAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Database
    }

    async fn process(
        &self,
        task: &str,
        _context: Option<&ConversationContext>,
    ) -> Result<AgentResult, AgentError> {
        info!(task = %truncate(task, 100), "SQL agent started");

        let Some(gateway) = &self.gateway else {
            return Ok(AgentResult::configuration_error(
                AgentKind::Database,
                task,
                NO_BACKEND_DETAIL,
            ));
        };

        if !is_database_task(task) {
            return Ok(AgentResult::inapplicable(
                AgentKind::Database,
                "Not a database query task",
            )
            .with_explanation("This doesn't appear to be a database-related task."));
        }

        let request = CompletionRequest::new(PromptTemplate::sql_system(), task)
            .with_max_tokens(MAX_TOKENS)
            .with_temperature(TEMPERATURE);
        let reply = match gateway.complete(request).await {
            Ok(reply) => reply,
            Err(e) => return Ok(backend_failure(AgentKind::Database, "SQL generation", e)),
        };

        let sql = strip_fence(&reply);
        let operation = operation_type(sql);
        debug!(operation, "Generated SQL");

        let confidence = if sql.to_uppercase().contains("CREATE") {
            0.9
        } else {
            0.85
        };
        let text = format!(
            "**SQL Generated:**\n```sql\n{}\n```\n\nAnswer: Generated {} SQL for your request\n\n\
             Why: Translated your request into executable SQL statements\n\n\
             Suggested Next Steps:\n- Review the SQL for correctness\n\
             - Execute in your database environment\n\
             - For CREATE operations, ensure database permissions\n\
             - For data modifications, consider using transactions",
            sql, operation
        );

        Ok(AgentResult::new(
            AgentKind::Database,
            text,
            confidence,
            format!("LLM-generated {}", operation),
        )
        .with_explanation(format!("Generated {} SQL", operation))
        .with_summary(format!("Generated {} SQL for {}", operation, truncate(task, 50))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cedar_application::GatewayError;

    struct Fixed(&'static str);

    #[async_trait]
    impl LlmGateway for Fixed {
        fn model(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, request: CompletionRequest) -> Result<String, GatewayError> {
            assert_eq!(request.max_tokens, 300);
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn test_strip_fence() {
        assert_eq!(strip_fence("```sql\nSELECT 1;\n```"), "SELECT 1;");
        assert_eq!(strip_fence("SELECT 1;"), "SELECT 1;");
        assert_eq!(strip_fence("```\nSELECT 1;"), "SELECT 1;");
    }

    #[test]
    fn test_operation_type_order() {
        assert_eq!(operation_type("CREATE TABLE users (id INT)"), "Table Creation");
        assert_eq!(operation_type("create index idx on t(a)"), "Index Creation");
        assert_eq!(operation_type("SELECT * FROM t"), "Data Query");
        assert_eq!(operation_type("VACUUM"), "SQL Operation");
    }

    #[tokio::test]
    async fn test_no_backend_is_configuration_error() {
        let agent = DatabaseAgent::new(None);
        let result = agent.process("create a users table", None).await.unwrap();
        assert!(result.is_configuration_error());
        assert_eq!(result.agent_name, "SQLAgent");
    }

    #[tokio::test]
    async fn test_non_database_task_is_mismatch() {
        let agent = DatabaseAgent::new(Some(Arc::new(Fixed("unused"))));
        let result = agent.process("what's the weather like", None).await.unwrap();
        assert_eq!(result.confidence, 0.1);
        assert_eq!(result.method, "Task mismatch");
    }

    #[tokio::test]
    async fn test_create_table_confidence() {
        let agent = DatabaseAgent::new(Some(Arc::new(Fixed(
            "```sql\nCREATE TABLE users (id INTEGER PRIMARY KEY);\n```",
        ))));
        let result = agent.process("create a users table", None).await.unwrap();
        assert_eq!(result.confidence, 0.9);
        assert_eq!(result.method, "LLM-generated Table Creation");
        assert!(result.result.contains("```sql\nCREATE TABLE users"));
        assert_eq!(result.key_finding(100), "Generated Table Creation SQL for your request");
    }

    #[tokio::test]
    async fn test_query_confidence() {
        let agent = DatabaseAgent::new(Some(Arc::new(Fixed("SELECT name FROM users;"))));
        let result = agent.process("query all user names", None).await.unwrap();
        assert_eq!(result.confidence, 0.85);
    }
}
