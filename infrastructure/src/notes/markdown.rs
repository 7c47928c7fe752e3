//! Markdown note sink
//!
//! Stores each iteration note as its own markdown file with a small YAML
//! front matter block (id, title, tags, iteration, final).

use async_trait::async_trait;
use cedar_application::{NoteSink, NoteSinkError};
use cedar_domain::{AgentResult, Decision, IterationNote};
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

pub struct MarkdownNoteSink {
    directory: PathBuf,
}

impl MarkdownNoteSink {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

fn render(id: &str, note: &IterationNote) -> String {
    let tags = note
        .tags
        .iter()
        .map(|t| format!("\"{}\"", t.replace('"', "'")))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "---\nid: {}\ntitle: \"{}\"\ntags: [{}]\niteration: {}\nfinal: {}\n---\n\n{}",
        id,
        note.title().replace('"', "'"),
        tags,
        note.iteration,
        note.is_final,
        note.content
    )
}

#[async_trait]
impl NoteSink for MarkdownNoteSink {
    async fn save_iteration_notes(
        &self,
        user_query: &str,
        results: &[AgentResult],
        decision: &Decision,
        iteration: usize,
    ) -> Result<Option<String>, NoteSinkError> {
        if results.is_empty() {
            return Ok(None);
        }

        let now = Utc::now();
        let note = IterationNote::compose(
            user_query,
            results,
            decision,
            iteration,
            &now.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            &now.format("%Y-%m-%d").to_string(),
        );

        let id = Uuid::new_v4().to_string();
        let filename = format!(
            "{}-iter{}-{}.md",
            now.format("%Y%m%d-%H%M%S"),
            note.iteration,
            &id[..8]
        );
        let path = self.directory.join(filename);

        tokio::fs::create_dir_all(&self.directory).await?;
        tokio::fs::write(&path, render(&id, &note)).await?;
        debug!(path = %path.display(), iteration = note.iteration, "Saved iteration note");

        Ok(Some(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cedar_domain::AgentKind;

    fn results() -> Vec<AgentResult> {
        vec![AgentResult::new(
            AgentKind::Computation,
            "Answer: 4\n\nWhy: arithmetic",
            0.95,
            "Local arithmetic evaluation",
        )]
    }

    #[tokio::test]
    async fn test_writes_one_file_per_note() {
        let dir = tempfile::tempdir().unwrap();
        let sink = MarkdownNoteSink::new(dir.path().join("notes"));
        let decision = Decision::final_answer("4", "Coding Agent", "exact");

        let first = sink
            .save_iteration_notes("calculate 2+2", &results(), &decision, 0)
            .await
            .unwrap()
            .unwrap();
        let second = sink
            .save_iteration_notes("calculate 2+2", &results(), &decision, 1)
            .await
            .unwrap()
            .unwrap();
        assert_ne!(first, second);

        let mut files: Vec<PathBuf> = std::fs::read_dir(sink.directory())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        files.sort();
        assert_eq!(files.len(), 2);

        let content = std::fs::read_to_string(&files[0]).unwrap();
        assert!(content.starts_with(&format!("---\nid: {}\n", first)));
        assert!(content.contains("\"agent:coding_agent\""));
        assert!(content.contains("final: true"));
        assert!(content.contains("### Final Answer\n4"));
    }

    #[tokio::test]
    async fn test_no_results_stores_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let sink = MarkdownNoteSink::new(dir.path());
        let decision = Decision::fallback(&[], "nothing");
        let saved = sink
            .save_iteration_notes("q", &[], &decision, 0)
            .await
            .unwrap();
        assert!(saved.is_none());
    }

    #[tokio::test]
    async fn test_unwritable_directory_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let sink = MarkdownNoteSink::new(blocker.join("notes"));
        let decision = Decision::final_answer("4", "Coding Agent", "exact");
        let err = sink
            .save_iteration_notes("q", &results(), &decision, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, NoteSinkError::Io(_)));
    }
}
