//! Suggested-next-steps policy applied to final answers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const NEXT_STEPS_MARKER: &str = "Suggested Next Steps:";

/// Generic suggestion appended by [`NextStepsPolicy::Generic`]
pub const GENERIC_NEXT_STEPS: &str =
    "Review the results and let me know if you need further clarification.";

/// How the orchestrator adds a "Suggested Next Steps" section to final answers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextStepsPolicy {
    /// Never add one
    Disabled,
    /// Add a fixed generic suggestion
    #[default]
    Generic,
    /// Pick a suggestion from the answer's content
    Contextual,
}

impl NextStepsPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            NextStepsPolicy::Disabled => "disabled",
            NextStepsPolicy::Generic => "generic",
            NextStepsPolicy::Contextual => "contextual",
        }
    }

    /// Suggestion for `answer`, or `None` when the policy adds nothing.
    pub fn suggestion(&self, answer: &str) -> Option<&'static str> {
        match self {
            NextStepsPolicy::Disabled => None,
            NextStepsPolicy::Generic => Some(GENERIC_NEXT_STEPS),
            NextStepsPolicy::Contextual => {
                let lower = answer.to_lowercase();
                Some(if lower.contains("error") || lower.contains("failed") {
                    "Review the error details and try a different approach or provide more specific information."
                } else if lower.contains("code") || lower.contains("function") {
                    "Test the provided code, modify it for your specific use case, or ask for additional features."
                } else if lower.contains("file") || lower.contains("download") {
                    "Check the downloaded files, analyze their contents, or process them further as needed."
                } else {
                    "Let me know if you need clarification, want to explore this topic further, or have related questions."
                })
            }
        }
    }

    /// True when `text` already carries a next-steps section.
    pub fn has_next_steps(text: &str) -> bool {
        text.contains(NEXT_STEPS_MARKER)
    }
}

impl fmt::Display for NextStepsPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for NextStepsPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "disabled" | "off" | "none" => Ok(NextStepsPolicy::Disabled),
            "generic" => Ok(NextStepsPolicy::Generic),
            "contextual" => Ok(NextStepsPolicy::Contextual),
            other => Err(format!(
                "Invalid next steps policy: '{}'. Valid options: disabled, generic, contextual",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policies() {
        assert_eq!(NextStepsPolicy::Disabled.suggestion("anything"), None);
        assert_eq!(
            NextStepsPolicy::Generic.suggestion("4"),
            Some(GENERIC_NEXT_STEPS)
        );
        assert!(
            NextStepsPolicy::Contextual
                .suggestion("The command failed")
                .unwrap()
                .starts_with("Review the error")
        );
        assert!(
            NextStepsPolicy::Contextual
                .suggestion("Downloaded 2 files")
                .unwrap()
                .starts_with("Check the downloaded files")
        );
    }

    #[test]
    fn test_parse() {
        assert_eq!("Contextual".parse::<NextStepsPolicy>(), Ok(NextStepsPolicy::Contextual));
        assert_eq!("off".parse::<NextStepsPolicy>(), Ok(NextStepsPolicy::Disabled));
        assert!("sometimes".parse::<NextStepsPolicy>().is_err());
    }
}
