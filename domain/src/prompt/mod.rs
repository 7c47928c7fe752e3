//! Prompt domain
//!
//! Templates for the reviewer ("Chief Agent") and for the backend-driven
//! agents. Pure text generation; sending prompts is the gateway's job.

pub mod agent;
mod template;

pub use agent::{AgentPromptTemplate, SpecialistProfile};
pub use template::PromptTemplate;
