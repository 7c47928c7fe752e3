//! Reasoning backend adapters

mod openai;

pub use openai::OpenAiGateway;
