//! Note persistence adapters

mod markdown;

pub use markdown::MarkdownNoteSink;
