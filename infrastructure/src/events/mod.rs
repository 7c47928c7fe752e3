//! Event transports

mod channel;
mod jsonl;

pub use channel::ChannelEventSink;
pub use jsonl::JsonlEventSink;
