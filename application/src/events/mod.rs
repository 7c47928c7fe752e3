//! Event streaming
//!
//! [`EventBus`] delivers orchestration events to an
//! [`EventSink`](crate::ports::event_sink::EventSink) in order, and tracks
//! acknowledgments for the events that request them in an [`AckRegistry`].

pub mod ack;
pub mod bus;

pub use ack::{AckInfo, AckRegistry, PendingAck};
pub use bus::EventBus;
