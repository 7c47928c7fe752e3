//! Task classification ("Thinker")
//!
//! Picks the minimal subset of agents for a message using keyword and pattern
//! heuristics. Pure and deterministic: the same message always yields the same
//! [`Classification`].

pub mod classification;
pub mod classifier;

pub use classification::{Classification, Complexity, TaskType};
pub use classifier::TaskClassifier;
