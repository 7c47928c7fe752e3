//! Application-level configuration.
//!
//! - [`ExecutionParams`] — orchestration loop control (iterations, timeouts, deadline)

pub mod execution_params;

pub use execution_params::ExecutionParams;
