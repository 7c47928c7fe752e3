//! Core domain concepts shared across all subdomains.
//!
//! - [`task::Task`] — a validated user request plus optional conversation context
//! - [`error::DomainError`] — domain-level errors
//! - [`string`] — UTF-8 safe truncation helpers

pub mod error;
pub mod string;
pub mod task;
