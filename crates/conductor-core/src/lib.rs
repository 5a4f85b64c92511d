//! Core types and error definitions for the Conductor orchestration engine.
//!
//! This crate provides the foundational types shared across all Conductor
//! crates: the error taxonomy every component reports through, and the tool
//! call shape that workers hand to the execution gateway.
//!
//! # Main types
//!
//! - [`ConductorError`]: Unified error enum covering every failure category.
//! - [`ConductorResult`]: Convenience alias for `Result<T, ConductorError>`.
//! - [`ErrorKind`]: Serializable classification of an error, safe to carry
//!   across worker/supervisor boundaries.
//! - [`BudgetScope`]: Which budget (global or per-worker) was exhausted.
//! - [`ToolCall`]: A request to invoke one tool with JSON arguments.

/// Error taxonomy.
pub mod error;
/// Tool call request type.
pub mod tool;

pub use error::{BudgetScope, ConductorError, ConductorResult, ErrorKind};
pub use tool::ToolCall;
