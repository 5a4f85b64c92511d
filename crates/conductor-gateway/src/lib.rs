//! Execution gateway for the Conductor engine.
//!
//! Every tool invocation made by a worker passes through the
//! [`ExecutionGateway`]: arguments are normalized and validated against the
//! tool's parameter schema, budgets are charged, the call is dispatched to the
//! [`IntegrationPlatform`] under a timeout, and the outcome is classified.
//! Transient failures are retried with exponential backoff and jitter. Every
//! attempt is appended to the run's [`ExecutionLog`].

/// The gateway itself.
pub mod gateway;
/// Integration platform trait and raw failure classification.
pub mod integration;
/// Execution records.
pub mod record;
/// Retry policy and backoff computation.
pub mod retry;

pub use gateway::ExecutionGateway;
pub use integration::{IntegrationPlatform, PlatformError};
pub use record::{AttemptOutcome, ExecutionLog, ExecutionRecord};
pub use retry::RetryPolicy;
