//! Security boundary of the Conductor engine.
//!
//! Credentials are resolved outside the decision loop: workers receive an
//! opaque [`CredentialHandle`] and never see secret material. Tool-call
//! budgets are enforced here as lock-free counters shared by the gateway.
//!
//! # Main types
//!
//! - [`CredentialResolver`]: Maps `(user_id, domain)` to a handle, with a per-run cache.
//! - [`CredentialBackend`]: Storage-side lookup collaborator.
//! - [`Budget`]: The run-wide tool-call budget.
//! - [`WorkerBudget`]: One worker's tool-call budget, charged together with the global one.

/// Tool-call budgets.
pub mod budget;
/// Credential resolution.
pub mod credentials;

pub use budget::{Budget, WorkerBudget};
pub use credentials::{
    CredentialBackend, CredentialBinding, CredentialHandle, CredentialResolver,
    StaticCredentialBackend,
};
