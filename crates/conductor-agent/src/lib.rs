//! Worker executor for the Conductor engine.
//!
//! A worker is created per dispatched todo. It runs a bounded loop in which
//! an external [`DecisionMaker`] picks the next [`Action`] (search the tool
//! index, invoke a tool, store an artifact, complete, abort) and the worker
//! carries it out. The worker's trace stays private: only the
//! [`WorkerResult`] leaves the worker.

/// Run-level context handed to every worker.
pub mod context;
/// Decision collaborator trait and actions.
pub mod decision;
/// Private step trace of a worker.
pub mod trace;
/// The worker executor.
pub mod worker;

pub use context::{DecisionContext, RunContext};
pub use decision::{Action, DeciderFactory, DecisionMaker};
pub use trace::{Observation, TraceEntry};
pub use worker::{WorkerError, WorkerExecutor, WorkerRequest, WorkerResult, WorkerStatus};
