//! Supervisor for the Conductor orchestration engine.
//!
//! The [`Supervisor`] asks a [`Planner`] to decompose a task into todos,
//! dispatches each todo to an isolated worker, folds the worker results back
//! into the [`Plan`], re-queues failed todos a bounded number of times, and
//! stops when the plan is settled or the run-wide tool-call budget is spent.
//! Every run ends in a [`FinalSummary`] that accounts for every todo.

/// Run configuration.
pub mod config;
/// The supervisor loop.
pub mod engine;
/// The todo plan and its state machine.
pub mod plan;
/// Planning collaborator trait.
pub mod planner;
/// Final summary and run trace.
pub mod summary;
/// Todo types.
pub mod types;

pub use config::RunConfig;
pub use engine::Supervisor;
pub use plan::{Plan, PlanCounts};
pub use planner::{Planner, StaticPlanner};
pub use summary::{FinalSummary, RunOutcome, RunTrace};
pub use types::{PlannedTodo, Todo, TodoId, TodoStatus};
