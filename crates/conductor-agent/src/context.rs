use crate::trace::{Observation, TraceEntry};
use conductor_memory::StoreSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifiers known for the whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunContext {
    /// User on whose behalf credentials are resolved.
    pub user_id: String,
    /// Ids the caller already knows (workspace, project, repository, ...),
    /// so workers need not rediscover them.
    #[serde(default)]
    pub resource_hints: BTreeMap<String, String>,
}

impl RunContext {
    /// Context for `user_id` with no hints.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            resource_hints: BTreeMap::new(),
        }
    }

    /// Add a resource hint.
    pub fn with_hint(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.resource_hints.insert(name.into(), value.into());
        self
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new("default")
    }
}

/// Everything a decision maker may look at when choosing the next action.
#[derive(Debug, Clone, Copy)]
pub struct DecisionContext<'a> {
    /// The todo's instruction text.
    pub instruction: &'a str,
    /// Domain tag of the todo being worked on.
    pub domain: &'a str,
    /// Run-wide context.
    pub run: &'a RunContext,
    /// Read-only copy of the shared store taken when the worker was spawned.
    pub snapshot: &'a StoreSnapshot,
    /// 1-based loop iteration.
    pub iteration: u32,
    /// Tool-call budget this worker has left.
    pub remaining_calls: u32,
    /// Steps taken so far by this worker.
    pub trace: &'a [TraceEntry],
}

impl<'a> DecisionContext<'a> {
    /// Result of the previous step, if any.
    pub fn last_observation(&self) -> Option<&'a Observation> {
        self.trace.last().map(|entry| &entry.observation)
    }
}
