use crate::context::DecisionContext;
use crate::worker::WorkerRequest;
use async_trait::async_trait;
use conductor_core::ConductorResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// The next step a worker should take.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Ask the discovery index for tools. `domain` overrides the default filter.
    Search {
        /// Free-text description of the capability needed.
        query: String,
        /// Domain to restrict hubs and spokes to.
        #[serde(default)]
        domain: Option<String>,
        /// Result count; the discovery default when absent.
        #[serde(default)]
        k: Option<usize>,
    },
    /// Call a tool through the execution gateway.
    Invoke {
        /// Catalog id of the tool.
        tool_id: String,
        /// Raw arguments, normalized before validation.
        arguments: Value,
    },
    /// Put an artifact into the shared store. An empty key or `"auto"` generates one.
    Store {
        /// Requested store key.
        key: String,
        /// Artifact value.
        value: Value,
    },
    /// The todo is done.
    Complete {
        /// One-line account of what was achieved.
        summary: String,
        /// Store keys the worker wants reported back.
        #[serde(default)]
        artifacts: Vec<String>,
    },
    /// Give up on the todo.
    Abort {
        /// Why the worker stopped.
        reason: String,
    },
}

/// The external collaborator that chooses a worker's actions.
///
/// One instance is created per worker and dropped with it.
#[async_trait]
pub trait DecisionMaker: Send {
    /// Choose the next action for the worker described by `ctx`.
    async fn decide(&mut self, ctx: &DecisionContext<'_>) -> ConductorResult<Action>;
}

/// Creates the decision maker for a worker.
pub type DeciderFactory = Arc<dyn Fn(&WorkerRequest) -> Box<dyn DecisionMaker> + Send + Sync>;
