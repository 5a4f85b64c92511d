use crate::decision::Action;
use conductor_core::ErrorKind;
use conductor_tools::ToolMatch;
use serde::Serialize;
use serde_json::Value;

/// What a worker saw after carrying out an action.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "observation", rename_all = "snake_case")]
pub enum Observation {
    /// Discovery results, best first.
    Tools {
        /// Ranked matches.
        matches: Vec<ToolMatch>,
    },
    /// A tool call succeeded.
    ToolResult {
        /// The tool that was called.
        tool_id: String,
        /// What the platform returned.
        value: Value,
    },
    /// An artifact landed in the shared store.
    Stored {
        /// The key actually used.
        key: String,
    },
    /// A recoverable failure; the worker keeps going.
    Error {
        /// Taxonomy kind of the failure.
        kind: ErrorKind,
        /// Rendered error.
        message: String,
    },
}

/// One step of a worker's loop.
#[derive(Debug, Clone, Serialize)]
pub struct TraceEntry {
    /// 1-based loop iteration.
    pub iteration: u32,
    /// What the decision maker chose.
    pub action: Action,
    /// What came back.
    pub observation: Observation,
}
