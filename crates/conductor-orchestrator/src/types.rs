use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Run-unique todo identifier, rendered as `todo-<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct TodoId(pub u32);

impl fmt::Display for TodoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "todo-{}", self.0)
    }
}

impl From<TodoId> for String {
    fn from(id: TodoId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for TodoId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value
            .strip_prefix("todo-")
            .and_then(|n| n.parse().ok())
            .map(TodoId)
            .ok_or_else(|| format!("invalid todo id '{value}'"))
    }
}

/// Lifecycle state of a todo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    /// Waiting to be dispatched.
    Pending,
    /// Claimed by a worker.
    InProgress,
    /// Completed.
    Done,
    /// Failed; never resurrected.
    Failed,
}

impl fmt::Display for TodoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TodoStatus::Pending => write!(f, "pending"),
            TodoStatus::InProgress => write!(f, "in_progress"),
            TodoStatus::Done => write!(f, "done"),
            TodoStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A todo as emitted by the planning collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedTodo {
    /// What to do.
    pub text: String,
    /// Integration domain it belongs to.
    pub domain: String,
}

impl PlannedTodo {
    /// A todo for `domain`.
    pub fn new(text: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            domain: domain.into(),
        }
    }
}

/// One unit of work in the plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Todo {
    /// Supervisor-assigned id.
    pub id: TodoId,
    /// Instruction for the worker.
    pub text: String,
    /// Integration domain of the todo.
    pub domain: String,
    /// Current lifecycle state.
    pub status: TodoStatus,
    /// 0 for a planned todo, n for the n-th re-queue of it.
    pub retry_count: u32,
    /// The failed todo this one re-queues.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_of: Option<TodoId>,
    /// Why the todo failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// When the todo entered the plan.
    pub created_at: DateTime<Utc>,
    /// When the todo reached done or failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Todo {
    /// A pending todo with no retry history.
    pub fn new(id: TodoId, text: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            domain: domain.into(),
            status: TodoStatus::Pending,
            retry_count: 0,
            retry_of: None,
            failure_reason: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Whether the todo is pending or in progress.
    pub fn is_open(&self) -> bool {
        matches!(self.status, TodoStatus::Pending | TodoStatus::InProgress)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_todo_id_serializes_as_string() {
        let json = serde_json::to_string(&TodoId(7)).unwrap();
        assert_eq!(json, r#""todo-7""#);
        let parsed: TodoId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, TodoId(7));
        assert!(serde_json::from_str::<TodoId>(r#""task-1""#).is_err());
    }

    #[test]
    fn test_new_todo_is_pending() {
        let todo = Todo::new(TodoId(1), "Create the issue", "github");
        assert_eq!(todo.status, TodoStatus::Pending);
        assert!(todo.is_open());
        assert_eq!(todo.retry_count, 0);
    }
}
