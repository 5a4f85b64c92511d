use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A request to invoke a catalog tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier of this call, shared by all of its attempts.
    pub id: String,
    /// Catalog id of the tool to invoke.
    pub tool_id: String,
    /// JSON arguments, validated against the tool's parameter schema.
    pub arguments: serde_json::Value,
}

impl ToolCall {
    /// Creates a call with a fresh id.
    pub fn new(tool_id: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tool_id: tool_id.into(),
            arguments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_call_ids_are_unique() {
        let a = ToolCall::new("create_issue", serde_json::json!({}));
        let b = ToolCall::new("create_issue", serde_json::json!({}));
        assert_ne!(a.id, b.id);
        assert_eq!(a.tool_id, "create_issue");
    }
}
