use crate::types::PlannedTodo;
use async_trait::async_trait;
use conductor_core::{ConductorError, ConductorResult};

/// The external collaborator that decomposes a task into todos.
#[async_trait]
pub trait Planner: Send + Sync {
    /// Return a non-empty ordered list of todos, or a planning error.
    ///
    /// `domains` lists the integrations available in the catalog.
    async fn decompose(&self, task: &str, domains: &[String]) -> ConductorResult<Vec<PlannedTodo>>;
}

/// Planner that always returns the same todos.
#[derive(Debug, Clone, Default)]
pub struct StaticPlanner {
    todos: Vec<PlannedTodo>,
}

impl StaticPlanner {
    /// Planner that always returns `todos`.
    pub fn new(todos: Vec<PlannedTodo>) -> Self {
        Self { todos }
    }
}

#[async_trait]
impl Planner for StaticPlanner {
    async fn decompose(
        &self,
        task: &str,
        _domains: &[String],
    ) -> ConductorResult<Vec<PlannedTodo>> {
        if self.todos.is_empty() {
            return Err(ConductorError::Planning(format!(
                "no todos available for task '{task}'"
            )));
        }
        Ok(self.todos.clone())
    }
}

/// Reject plans the supervisor cannot run.
pub(crate) fn check_plan(todos: &[PlannedTodo]) -> ConductorResult<()> {
    if todos.is_empty() {
        return Err(ConductorError::Planning("planner returned no todos".into()));
    }
    if let Some(pos) = todos
        .iter()
        .position(|t| t.text.trim().is_empty() || t.domain.trim().is_empty())
    {
        return Err(ConductorError::Planning(format!(
            "todo {} has an empty text or domain",
            pos + 1
        )));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use conductor_core::ErrorKind;

    #[tokio::test]
    async fn test_static_planner() {
        let planner = StaticPlanner::new(vec![PlannedTodo::new("Create issue", "github")]);
        let todos = planner.decompose("file a bug", &[]).await.unwrap();
        assert_eq!(todos.len(), 1);

        let err = StaticPlanner::default()
            .decompose("file a bug", &[])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Planning);
    }

    #[test]
    fn test_check_plan() {
        assert!(check_plan(&[]).is_err());
        assert!(check_plan(&[PlannedTodo::new("  ", "github")]).is_err());
        assert!(check_plan(&[PlannedTodo::new("x", "")]).is_err());
        assert!(check_plan(&[PlannedTodo::new("x", "github")]).is_ok());
    }
}
