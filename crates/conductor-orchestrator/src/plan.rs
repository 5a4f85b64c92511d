use crate::types::{PlannedTodo, Todo, TodoId, TodoStatus};
use chrono::Utc;
use conductor_core::{ConductorError, ConductorResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

/// Todo totals by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanCounts {
    /// Todos not yet claimed.
    pub pending: usize,
    /// Todos a worker is running.
    pub in_progress: usize,
    /// Todos that completed.
    pub done: usize,
    /// Todos that failed.
    pub failed: usize,
    /// Every todo that ever entered the plan, re-queues included.
    pub total: usize,
}

/// Ordered todo list owned by the supervisor.
///
/// Status transitions are `pending -> in_progress -> {done, failed}` only.
/// A failed todo is never resurrected; [`Plan::requeue`] appends a new one.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    todos: Vec<Todo>,
    next_id: u32,
}

impl Plan {
    /// An empty plan.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a plan grouped by domain. Domains keep the order in which they
    /// first appear; todos keep their order within a domain.
    pub fn from_planned(planned: Vec<PlannedTodo>) -> Self {
        let mut domains: Vec<String> = Vec::new();
        for todo in &planned {
            if !domains.contains(&todo.domain) {
                domains.push(todo.domain.clone());
            }
        }

        let mut plan = Self::new();
        for domain in &domains {
            for todo in planned.iter().filter(|t| &t.domain == domain) {
                plan.enqueue(todo.text.clone(), todo.domain.clone());
            }
        }
        plan
    }

    /// Append a pending todo.
    pub fn enqueue(&mut self, text: impl Into<String>, domain: impl Into<String>) -> TodoId {
        let id = self.allocate_id();
        let todo = Todo::new(id, text, domain);
        debug!(todo_id = %id, domain = %todo.domain, "Todo enqueued");
        self.todos.push(todo);
        id
    }

    fn allocate_id(&mut self) -> TodoId {
        self.next_id += 1;
        TodoId(self.next_id)
    }

    /// The todo with `id`.
    pub fn get(&self, id: TodoId) -> Option<&Todo> {
        self.todos.iter().find(|t| t.id == id)
    }

    fn get_mut(&mut self, id: TodoId) -> ConductorResult<&mut Todo> {
        self.todos
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| ConductorError::Orchestrator(format!("unknown todo {id}")))
    }

    fn transition(
        &mut self,
        id: TodoId,
        from: TodoStatus,
        to: TodoStatus,
    ) -> ConductorResult<&mut Todo> {
        let todo = self.get_mut(id)?;
        if todo.status != from {
            return Err(ConductorError::Orchestrator(format!(
                "illegal transition for {id}: {} -> {to}",
                todo.status
            )));
        }
        todo.status = to;
        Ok(todo)
    }

    /// First pending todo whose domain is not in `busy`.
    pub fn next_pending(&self, busy: &HashSet<String>) -> Option<TodoId> {
        self.todos
            .iter()
            .find(|t| t.status == TodoStatus::Pending && !busy.contains(&t.domain))
            .map(|t| t.id)
    }

    /// Claim a pending todo for exactly one worker.
    pub fn claim(&mut self, id: TodoId) -> ConductorResult<&Todo> {
        let todo = self.transition(id, TodoStatus::Pending, TodoStatus::InProgress)?;
        debug!(todo_id = %id, "Todo claimed");
        Ok(todo)
    }

    /// Move an in-progress todo to done.
    pub fn complete(&mut self, id: TodoId) -> ConductorResult<()> {
        let todo = self.transition(id, TodoStatus::InProgress, TodoStatus::Done)?;
        todo.finished_at = Some(Utc::now());
        info!(todo_id = %id, "Todo done");
        Ok(())
    }

    /// Move an in-progress todo to failed with `reason`.
    pub fn fail(&mut self, id: TodoId, reason: impl Into<String>) -> ConductorResult<()> {
        let todo = self.transition(id, TodoStatus::InProgress, TodoStatus::Failed)?;
        todo.finished_at = Some(Utc::now());
        todo.failure_reason = Some(reason.into());
        info!(
            todo_id = %id,
            reason = todo.failure_reason.as_deref().unwrap_or_default(),
            "Todo failed"
        );
        Ok(())
    }

    /// Re-queue a failed todo as a new pending one, placed right after the
    /// last todo of its domain. The failure reason is appended to the text.
    pub fn requeue(&mut self, failed: TodoId) -> ConductorResult<TodoId> {
        let original = self
            .get(failed)
            .ok_or_else(|| ConductorError::Orchestrator(format!("unknown todo {failed}")))?;
        if original.status != TodoStatus::Failed {
            return Err(ConductorError::Orchestrator(format!(
                "only failed todos can be re-queued, {failed} is {}",
                original.status
            )));
        }

        let reason = original.failure_reason.clone().unwrap_or_default();
        let text = format!("{}\n\nPrevious attempt failed: {reason}", original.text);
        let domain = original.domain.clone();
        let retry_count = original.retry_count + 1;

        let id = self.allocate_id();
        let mut todo = Todo::new(id, text, domain);
        todo.retry_count = retry_count;
        todo.retry_of = Some(failed);

        let position = self
            .todos
            .iter()
            .rposition(|t| t.domain == todo.domain)
            .map_or(self.todos.len(), |p| p + 1);
        info!(todo_id = %id, retry_of = %failed, retry_count, "Todo re-queued");
        self.todos.insert(position, todo);
        Ok(id)
    }

    /// Every todo, in plan order.
    pub fn todos(&self) -> &[Todo] {
        &self.todos
    }

    /// Number of todos, re-queues included.
    pub fn len(&self) -> usize {
        self.todos.len()
    }

    /// Whether the plan has no todos.
    pub fn is_empty(&self) -> bool {
        self.todos.is_empty()
    }

    /// Whether any todo is still pending or in progress.
    pub fn has_open(&self) -> bool {
        self.todos.iter().any(Todo::is_open)
    }

    /// Ids of todos currently in `status`, in plan order.
    pub fn ids_with_status(&self, status: TodoStatus) -> Vec<TodoId> {
        self.todos
            .iter()
            .filter(|t| t.status == status)
            .map(|t| t.id)
            .collect()
    }

    /// Totals by status.
    pub fn counts(&self) -> PlanCounts {
        let mut counts = PlanCounts {
            total: self.todos.len(),
            ..PlanCounts::default()
        };
        for todo in &self.todos {
            match todo.status {
                TodoStatus::Pending => counts.pending += 1,
                TodoStatus::InProgress => counts.in_progress += 1,
                TodoStatus::Done => counts.done += 1,
                TodoStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }
}
