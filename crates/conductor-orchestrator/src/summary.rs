use crate::plan::PlanCounts;
use crate::types::{Todo, TodoId, TodoStatus};
use conductor_agent::WorkerResult;
use conductor_core::{BudgetScope, ConductorResult, ErrorKind};
use conductor_gateway::ExecutionRecord;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;
use tracing::info;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// The plan settled: no todo is pending or in progress.
    Completed,
    /// The global tool-call budget ran out with work left.
    BudgetExceeded,
}

/// Serializable record of a run: the plan and every worker result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunTrace {
    /// The task the run was given.
    pub task: String,
    /// Final state of every todo.
    pub todos: Vec<Todo>,
    /// Worker results in the order they were settled.
    pub results: Vec<WorkerResult>,
}

impl RunTrace {
    /// Pretty JSON rendering.
    pub fn to_json(&self) -> ConductorResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the trace as pretty JSON.
    pub async fn write_to(&self, path: &Path) -> ConductorResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, self.to_json()?).await?;
        info!(path = %path.display(), "Run trace written");
        Ok(())
    }
}

/// Everything the supervisor reports at the end of a run.
#[derive(Debug, Clone, Serialize)]
pub struct FinalSummary {
    /// How the run ended.
    pub outcome: RunOutcome,
    /// Final totals by status.
    pub counts: PlanCounts,
    /// Ids of todos that reached done.
    pub completed: Vec<TodoId>,
    /// Ids of todos that failed.
    pub failed: Vec<TodoId>,
    /// Todos still pending when the run stopped.
    pub not_attempted: Vec<TodoId>,
    /// One line per todo that reached `done`.
    pub result_log: Vec<String>,
    /// Tool-call budget units consumed.
    pub tool_calls_used: u32,
    /// The run's tool-call cap.
    pub tool_call_limit: u32,
    /// Every dispatch attempt of the run.
    pub records: Vec<ExecutionRecord>,
    /// Serializable record of the run.
    pub trace: RunTrace,
}

impl FinalSummary {
    /// Whether the run stopped on the global budget.
    pub fn is_budget_exceeded(&self) -> bool {
        self.outcome == RunOutcome::BudgetExceeded
    }

    /// Human-readable report. The first line names the outcome.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let c = &self.counts;
        match self.outcome {
            RunOutcome::Completed => {
                let _ = writeln!(
                    out,
                    "Run completed: {} done, {} failed ({}/{} tool calls)",
                    c.done, c.failed, self.tool_calls_used, self.tool_call_limit
                );
            }
            RunOutcome::BudgetExceeded => {
                let _ = writeln!(
                    out,
                    "Run stopped: {}: {} tool-call budget of {} exhausted \
                     ({} done, {} failed, {} not attempted)",
                    ErrorKind::BudgetExceeded(BudgetScope::Global),
                    BudgetScope::Global,
                    self.tool_call_limit,
                    c.done,
                    c.failed,
                    self.not_attempted.len()
                );
            }
        }

        for todo in &self.trace.todos {
            let detail = match todo.status {
                TodoStatus::Done => self
                    .trace
                    .results
                    .iter()
                    .find(|r| r.todo_id == todo.id.to_string())
                    .map(|r| r.summary.clone())
                    .unwrap_or_default(),
                TodoStatus::Failed => todo.failure_reason.clone().unwrap_or_default(),
                TodoStatus::Pending => "not attempted".to_string(),
                TodoStatus::InProgress => "interrupted".to_string(),
            };
            let first_line = todo.text.lines().next().unwrap_or_default();
            let _ = writeln!(
                out,
                "- [{}] {} ({}): {first_line} => {detail}",
                todo.status, todo.id, todo.domain
            );
        }
        out
    }
}
