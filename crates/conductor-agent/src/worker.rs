use crate::context::{DecisionContext, RunContext};
use crate::decision::{Action, DeciderFactory};
use crate::trace::{Observation, TraceEntry};
use conductor_core::{BudgetScope, ConductorError, ConductorResult, ErrorKind, ToolCall};
use conductor_gateway::ExecutionGateway;
use conductor_memory::{SharedStore, StoreSnapshot};
use conductor_security::{Budget, CredentialResolver, WorkerBudget};
use conductor_tools::DiscoveryIndex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Input for one worker: a single todo.
#[derive(Debug, Clone)]
pub struct WorkerRequest {
    /// Id of the todo, as rendered by the supervisor.
    pub todo_id: String,
    /// What the worker must do.
    pub instruction: String,
    /// Domain tag of the todo.
    pub domain: String,
    /// Shared store contents when the worker was spawned.
    pub snapshot: StoreSnapshot,
}

/// How a worker's todo ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    /// The todo is done.
    Success,
    /// A limit stopped the loop before the todo completed.
    Partial,
    /// Nothing useful happened.
    Failed,
}

/// Why a worker did not succeed, without the error value itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerError {
    /// Taxonomy kind of the failure.
    pub kind: ErrorKind,
    /// Rendered error.
    pub message: String,
}

impl From<&ConductorError> for WorkerError {
    fn from(err: &ConductorError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// The only thing a worker hands back to the supervisor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerResult {
    /// Todo this result belongs to.
    pub todo_id: String,
    /// How the todo ended.
    pub status: WorkerStatus,
    /// What the worker did, in one line.
    pub summary: String,
    /// Shared store keys of artifacts produced or referenced by the worker.
    pub artifacts: Vec<String>,
    /// Tool-call budget units this worker consumed.
    pub consumed_budget: u32,
    /// Why the worker did not succeed, if it did not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<WorkerError>,
}

impl WorkerResult {
    /// True when the global budget cut this worker off.
    pub fn hit_global_budget(&self) -> bool {
        matches!(
            self.error,
            Some(WorkerError {
                kind: ErrorKind::BudgetExceeded(BudgetScope::Global),
                ..
            })
        )
    }
}

/// Runs isolated, bounded decide-act loops, one per todo.
pub struct WorkerExecutor {
    index: Arc<DiscoveryIndex>,
    gateway: Arc<ExecutionGateway>,
    credentials: Arc<CredentialResolver>,
    store: Arc<SharedStore>,
    global_budget: Arc<Budget>,
    factory: DeciderFactory,
    context: RunContext,
    max_tool_calls: u32,
    default_domain: Option<String>,
}

impl WorkerExecutor {
    /// Executor sharing the run's index, gateway, credentials, store and budget.
    pub fn new(
        index: Arc<DiscoveryIndex>,
        gateway: Arc<ExecutionGateway>,
        credentials: Arc<CredentialResolver>,
        store: Arc<SharedStore>,
        global_budget: Arc<Budget>,
        factory: DeciderFactory,
    ) -> Self {
        Self {
            index,
            gateway,
            credentials,
            store,
            global_budget,
            factory,
            context: RunContext::default(),
            max_tool_calls: 10,
            default_domain: None,
        }
    }

    /// Run context handed to every decision maker.
    pub fn with_context(mut self, context: RunContext) -> Self {
        self.context = context;
        self
    }

    /// Cap on both loop iterations and tool-call budget per worker.
    pub fn with_max_tool_calls(mut self, max_tool_calls: u32) -> Self {
        self.max_tool_calls = max_tool_calls;
        self
    }

    /// Discovery filter used when the decision names no known domain.
    pub fn with_default_domain(mut self, domain: Option<String>) -> Self {
        self.default_domain = domain;
        self
    }

    /// Run context given to decision makers.
    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// Run one todo to a result. Never returns an error: every failure is
    /// folded into the result's status and error kind.
    pub async fn execute(&self, request: WorkerRequest) -> WorkerResult {
        let budget = WorkerBudget::new(self.global_budget.clone(), self.max_tool_calls);
        let mut decider = (self.factory)(&request);
        let mut run = WorkerRun {
            request: &request,
            budget: &budget,
            trace: Vec::new(),
            artifacts: Vec::new(),
        };

        info!(
            todo_id = %request.todo_id,
            worker_id = %budget.worker_id(),
            domain = %request.domain,
            "Worker started"
        );

        for iteration in 1..=self.max_tool_calls {
            let ctx = DecisionContext {
                instruction: &request.instruction,
                domain: &request.domain,
                run: &self.context,
                snapshot: &request.snapshot,
                iteration,
                remaining_calls: budget.remaining(),
                trace: &run.trace,
            };
            let action = match decider.decide(&ctx).await {
                Ok(action) => action,
                Err(err) => return run.fail(&err),
            };
            debug!(todo_id = %request.todo_id, iteration, ?action, "Worker step");

            let observation = match &action {
                Action::Search { query, domain, k } => {
                    let filter = self.discovery_filter(domain.as_deref(), &request.domain);
                    let k = k.unwrap_or(self.index.config().top_k);
                    match self.index.query(query, filter, k).await {
                        Ok(matches) => Observation::Tools { matches },
                        Err(err) if err.kind() == ErrorKind::ToolDiscovery => Observation::Error {
                            kind: err.kind(),
                            message: err.to_string(),
                        },
                        Err(err) => return run.fail(&err),
                    }
                }
                Action::Invoke { tool_id, arguments } => {
                    match self.invoke(&budget, tool_id, arguments.clone()).await {
                        Ok(value) => Observation::ToolResult {
                            tool_id: tool_id.clone(),
                            value,
                        },
                        Err(err) => return run.stop(&err),
                    }
                }
                Action::Store { key, value } => {
                    let key = self.store.put(key, value.clone()).await;
                    run.artifacts.push(key.clone());
                    Observation::Stored { key }
                }
                Action::Complete { summary, artifacts } => {
                    run.artifacts.extend(artifacts.iter().cloned());
                    return run.finish(WorkerStatus::Success, summary.clone(), None);
                }
                Action::Abort { reason } => {
                    return run.fail(&ConductorError::Agent(reason.clone()));
                }
            };

            run.trace.push(TraceEntry {
                iteration,
                action,
                observation,
            });
        }

        let summary = format!(
            "Stopped after {} steps without completing. {}",
            self.max_tool_calls,
            run.progress()
        );
        run.finish(WorkerStatus::Partial, summary, None)
    }

    async fn invoke(
        &self,
        budget: &WorkerBudget,
        tool_id: &str,
        arguments: serde_json::Value,
    ) -> ConductorResult<serde_json::Value> {
        let descriptor = self.gateway.resolve_tool(tool_id)?;
        let credential = self
            .credentials
            .resolve(&self.context.user_id, &descriptor.domain)
            .await?;
        let call = ToolCall::new(descriptor.id.clone(), arguments);
        self.gateway.invoke(budget, &call, &credential).await
    }

    /// Domain the decision named, else the todo's domain if the catalog
    /// knows it, else the run default.
    fn discovery_filter<'a>(
        &'a self,
        requested: Option<&'a str>,
        todo_domain: &'a str,
    ) -> Option<&'a str> {
        requested
            .or_else(|| {
                self.index
                    .catalog()
                    .has_domain(todo_domain)
                    .then_some(todo_domain)
            })
            .or(self.default_domain.as_deref())
    }
}

/// Mutable state of one `execute` call.
struct WorkerRun<'a> {
    request: &'a WorkerRequest,
    budget: &'a WorkerBudget,
    trace: Vec<TraceEntry>,
    artifacts: Vec<String>,
}

impl WorkerRun<'_> {
    /// Map a tool-call error onto the worker outcome.
    fn stop(self, err: &ConductorError) -> WorkerResult {
        match err.kind() {
            ErrorKind::BudgetExceeded(BudgetScope::Worker) => {
                let summary = format!("Tool-call budget exhausted. {}", self.progress());
                self.finish(WorkerStatus::Partial, summary, None)
            }
            ErrorKind::BudgetExceeded(BudgetScope::Global) => {
                let summary = format!("Run budget exhausted. {}", self.progress());
                self.finish(WorkerStatus::Partial, summary, Some(WorkerError::from(err)))
            }
            _ => self.fail(err),
        }
    }

    fn fail(self, err: &ConductorError) -> WorkerResult {
        warn!(todo_id = %self.request.todo_id, error = %err, "Worker failed");
        let summary = err.to_string();
        self.finish(WorkerStatus::Failed, summary, Some(WorkerError::from(err)))
    }

    fn finish(
        self,
        status: WorkerStatus,
        summary: String,
        error: Option<WorkerError>,
    ) -> WorkerResult {
        let consumed_budget = self.budget.used();
        info!(
            todo_id = %self.request.todo_id,
            worker_id = %self.budget.worker_id(),
            ?status,
            consumed_budget,
            steps = self.trace.len(),
            "Worker finished"
        );
        let mut seen = BTreeSet::new();
        let mut artifacts = self.artifacts;
        artifacts.retain(|key| seen.insert(key.clone()));
        WorkerResult {
            todo_id: self.request.todo_id.clone(),
            status,
            summary,
            artifacts,
            consumed_budget,
            error,
        }
    }

    /// One-line account of successful tool calls, for partial summaries.
    fn progress(&self) -> String {
        let done: Vec<&str> = self
            .trace
            .iter()
            .filter_map(|entry| match &entry.observation {
                Observation::ToolResult { tool_id, .. } => Some(tool_id.as_str()),
                _ => None,
            })
            .collect();
        if done.is_empty() {
            "No tool call succeeded.".to_string()
        } else {
            format!("Succeeded: {}.", done.join(", "))
        }
    }
}
