use crate::config::RunConfig;
use crate::plan::Plan;
use crate::planner::{check_plan, Planner};
use crate::summary::{FinalSummary, RunOutcome, RunTrace};
use crate::types::{PlannedTodo, TodoId, TodoStatus};
use conductor_agent::{
    DeciderFactory, RunContext, WorkerExecutor, WorkerRequest, WorkerResult, WorkerStatus,
};
use conductor_core::{ConductorError, ConductorResult, ErrorKind};
use conductor_gateway::{ExecutionGateway, ExecutionLog, IntegrationPlatform};
use conductor_memory::SharedStore;
use conductor_security::{Budget, CredentialBackend, CredentialResolver};
use conductor_tools::{Catalog, DiscoveryIndex, EmbeddingProvider};
use futures_util::stream::{FuturesUnordered, StreamExt};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// The Supervisor: owns the plan, dispatches workers, aggregates results.
///
/// Plan → dispatch → settle → repeat, until no todo is open or the global
/// tool-call budget is spent. Each call to [`Supervisor::run`] is an
/// independent run with fresh budgets and a fresh credential cache; the
/// shared store outlives runs and is cleaned up explicitly.
pub struct Supervisor {
    config: RunConfig,
    planner: Arc<dyn Planner>,
    catalog: Arc<Catalog>,
    embedder: Arc<dyn EmbeddingProvider>,
    platform: Arc<dyn IntegrationPlatform>,
    credentials: Arc<dyn CredentialBackend>,
    factory: DeciderFactory,
    store: Arc<SharedStore>,
    initial_plan: Vec<PlannedTodo>,
    trace_path: Option<PathBuf>,
}

/// Per-run mutable state of the supervisor loop.
struct RunState {
    plan: Plan,
    results: Vec<WorkerResult>,
    result_log: Vec<String>,
    /// Domains whose credentials failed to resolve, with the reason.
    blocked: HashMap<String, String>,
    budget_stop: bool,
}

impl Supervisor {
    /// Create a supervisor from its collaborators. The shared store starts empty.
    pub fn new(
        config: RunConfig,
        planner: Arc<dyn Planner>,
        catalog: Arc<Catalog>,
        embedder: Arc<dyn EmbeddingProvider>,
        platform: Arc<dyn IntegrationPlatform>,
        credentials: Arc<dyn CredentialBackend>,
        factory: DeciderFactory,
    ) -> Self {
        Self {
            config,
            planner,
            catalog,
            embedder,
            platform,
            credentials,
            factory,
            store: Arc::new(SharedStore::new()),
            initial_plan: Vec::new(),
            trace_path: None,
        }
    }

    /// Share an existing store with the caller.
    pub fn with_store(mut self, store: Arc<SharedStore>) -> Self {
        self.store = store;
        self
    }

    /// Start from these todos instead of asking the planner.
    pub fn with_initial_plan(mut self, todos: Vec<PlannedTodo>) -> Self {
        self.initial_plan = todos;
        self
    }

    /// Write the run trace to this file when the run ends.
    pub fn with_trace_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.trace_path = Some(path.into());
        self
    }

    /// The shared store. It is not cleared between runs.
    pub fn store(&self) -> &Arc<SharedStore> {
        &self.store
    }

    /// Run limits.
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run a task to a final summary.
    ///
    /// Only configuration and planning failures are returned as errors;
    /// everything after the plan exists ends in a summary.
    pub async fn run(&self, task: &str) -> ConductorResult<FinalSummary> {
        self.config.validate()?;
        let start = Instant::now();
        info!(task = %task, "Supervisor: starting run");

        let planned = if self.initial_plan.is_empty() {
            self.planner.decompose(task, &self.catalog.domains()).await?
        } else {
            self.initial_plan.clone()
        };
        check_plan(&planned)?;

        let mut state = RunState {
            plan: Plan::from_planned(planned),
            results: Vec::new(),
            result_log: Vec::new(),
            blocked: HashMap::new(),
            budget_stop: false,
        };
        info!(todos = state.plan.len(), "Supervisor: plan ready");

        let global = Arc::new(Budget::new(self.config.recursion_limit));
        let log = Arc::new(ExecutionLog::new());
        let executor = self.executor(global.clone(), log.clone());

        self.dispatch_loop(&executor, &global, &mut state).await?;

        let outcome = if state.budget_stop {
            RunOutcome::BudgetExceeded
        } else {
            RunOutcome::Completed
        };
        let plan = &state.plan;
        let summary = FinalSummary {
            outcome,
            counts: plan.counts(),
            completed: plan.ids_with_status(TodoStatus::Done),
            failed: plan.ids_with_status(TodoStatus::Failed),
            not_attempted: plan.ids_with_status(TodoStatus::Pending),
            result_log: state.result_log,
            tool_calls_used: global.used(),
            tool_call_limit: global.limit(),
            records: log.records(),
            trace: RunTrace {
                task: task.to_string(),
                todos: plan.todos().to_vec(),
                results: state.results,
            },
        };

        info!(
            outcome = ?summary.outcome,
            done = summary.counts.done,
            failed = summary.counts.failed,
            not_attempted = summary.not_attempted.len(),
            tool_calls = summary.tool_calls_used,
            duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Supervisor: run finished"
        );

        if let Some(path) = &self.trace_path {
            if let Err(e) = summary.trace.write_to(path).await {
                warn!(path = %path.display(), error = %e, "Failed to write run trace");
            }
        }

        Ok(summary)
    }

    fn executor(&self, global: Arc<Budget>, log: Arc<ExecutionLog>) -> WorkerExecutor {
        let gateway = ExecutionGateway::new(
            self.catalog.clone(),
            self.platform.clone(),
            self.config.retry_policy(),
        )
        .with_dispatch_timeout(self.config.dispatch_timeout())
        .with_log(log);
        let index = DiscoveryIndex::new(
            self.catalog.clone(),
            self.embedder.clone(),
            self.config.discovery.clone(),
        );
        let context = RunContext {
            user_id: self.config.user_id.clone(),
            resource_hints: self.config.resource_hints.clone(),
        };

        WorkerExecutor::new(
            Arc::new(index),
            Arc::new(gateway),
            Arc::new(CredentialResolver::new(self.credentials.clone())),
            self.store.clone(),
            global,
            self.factory.clone(),
        )
        .with_context(context)
        .with_max_tool_calls(self.config.max_tool_calls_per_worker)
        .with_default_domain(self.config.default_domain_filter.clone())
    }

    /// Dispatch todos until the plan settles or the global budget stops the run.
    ///
    /// At most `max_parallel_workers` workers are in flight, and never two
    /// for the same domain.
    async fn dispatch_loop(
        &self,
        executor: &WorkerExecutor,
        global: &Budget,
        state: &mut RunState,
    ) -> ConductorResult<()> {
        let max_in_flight = usize::try_from(self.config.max_parallel_workers)
            .unwrap_or(usize::MAX)
            .max(1);
        let mut busy: HashSet<String> = HashSet::new();
        let mut in_flight = FuturesUnordered::new();

        loop {
            while !state.budget_stop && in_flight.len() < max_in_flight {
                let Some(id) = state.plan.next_pending(&busy) else {
                    break;
                };
                if global.is_exhausted() {
                    warn!(
                        limit = global.limit(),
                        pending = state.plan.counts().pending,
                        "Global tool-call budget exhausted, stopping dispatch"
                    );
                    state.budget_stop = true;
                    break;
                }

                let todo = state.plan.claim(id)?.clone();
                if let Some(reason) = state.blocked.get(&todo.domain) {
                    let reason = format!("domain '{}' unavailable: {reason}", todo.domain);
                    state.plan.fail(id, reason)?;
                    continue;
                }

                info!(todo_id = %id, domain = %todo.domain, "Dispatching worker");
                busy.insert(todo.domain.clone());
                let request = WorkerRequest {
                    todo_id: id.to_string(),
                    instruction: todo.text,
                    domain: todo.domain,
                    snapshot: self.store.snapshot().await,
                };
                in_flight.push(async move {
                    let result = executor.execute(request).await;
                    (id, result)
                });
            }

            let Some((id, result)) = in_flight.next().await else {
                break;
            };
            if let Some(todo) = state.plan.get(id) {
                busy.remove(&todo.domain);
            }
            self.settle(state, id, result)?;
        }

        Ok(())
    }

    /// Fold one worker result into the plan.
    fn settle(
        &self,
        state: &mut RunState,
        id: TodoId,
        result: WorkerResult,
    ) -> ConductorResult<()> {
        let global_cutoff = result.hit_global_budget();
        let succeeded = matches!(result.status, WorkerStatus::Success | WorkerStatus::Partial)
            && !global_cutoff;

        if succeeded {
            state.plan.complete(id)?;
            state.result_log.push(format!("{id}: {}", result.summary));
        } else {
            let reason = result
                .error
                .as_ref()
                .map_or_else(|| result.summary.clone(), |e| e.message.clone());
            state.plan.fail(id, reason.clone())?;

            let (domain, retry_count) = state
                .plan
                .get(id)
                .map(|t| (t.domain.clone(), t.retry_count))
                .ok_or_else(|| ConductorError::Orchestrator(format!("unknown todo {id}")))?;
            let kind = result.error.as_ref().map(|e| e.kind);

            if global_cutoff {
                state.budget_stop = true;
            } else if kind == Some(ErrorKind::AuthResolution) {
                warn!(domain = %domain, "Blocking domain after credential failure");
                state.blocked.insert(domain, reason);
            } else if retry_count < self.config.max_todo_retries {
                state.plan.requeue(id)?;
            } else {
                warn!(todo_id = %id, retry_count, "Todo failed permanently");
            }
        }

        state.results.push(result);
        Ok(())
    }
}
