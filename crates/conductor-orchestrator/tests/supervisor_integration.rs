#![allow(clippy::unwrap_used, clippy::expect_used)]
//! End-to-end supervisor runs with scripted planners, decision makers and platforms.

use async_trait::async_trait;
use conductor_agent::{Action, DeciderFactory, DecisionContext, DecisionMaker, WorkerRequest};
use conductor_core::{ConductorResult, ErrorKind};
use conductor_gateway::{AttemptOutcome, IntegrationPlatform, PlatformError};
use conductor_orchestrator::{
    PlannedTodo, Planner, RunConfig, RunOutcome, StaticPlanner, Supervisor, TodoId, TodoStatus,
};
use conductor_security::{CredentialHandle, StaticCredentialBackend};
use conductor_tools::{
    Catalog, HashingEmbedding, ParamType, ParameterSchema, ParameterSpec, ToolDescriptor,
};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Scripted collaborators
// ---------------------------------------------------------------------------

/// Replays a fixed list of actions, then completes with a domain summary.
struct ScriptedDecider {
    script: VecDeque<Action>,
    domain: String,
}

#[async_trait]
impl DecisionMaker for ScriptedDecider {
    async fn decide(&mut self, _ctx: &DecisionContext<'_>) -> ConductorResult<Action> {
        Ok(self.script.pop_front().unwrap_or_else(|| Action::Complete {
            summary: format!("{} work finished", self.domain),
            artifacts: vec![],
        }))
    }
}

fn invoke(tool_id: &str, arguments: Value) -> Action {
    Action::Invoke {
        tool_id: tool_id.into(),
        arguments,
    }
}

/// Factory that picks a script per request.
fn factory<F>(script: F) -> DeciderFactory
where
    F: Fn(&WorkerRequest) -> Vec<Action> + Send + Sync + 'static,
{
    Arc::new(move |request: &WorkerRequest| {
        Box::new(ScriptedDecider {
            script: script(request).into(),
            domain: request.domain.clone(),
        }) as Box<dyn DecisionMaker>
    })
}

/// The happy-path script for each domain of the test catalog.
fn happy_script(request: &WorkerRequest) -> Vec<Action> {
    match request.domain.as_str() {
        "github" => vec![invoke(
            "create_issue",
            json!({"repo": "acme/api", "title": "Crash on login"}),
        )],
        "asana" => vec![invoke("create_task", json!({"name": "Triage crash"}))],
        "slack" => vec![invoke("send_message", json!({"channel": "#eng", "text": "hi"}))],
        _ => vec![],
    }
}

/// Per-tool queue of outcomes; unscripted calls succeed after an optional delay.
#[derive(Default)]
struct ScriptedPlatform {
    outcomes: Mutex<HashMap<String, VecDeque<Result<Value, PlatformError>>>>,
    calls: Mutex<Vec<String>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    domain_in_flight: Mutex<HashMap<String, usize>>,
    max_domain_in_flight: AtomicUsize,
}

impl ScriptedPlatform {
    fn with(self, tool_id: &str, outcomes: Vec<Result<Value, PlatformError>>) -> Self {
        self.outcomes
            .lock()
            .unwrap()
            .insert(tool_id.to_string(), outcomes.into());
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl IntegrationPlatform for ScriptedPlatform {
    async fn call(
        &self,
        tool_id: &str,
        _arguments: &Value,
        credential: &CredentialHandle,
    ) -> Result<Value, PlatformError> {
        self.calls.lock().unwrap().push(tool_id.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        {
            let mut per_domain = self.domain_in_flight.lock().unwrap();
            let count = per_domain.entry(credential.domain().to_string()).or_default();
            *count += 1;
            self.max_domain_in_flight.fetch_max(*count, Ordering::SeqCst);
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if let Some(count) = self
            .domain_in_flight
            .lock()
            .unwrap()
            .get_mut(credential.domain())
        {
            *count -= 1;
        }

        self.outcomes
            .lock()
            .unwrap()
            .get_mut(tool_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(json!({"tool": tool_id, "ok": true})))
    }
}

/// Records the domains it was offered.
struct RecordingPlanner {
    todos: Vec<PlannedTodo>,
    offered: Mutex<Vec<String>>,
}

#[async_trait]
impl Planner for RecordingPlanner {
    async fn decompose(
        &self,
        _task: &str,
        domains: &[String],
    ) -> ConductorResult<Vec<PlannedTodo>> {
        *self.offered.lock().unwrap() = domains.to_vec();
        Ok(self.todos.clone())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

async fn catalog() -> Arc<Catalog> {
    let embedder = HashingEmbedding::default();
    let catalog = Catalog::build(vec![
        ToolDescriptor::new("create_issue", "github")
            .with_description("create issue in repository")
            .with_parameters(ParameterSchema::new(vec![
                ParameterSpec::required("repo", ParamType::String),
                ParameterSpec::required("title", ParamType::String),
            ]))
            .with_dependency("get_project_id"),
        ToolDescriptor::new("get_project_id", "github")
            .with_description("lookup board by name")
            .with_parameters(ParameterSchema::new(vec![ParameterSpec::required(
                "name",
                ParamType::String,
            )])),
        ToolDescriptor::new("create_task", "asana")
            .with_description("create task")
            .with_parameters(ParameterSchema::new(vec![ParameterSpec::required(
                "name",
                ParamType::String,
            )])),
        ToolDescriptor::new("send_message", "slack").with_description("post message to channel"),
    ])
    .unwrap()
    .embed_missing(&embedder)
    .await
    .unwrap();
    Arc::new(catalog)
}

fn config() -> RunConfig {
    RunConfig {
        base_delay_ms: 0,
        max_delay_ms: 0,
        user_id: "u1".into(),
        ..RunConfig::default()
    }
}

/// `u1` is connected to github and asana, not slack.
fn credentials() -> Arc<StaticCredentialBackend> {
    Arc::new(
        StaticCredentialBackend::default()
            .with_binding("u1", "github", "conn-gh")
            .with_binding("u1", "asana", "conn-as"),
    )
}

async fn supervisor(
    config: RunConfig,
    todos: Vec<PlannedTodo>,
    platform: Arc<ScriptedPlatform>,
    factory: DeciderFactory,
) -> Supervisor {
    Supervisor::new(
        config,
        Arc::new(StaticPlanner::new(todos)),
        catalog().await,
        Arc::new(HashingEmbedding::default()),
        platform,
        credentials(),
        factory,
    )
}

fn ids(raw: &[u32]) -> Vec<TodoId> {
    raw.iter().copied().map(TodoId).collect()
}

// ---------------------------------------------------------------------------
// Runs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_two_domains_complete() {
    let platform = Arc::new(ScriptedPlatform::default());
    let sup = supervisor(
        config(),
        vec![
            PlannedTodo::new("Open an issue for the login crash", "github"),
            PlannedTodo::new("Create a triage task", "asana"),
        ],
        platform.clone(),
        factory(happy_script),
    )
    .await;

    let summary = sup.run("file the login crash").await.unwrap();

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.completed, ids(&[1, 2]));
    assert!(summary.failed.is_empty());
    assert!(summary.not_attempted.is_empty());
    assert_eq!(summary.tool_calls_used, 2);
    assert_eq!(platform.calls(), vec!["create_issue", "create_task"]);
    assert!(summary
        .records
        .iter()
        .all(|r| r.outcome == AttemptOutcome::Success));
    assert_eq!(
        summary.result_log,
        vec![
            "todo-1: github work finished".to_string(),
            "todo-2: asana work finished".to_string(),
        ]
    );

    let report = summary.render();
    assert!(report.starts_with("Run completed: 2 done, 0 failed (2/50 tool calls)"));
    assert!(report.contains("- [done] todo-1 (github): Open an issue for the login crash"));
}

#[tokio::test]
async fn test_transient_failures_are_retried_within_the_call() {
    let platform = Arc::new(ScriptedPlatform::default().with(
        "create_issue",
        vec![
            Err(PlatformError::Unavailable("upstream 503".into())),
            Err(PlatformError::Timeout),
            Ok(json!({"number": 42})),
        ],
    ));
    let sup = supervisor(
        config(),
        vec![PlannedTodo::new("Open an issue", "github")],
        platform.clone(),
        factory(happy_script),
    )
    .await;

    let summary = sup.run("open issue").await.unwrap();

    assert_eq!(summary.completed, ids(&[1]));
    let outcomes: Vec<AttemptOutcome> = summary.records.iter().map(|r| r.outcome).collect();
    assert_eq!(
        outcomes,
        vec![
            AttemptOutcome::TransientError,
            AttemptOutcome::TransientError,
            AttemptOutcome::Success,
        ]
    );
    let attempts: Vec<u32> = summary.records.iter().map(|r| r.attempt).collect();
    assert_eq!(attempts, vec![1, 2, 3]);
    assert_eq!(summary.tool_calls_used, 3);
}

#[tokio::test]
async fn test_validation_failure_requeues_with_reason() {
    let platform = Arc::new(ScriptedPlatform::default());
    // The first attempt forgets the title; the retry reads the failure and fixes it.
    let script = |request: &WorkerRequest| {
        if request.instruction.contains("Previous attempt failed") {
            happy_script(request)
        } else {
            vec![invoke("create_issue", json!({"repo": "acme/api"}))]
        }
    };
    let sup = supervisor(
        config(),
        vec![PlannedTodo::new("Open an issue", "github")],
        platform.clone(),
        factory(script),
    )
    .await;

    let summary = sup.run("open issue").await.unwrap();

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.failed, ids(&[1]));
    assert_eq!(summary.completed, ids(&[2]));

    let first = &summary.records[0];
    assert_eq!(first.outcome, AttemptOutcome::PermanentError);
    assert_eq!(first.attempt, 1);
    assert!(first.error.as_deref().unwrap_or_default().contains("title"));
    assert_eq!(summary.records.len(), 2);
    // Only the corrected call reached the platform.
    assert_eq!(platform.calls(), vec!["create_issue"]);

    let retry = &summary.trace.todos[1];
    assert_eq!(retry.retry_of, Some(TodoId(1)));
    assert!(retry.text.contains("Previous attempt failed:"));
    assert!(retry.text.contains("title"));
}

#[tokio::test]
async fn test_retries_stop_at_max_todo_retries() {
    let platform = Arc::new(ScriptedPlatform::default().with(
        "create_task",
        vec![
            Err(PlatformError::PermissionDenied("project archived".into())),
            Err(PlatformError::PermissionDenied("project archived".into())),
        ],
    ));
    let sup = supervisor(
        RunConfig {
            max_todo_retries: 1,
            ..config()
        },
        vec![PlannedTodo::new("Create a task", "asana")],
        platform,
        factory(happy_script),
    )
    .await;

    let summary = sup.run("create task").await.unwrap();

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.failed, ids(&[1, 2]));
    assert_eq!(summary.counts.total, 2);
    assert!(summary.records.iter().all(|r| r.attempt == 1));
    assert!(summary.render().contains("- [failed] todo-2 (asana)"));
}

#[tokio::test]
async fn test_global_budget_stops_the_run() {
    let platform = Arc::new(ScriptedPlatform::default());
    let script = |request: &WorkerRequest| match request.domain.as_str() {
        "github" => vec![
            invoke("create_issue", json!({"repo": "acme/api", "title": "bug"})),
            invoke("get_project_id", json!({"name": "Backlog"})),
        ],
        _ => vec![
            invoke("create_task", json!({"name": "one"})),
            invoke("create_task", json!({"name": "two"})),
        ],
    };
    let sup = supervisor(
        RunConfig {
            recursion_limit: 5,
            ..config()
        },
        vec![
            PlannedTodo::new("Issue A", "github"),
            PlannedTodo::new("Task A", "asana"),
            PlannedTodo::new("Issue B", "github"),
            PlannedTodo::new("Task B", "asana"),
        ],
        platform.clone(),
        factory(script),
    )
    .await;

    let summary = sup.run("lots of work").await.unwrap();

    assert_eq!(summary.outcome, RunOutcome::BudgetExceeded);
    assert!(summary.is_budget_exceeded());
    // Grouped by domain: todo-1 and todo-2 are github, todo-3 and todo-4 asana.
    assert_eq!(summary.completed, ids(&[1, 2]));
    assert_eq!(summary.failed, ids(&[3]));
    assert_eq!(summary.not_attempted, ids(&[4]));
    assert_eq!(summary.tool_calls_used, 5);
    assert_eq!(summary.records.len(), 5);
    assert_eq!(platform.calls().len(), 5);

    let c = summary.counts;
    assert_eq!(c.done + c.failed + c.pending + c.in_progress, c.total);
    assert_eq!(c.in_progress, 0);

    let report = summary.render();
    assert!(report.starts_with("Run stopped: BudgetExceededError"));
    assert!(report
        .lines()
        .next()
        .unwrap()
        .ends_with("of 5 exhausted (2 done, 1 failed, 1 not attempted)"));
    assert!(report.contains("- [pending] todo-4 (asana): Task B => not attempted"));
}

#[tokio::test]
async fn test_missing_credentials_block_the_domain() {
    let platform = Arc::new(ScriptedPlatform::default());
    let sup = supervisor(
        config(),
        vec![
            PlannedTodo::new("Announce the release", "slack"),
            PlannedTodo::new("Open an issue", "github"),
            PlannedTodo::new("Ping the team", "slack"),
        ],
        platform.clone(),
        factory(happy_script),
    )
    .await;

    let summary = sup.run("release").await.unwrap();

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.failed, ids(&[1, 2]));
    assert_eq!(summary.completed, ids(&[3]));
    // No retry for an auth failure.
    assert_eq!(summary.counts.total, 3);
    assert_eq!(platform.calls(), vec!["create_issue"]);
    assert_eq!(summary.tool_calls_used, 1);

    let first = &summary.trace.results[0];
    assert_eq!(first.error.as_ref().unwrap().kind, ErrorKind::AuthResolution);
    let blocked = summary.trace.todos[1].failure_reason.clone().unwrap();
    assert!(blocked.contains("domain 'slack' unavailable"));
    // The blocked todo never reached a worker.
    assert_eq!(summary.trace.results.len(), 2);
}

#[tokio::test]
async fn test_planning_errors_are_fatal() {
    let platform = Arc::new(ScriptedPlatform::default());
    let sup = supervisor(config(), vec![], platform.clone(), factory(happy_script)).await;
    let err = sup.run("anything").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Planning);

    let sup = supervisor(
        config(),
        vec![PlannedTodo::new("Do something", " ")],
        platform.clone(),
        factory(happy_script),
    )
    .await;
    let err = sup.run("anything").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Planning);
    assert!(platform.calls().is_empty());
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let sup = supervisor(
        RunConfig {
            recursion_limit: 0,
            ..config()
        },
        vec![PlannedTodo::new("Open an issue", "github")],
        Arc::new(ScriptedPlatform::default()),
        factory(happy_script),
    )
    .await;
    let err = sup.run("x").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[tokio::test]
async fn test_planner_sees_catalog_domains() {
    let planner = Arc::new(RecordingPlanner {
        todos: vec![PlannedTodo::new("Create a task", "asana")],
        offered: Mutex::new(vec![]),
    });
    let sup = Supervisor::new(
        config(),
        planner.clone(),
        catalog().await,
        Arc::new(HashingEmbedding::default()),
        Arc::new(ScriptedPlatform::default()),
        credentials(),
        factory(happy_script),
    );

    let summary = sup.run("create task").await.unwrap();

    assert_eq!(summary.completed, ids(&[1]));
    assert_eq!(
        *planner.offered.lock().unwrap(),
        vec!["asana".to_string(), "github".to_string(), "slack".to_string()]
    );
}

#[tokio::test]
async fn test_initial_plan_skips_planner() {
    let planner = Arc::new(RecordingPlanner {
        todos: vec![],
        offered: Mutex::new(vec!["untouched".into()]),
    });
    let sup = Supervisor::new(
        config(),
        planner.clone(),
        catalog().await,
        Arc::new(HashingEmbedding::default()),
        Arc::new(ScriptedPlatform::default()),
        credentials(),
        factory(happy_script),
    )
    .with_initial_plan(vec![PlannedTodo::new("Create a task", "asana")]);

    let summary = sup.run("create task").await.unwrap();

    assert_eq!(summary.completed, ids(&[1]));
    assert_eq!(*planner.offered.lock().unwrap(), vec!["untouched".to_string()]);
}

#[tokio::test]
async fn test_artifacts_flow_through_the_store() {
    let platform = Arc::new(ScriptedPlatform::default());
    let script = |request: &WorkerRequest| match request.domain.as_str() {
        "github" => vec![
            invoke("create_issue", json!({"repo": "acme/api", "title": "bug"})),
            Action::Store {
                key: "issue_url".into(),
                value: json!("https://example.test/acme/api/issues/42"),
            },
        ],
        _ => {
            let url = request
                .snapshot
                .get("issue_url")
                .and_then(Value::as_str)
                .unwrap_or("missing")
                .to_string();
            vec![
                invoke("create_task", json!({"name": format!("Fix {url}")})),
                Action::Complete {
                    summary: format!("linked {url}"),
                    artifacts: vec![],
                },
            ]
        }
    };
    let sup = supervisor(
        config(),
        vec![
            PlannedTodo::new("Open an issue", "github"),
            PlannedTodo::new("Track it in asana", "asana"),
        ],
        platform,
        factory(script),
    )
    .await;

    let summary = sup.run("issue and task").await.unwrap();

    assert_eq!(summary.completed, ids(&[1, 2]));
    assert_eq!(summary.trace.results[0].artifacts, vec!["issue_url".to_string()]);
    assert_eq!(
        summary.trace.results[1].summary,
        "linked https://example.test/acme/api/issues/42"
    );
    assert!(sup.store().contains("issue_url").await);
}

#[tokio::test]
async fn test_parallel_workers_never_share_a_domain() {
    let platform = Arc::new(ScriptedPlatform::default().with_delay(Duration::from_millis(20)));
    let sup = supervisor(
        RunConfig {
            max_parallel_workers: 3,
            ..config()
        },
        vec![
            PlannedTodo::new("Issue A", "github"),
            PlannedTodo::new("Issue B", "github"),
            PlannedTodo::new("Task A", "asana"),
            PlannedTodo::new("Task B", "asana"),
        ],
        platform.clone(),
        factory(happy_script),
    )
    .await;

    let summary = sup.run("parallel").await.unwrap();

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.counts.done, 4);
    assert_eq!(summary.tool_calls_used, 4);
    assert_eq!(platform.max_domain_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(platform.max_in_flight.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_run_trace_is_written() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("runs").join("trace.json");
    let sup = supervisor(
        config(),
        vec![
            PlannedTodo::new("Open an issue", "github"),
            PlannedTodo::new("Create a task", "asana"),
        ],
        Arc::new(ScriptedPlatform::default()),
        factory(happy_script),
    )
    .await
    .with_trace_path(&path);

    let summary = sup.run("trace me").await.unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    let trace: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(trace["task"], "trace me");
    assert_eq!(trace["todos"][0]["id"], "todo-1");
    assert_eq!(trace["todos"][1]["status"], "done");
    assert_eq!(trace["results"].as_array().unwrap().len(), 2);
    assert_eq!(summary.trace.todos[0].status, TodoStatus::Done);
}
