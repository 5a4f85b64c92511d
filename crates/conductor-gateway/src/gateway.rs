use crate::integration::{IntegrationPlatform, PlatformError};
use crate::record::{AttemptOutcome, ExecutionLog, ExecutionRecord};
use crate::retry::RetryPolicy;
use chrono::Utc;
use conductor_core::{ConductorError, ConductorResult, ToolCall};
use conductor_security::{CredentialHandle, WorkerBudget};
use conductor_tools::{normalize_arguments, Catalog, ToolDescriptor};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Type alias for the injectable sleep function used in tests.
#[cfg(test)]
type SleepFn = Box<
    dyn Fn(Duration) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>
        + Send
        + Sync,
>;

const FUNCTION_PREFIX: &str = "functions.";

/// Validates, dispatches, classifies and retries tool calls.
///
/// One gateway is shared by every worker of a run. Budgets are passed per
/// call so that each worker is charged against its own limit and the shared
/// global limit.
pub struct ExecutionGateway {
    catalog: Arc<Catalog>,
    platform: Arc<dyn IntegrationPlatform>,
    policy: RetryPolicy,
    dispatch_timeout: Duration,
    log: Arc<ExecutionLog>,
    /// Injectable sleep function for testing (records requested delays).
    #[cfg(test)]
    sleep_fn: Option<SleepFn>,
}

impl ExecutionGateway {
    pub fn new(
        catalog: Arc<Catalog>,
        platform: Arc<dyn IntegrationPlatform>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            catalog,
            platform,
            policy,
            dispatch_timeout: Duration::from_secs(30),
            log: Arc::new(ExecutionLog::new()),
            #[cfg(test)]
            sleep_fn: None,
        }
    }

    /// Cancel a single dispatch that takes longer than `timeout`.
    pub fn with_dispatch_timeout(mut self, timeout: Duration) -> Self {
        self.dispatch_timeout = timeout;
        self
    }

    /// Append records to an existing log instead of a private one.
    pub fn with_log(mut self, log: Arc<ExecutionLog>) -> Self {
        self.log = log;
        self
    }

    pub fn log(&self) -> &Arc<ExecutionLog> {
        &self.log
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Look up the descriptor for a requested tool id, accepting the
    /// `functions.` prefix some decision makers emit.
    pub fn resolve_tool(&self, tool_id: &str) -> ConductorResult<&ToolDescriptor> {
        let id = tool_id.strip_prefix(FUNCTION_PREFIX).unwrap_or(tool_id);
        self.catalog
            .get(id)
            .ok_or_else(|| ConductorError::Validation(format!("unknown tool '{id}'")))
    }

    async fn do_sleep(&self, delay: Duration) {
        #[cfg(test)]
        if let Some(ref f) = self.sleep_fn {
            f(delay).await;
            return;
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    /// Invoke a tool on behalf of the worker owning `budget`.
    ///
    /// Each attempt is charged one budget unit and recorded. A schema
    /// mismatch is charged and recorded as a single permanent error without
    /// being dispatched. Transient failures are retried up to
    /// `max_attempts`; running out of attempts is reported as a permanent
    /// execution error.
    pub async fn invoke(
        &self,
        budget: &WorkerBudget,
        call: &ToolCall,
        credential: &CredentialHandle,
    ) -> ConductorResult<Value> {
        let descriptor = self.resolve_tool(&call.tool_id)?;
        let tool_id = descriptor.id.as_str();
        let arguments = normalize_arguments(call.arguments.clone());

        if let Err(err) = descriptor.parameters.validate(&arguments) {
            warn!(tool = %tool_id, error = %err, "Arguments rejected");
            if budget.consume().is_ok() {
                self.record(
                    budget,
                    call,
                    tool_id,
                    &arguments,
                    1,
                    AttemptOutcome::PermanentError,
                    0,
                    Some(err.to_string()),
                );
            }
            return Err(err);
        }

        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            if let Err(err) = budget.consume() {
                warn!(tool = %tool_id, attempt, error = %err, "Budget exhausted before dispatch");
                return Err(err);
            }

            let started = Instant::now();
            let result = match tokio::time::timeout(
                self.dispatch_timeout,
                self.platform.call(tool_id, &arguments, credential),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(PlatformError::Timeout),
            };
            let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

            match result {
                Ok(value) => {
                    self.record(
                        budget,
                        call,
                        tool_id,
                        &arguments,
                        attempt,
                        AttemptOutcome::Success,
                        latency_ms,
                        None,
                    );
                    info!(tool = %tool_id, attempt, latency_ms, "Tool call succeeded");
                    return Ok(value);
                }
                Err(e) => {
                    let err = e.classify(tool_id);
                    let outcome = if err.is_retryable() {
                        AttemptOutcome::TransientError
                    } else {
                        AttemptOutcome::PermanentError
                    };
                    self.record(
                        budget,
                        call,
                        tool_id,
                        &arguments,
                        attempt,
                        outcome,
                        latency_ms,
                        Some(e.to_string()),
                    );
                    if !err.is_retryable() {
                        warn!(tool = %tool_id, attempt, error = %e, "Tool call rejected");
                        return Err(err);
                    }
                    if attempt >= max_attempts {
                        warn!(tool = %tool_id, attempt, error = %e, "Retries exhausted");
                        return Err(ConductorError::PermanentExecution(format!(
                            "{tool_id} failed after {attempt} attempts: {e}"
                        )));
                    }
                    let delay = self.policy.backoff_delay(attempt);
                    info!(
                        tool = %tool_id,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "Transient failure, backing off"
                    );
                    self.do_sleep(delay).await;
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn record(
        &self,
        budget: &WorkerBudget,
        call: &ToolCall,
        tool_id: &str,
        arguments: &Value,
        attempt: u32,
        outcome: AttemptOutcome,
        latency_ms: u64,
        error: Option<String>,
    ) {
        self.log.append(ExecutionRecord {
            worker_id: budget.worker_id(),
            call_id: call.id.clone(),
            tool_id: tool_id.to_string(),
            arguments: arguments.clone(),
            attempt,
            outcome,
            latency_ms,
            error,
            timestamp: Utc::now(),
        });
    }
}
