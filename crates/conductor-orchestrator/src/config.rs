use conductor_core::{ConductorError, ConductorResult};
use conductor_gateway::RetryPolicy;
use conductor_tools::DiscoveryConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Limits and defaults for one orchestration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Global tool-call cap for the whole run.
    #[serde(default = "default_recursion_limit")]
    pub recursion_limit: u32,
    /// Per-worker tool-call cap.
    #[serde(default = "default_max_tool_calls_per_worker")]
    pub max_tool_calls_per_worker: u32,
    /// How many times a failed todo is re-queued.
    #[serde(default = "default_max_todo_retries")]
    pub max_todo_retries: u32,
    /// Attempts per tool call, the first one included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Upper bound on concurrently running workers, one per domain.
    #[serde(default = "default_max_parallel_workers")]
    pub max_parallel_workers: u32,
    /// Discovery filter used when neither the decision nor the todo names a known domain.
    #[serde(default)]
    pub default_domain_filter: Option<String>,
    /// First backoff delay.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Backoff ceiling.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Jitter fraction in [0, 1].
    #[serde(default = "default_jitter")]
    pub jitter: f64,
    /// Per-call timeout, in milliseconds.
    #[serde(default = "default_dispatch_timeout_ms")]
    pub dispatch_timeout_ms: u64,
    /// User whose credentials the run resolves.
    #[serde(default = "default_user_id")]
    pub user_id: String,
    /// Known resource ids handed to workers.
    #[serde(default)]
    pub resource_hints: BTreeMap<String, String>,
    /// Hub & spoke ranking parameters.
    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

fn default_recursion_limit() -> u32 {
    50
}

fn default_max_tool_calls_per_worker() -> u32 {
    10
}

fn default_max_todo_retries() -> u32 {
    1
}

fn default_max_attempts() -> u32 {
    3
}

fn default_max_parallel_workers() -> u32 {
    1
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_jitter() -> f64 {
    0.2
}

fn default_dispatch_timeout_ms() -> u64 {
    30_000
}

fn default_user_id() -> String {
    "default".into()
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            recursion_limit: default_recursion_limit(),
            max_tool_calls_per_worker: default_max_tool_calls_per_worker(),
            max_todo_retries: default_max_todo_retries(),
            max_attempts: default_max_attempts(),
            max_parallel_workers: default_max_parallel_workers(),
            default_domain_filter: None,
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: default_jitter(),
            dispatch_timeout_ms: default_dispatch_timeout_ms(),
            user_id: default_user_id(),
            resource_hints: BTreeMap::new(),
            discovery: DiscoveryConfig::default(),
        }
    }
}

impl RunConfig {
    /// Reject settings a run cannot honor.
    pub fn validate(&self) -> ConductorResult<()> {
        let positive = [
            ("recursion_limit", u64::from(self.recursion_limit)),
            ("max_tool_calls_per_worker", u64::from(self.max_tool_calls_per_worker)),
            ("max_attempts", u64::from(self.max_attempts)),
            ("max_parallel_workers", u64::from(self.max_parallel_workers)),
            ("dispatch_timeout_ms", self.dispatch_timeout_ms),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(ConductorError::Config(format!("{name} must be at least 1")));
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err(ConductorError::Config(
                "base_delay_ms must not exceed max_delay_ms".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(ConductorError::Config("jitter must be within [0, 1]".into()));
        }
        if self.user_id.trim().is_empty() {
            return Err(ConductorError::Config("user_id must not be empty".into()));
        }
        self.discovery.validate()
    }

    /// Retry policy built from the backoff fields.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay_ms: self.base_delay_ms,
            max_delay_ms: self.max_delay_ms,
            jitter: self.jitter,
        }
    }

    /// Per-call timeout as a duration.
    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_millis(self.dispatch_timeout_ms)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use conductor_core::ErrorKind;

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.recursion_limit, 50);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.max_parallel_workers, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: RunConfig =
            serde_json::from_str(r#"{"recursion_limit": 5, "discovery": {"top_k": 4}}"#).unwrap();
        assert_eq!(config.recursion_limit, 5);
        assert_eq!(config.max_tool_calls_per_worker, 10);
        assert_eq!(config.discovery.top_k, 4);
        assert_eq!(config.discovery.hub_candidates, 5);
        assert_eq!(config.user_id, "default");
    }

    #[test]
    fn test_validation_rejects_zero_limits() {
        let config = RunConfig {
            max_attempts: 0,
            ..RunConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(err.to_string().contains("max_attempts"));

        let config = RunConfig {
            jitter: 1.5,
            ..RunConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retry_policy_mirrors_config() {
        let config = RunConfig {
            max_attempts: 4,
            base_delay_ms: 10,
            ..RunConfig::default()
        };
        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.base_delay_ms, 10);
        assert_eq!(config.dispatch_timeout(), Duration::from_secs(30));
    }
}
