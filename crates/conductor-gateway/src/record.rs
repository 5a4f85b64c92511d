use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Classified outcome of one dispatch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// The platform returned a value.
    Success,
    /// Retryable failure.
    TransientError,
    /// Non-retryable failure.
    PermanentError,
}

/// Audit entry for one tool invocation attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Worker that made the call.
    pub worker_id: Uuid,
    /// Shared by every attempt of the same call.
    pub call_id: String,
    /// Called tool.
    pub tool_id: String,
    /// Normalized arguments as dispatched.
    pub arguments: Value,
    /// 1-based.
    pub attempt: u32,
    /// How the attempt ended.
    pub outcome: AttemptOutcome,
    /// Wall time of the attempt.
    pub latency_ms: u64,
    /// Rendered error of a failed attempt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the attempt finished.
    pub timestamp: DateTime<Utc>,
}

/// Append-only, run-wide log of execution records.
#[derive(Debug, Default)]
pub struct ExecutionLog {
    records: Mutex<Vec<ExecutionRecord>>,
}

impl ExecutionLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one record.
    pub fn append(&self, record: ExecutionRecord) {
        self.records.lock().push(record);
    }

    /// Copy of every record, in append order.
    pub fn records(&self) -> Vec<ExecutionRecord> {
        self.records.lock().clone()
    }

    /// Records produced by one worker, in append order.
    pub fn for_worker(&self, worker_id: Uuid) -> Vec<ExecutionRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.worker_id == worker_id)
            .cloned()
            .collect()
    }

    /// Records of one call, i.e. its attempts.
    pub fn for_call(&self, call_id: &str) -> Vec<ExecutionRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.call_id == call_id)
            .cloned()
            .collect()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}
