use serde::{Deserialize, Serialize};
use std::fmt;

/// The budget a [`ConductorError::BudgetExceeded`] was raised against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetScope {
    /// The run-wide tool-call budget (`recursion_limit`). Ends the run.
    Global,
    /// The tool-call budget of a single worker. Ends that worker only.
    Worker,
}

impl fmt::Display for BudgetScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BudgetScope::Global => write!(f, "global"),
            BudgetScope::Worker => write!(f, "worker"),
        }
    }
}

/// Top-level error type for the Conductor engine.
///
/// The first seven variants form the orchestration taxonomy; each one has a
/// fixed propagation rule (see [`ConductorError::is_retryable`] and the
/// supervisor). The remaining variants cover infrastructure failures.
#[derive(Debug, thiserror::Error)]
pub enum ConductorError {
    /// The planning collaborator could not decompose the task. Fatal for the run.
    #[error("Planning error: {0}")]
    Planning(String),

    /// No catalog tool passed the minimum similarity threshold.
    #[error("Tool discovery error: {0}")]
    ToolDiscovery(String),

    /// Arguments did not match the tool's parameter schema. Never retried.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Network, timeout or rate-limit failure. Retried with backoff.
    #[error("Transient execution error: {0}")]
    TransientExecution(String),

    /// Business-logic rejection, or a transient failure that exhausted its attempts.
    #[error("Permanent execution error: {0}")]
    PermanentExecution(String),

    /// No credential binding exists for the user in that integration domain.
    #[error("Auth resolution error: no credential for user '{user_id}' in domain '{domain}'")]
    AuthResolution {
        /// The user the lookup was made for.
        user_id: String,
        /// The integration domain that has no binding.
        domain: String,
    },

    /// A tool-call budget was exhausted before dispatch.
    #[error("Budget exceeded: {scope} tool-call budget of {limit} exhausted")]
    BudgetExceeded {
        /// Which budget ran out.
        scope: BudgetScope,
        /// The configured limit of that budget.
        limit: u32,
    },

    /// A shared-store key (or other addressed item) does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The tool catalog is malformed (duplicate ids, dangling edges, ...).
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// The decision collaborator of a worker failed.
    #[error("Agent error: {0}")]
    Agent(String),

    /// An illegal plan transition or other supervisor-level fault.
    #[error("Orchestrator error: {0}")]
    Orchestrator(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`ConductorError`].
pub type ConductorResult<T> = Result<T, ConductorError>;

impl ConductorError {
    /// Classification of this error, without its payload.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConductorError::Planning(_) => ErrorKind::Planning,
            ConductorError::ToolDiscovery(_) => ErrorKind::ToolDiscovery,
            ConductorError::Validation(_) => ErrorKind::Validation,
            ConductorError::TransientExecution(_) => ErrorKind::TransientExecution,
            ConductorError::PermanentExecution(_) => ErrorKind::PermanentExecution,
            ConductorError::AuthResolution { .. } => ErrorKind::AuthResolution,
            ConductorError::BudgetExceeded { scope, .. } => ErrorKind::BudgetExceeded(*scope),
            ConductorError::NotFound(_) => ErrorKind::NotFound,
            ConductorError::Catalog(_) => ErrorKind::Catalog,
            ConductorError::Config(_) => ErrorKind::Config,
            ConductorError::Agent(_) => ErrorKind::Agent,
            ConductorError::Orchestrator(_) => ErrorKind::Orchestrator,
            ConductorError::Json(_) => ErrorKind::Json,
            ConductorError::Io(_) => ErrorKind::Io,
        }
    }

    /// Only transient execution failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ConductorError::TransientExecution(_))
    }
}

/// Serializable classification of a [`ConductorError`].
///
/// Workers report failures to the supervisor as an `ErrorKind` plus a message,
/// so no error value ever crosses that boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// See [`ConductorError::Planning`].
    Planning,
    /// See [`ConductorError::ToolDiscovery`].
    ToolDiscovery,
    /// See [`ConductorError::Validation`].
    Validation,
    /// See [`ConductorError::TransientExecution`].
    TransientExecution,
    /// See [`ConductorError::PermanentExecution`].
    PermanentExecution,
    /// See [`ConductorError::AuthResolution`].
    AuthResolution,
    /// See [`ConductorError::BudgetExceeded`].
    BudgetExceeded(BudgetScope),
    /// See [`ConductorError::NotFound`].
    NotFound,
    /// See [`ConductorError::Catalog`].
    Catalog,
    /// See [`ConductorError::Config`].
    Config,
    /// See [`ConductorError::Agent`].
    Agent,
    /// See [`ConductorError::Orchestrator`].
    Orchestrator,
    /// See [`ConductorError::Json`].
    Json,
    /// See [`ConductorError::Io`].
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Planning => "PlanningError",
            ErrorKind::ToolDiscovery => "ToolDiscoveryError",
            ErrorKind::Validation => "ValidationError",
            ErrorKind::TransientExecution => "TransientExecutionError",
            ErrorKind::PermanentExecution => "PermanentExecutionError",
            ErrorKind::AuthResolution => "AuthResolutionError",
            ErrorKind::BudgetExceeded(_) => "BudgetExceededError",
            ErrorKind::NotFound => "NotFoundError",
            ErrorKind::Catalog => "CatalogError",
            ErrorKind::Config => "ConfigError",
            ErrorKind::Agent => "AgentError",
            ErrorKind::Orchestrator => "OrchestratorError",
            ErrorKind::Json => "JsonError",
            ErrorKind::Io => "IoError",
        };
        f.write_str(name)
    }
}
