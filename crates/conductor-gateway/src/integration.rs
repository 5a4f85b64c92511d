use async_trait::async_trait;
use conductor_core::ConductorError;
use conductor_security::CredentialHandle;
use serde_json::Value;

/// Raw failure reported by an integration platform.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
    /// The call did not answer in time.
    #[error("request timed out")]
    Timeout,
    /// The platform throttled the call.
    #[error("rate limited")]
    RateLimited,
    /// Connection-level failure.
    #[error("network error: {0}")]
    Network(String),
    /// The service is temporarily down.
    #[error("service unavailable: {0}")]
    Unavailable(String),
    /// The addressed resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// The credential lacks access.
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    /// The platform refused the call because of its current state.
    #[error("malformed state: {0}")]
    MalformedState(String),
    /// Business-logic rejection of the arguments.
    #[error("rejected: {0}")]
    Rejected(String),
    /// An HTTP-style status code returned by the platform.
    #[error("status {code}: {message}")]
    Status {
        /// Status code, e.g. 429 or 503.
        code: u16,
        /// Body or reason phrase.
        message: String,
    },
}

impl PlatformError {
    /// Network, timeout and rate-limit style failures may succeed on retry.
    ///
    /// Status codes follow HTTP conventions: 408, 429 and 5xx are transient,
    /// every other code is a business-logic rejection.
    pub fn is_transient(&self) -> bool {
        match self {
            PlatformError::Timeout
            | PlatformError::RateLimited
            | PlatformError::Network(_)
            | PlatformError::Unavailable(_) => true,
            PlatformError::NotFound(_)
            | PlatformError::PermissionDenied(_)
            | PlatformError::MalformedState(_)
            | PlatformError::Rejected(_) => false,
            PlatformError::Status { code, .. } => {
                *code == 408 || *code == 429 || (500..=599).contains(code)
            }
        }
    }
}

impl PlatformError {
    /// Map onto the engine taxonomy for a call to `tool_id`: transient
    /// failures become [`ConductorError::TransientExecution`], the rest
    /// [`ConductorError::PermanentExecution`].
    pub fn classify(&self, tool_id: &str) -> ConductorError {
        let message = format!("{tool_id}: {self}");
        if self.is_transient() {
            ConductorError::TransientExecution(message)
        } else {
            ConductorError::PermanentExecution(message)
        }
    }
}

/// Transport that actually performs an integration call.
#[async_trait]
pub trait IntegrationPlatform: Send + Sync {
    /// Perform `tool_id` with validated `arguments` on behalf of `credential`.
    async fn call(
        &self,
        tool_id: &str,
        arguments: &Value,
        credential: &CredentialHandle,
    ) -> Result<Value, PlatformError>;
}
