use async_trait::async_trait;
use conductor_core::{ConductorError, ConductorResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Opaque reference to a stored credential.
///
/// Identifies a connected account in an integration platform; it is passed
/// through to the platform at dispatch time and never carries the secret.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CredentialHandle {
    connection_id: String,
    domain: String,
}

impl CredentialHandle {
    /// Handle for `connection_id` in `domain`.
    pub fn new(connection_id: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            connection_id: connection_id.into(),
            domain: domain.into(),
        }
    }

    /// Opaque platform connection id.
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// Integration domain the handle is scoped to.
    pub fn domain(&self) -> &str {
        &self.domain
    }
}

impl fmt::Debug for CredentialHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialHandle")
            .field("domain", &self.domain)
            .field("connection_id", &"[redacted]")
            .finish()
    }
}

/// A `(user, domain) -> connection` binding, as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialBinding {
    /// User the binding belongs to.
    pub user_id: String,
    /// Integration domain.
    pub domain: String,
    /// Platform connection id.
    pub connection_id: String,
}

/// Storage side of credential resolution.
#[async_trait]
pub trait CredentialBackend: Send + Sync {
    /// Look up the connection bound to `user_id` in `domain`.
    ///
    /// `Ok(None)` means no binding exists. `Err` is reserved for the backend
    /// itself failing.
    async fn lookup(&self, user_id: &str, domain: &str)
        -> ConductorResult<Option<CredentialHandle>>;
}

/// In-memory credential backend built from configured bindings.
#[derive(Debug, Default)]
pub struct StaticCredentialBackend {
    bindings: HashMap<(String, String), String>,
}

impl StaticCredentialBackend {
    /// Backend holding `bindings`; later duplicates win.
    pub fn new(bindings: impl IntoIterator<Item = CredentialBinding>) -> Self {
        Self {
            bindings: bindings
                .into_iter()
                .map(|b| ((b.user_id, b.domain), b.connection_id))
                .collect(),
        }
    }

    /// Add or replace one binding.
    pub fn with_binding(
        mut self,
        user_id: impl Into<String>,
        domain: impl Into<String>,
        connection_id: impl Into<String>,
    ) -> Self {
        self.bindings
            .insert((user_id.into(), domain.into()), connection_id.into());
        self
    }
}

#[async_trait]
impl CredentialBackend for StaticCredentialBackend {
    async fn lookup(
        &self,
        user_id: &str,
        domain: &str,
    ) -> ConductorResult<Option<CredentialHandle>> {
        Ok(self
            .bindings
            .get(&(user_id.to_string(), domain.to_string()))
            .map(|conn| CredentialHandle::new(conn.clone(), domain)))
    }
}

/// Resolves credential handles for workers, caching results for one run.
///
/// Missing bindings are cached too, so a domain without credentials costs a
/// single backend lookup per run.
pub struct CredentialResolver {
    backend: Arc<dyn CredentialBackend>,
    cache: RwLock<HashMap<(String, String), Option<CredentialHandle>>>,
}

impl CredentialResolver {
    /// Resolver over `backend` with an empty cache.
    pub fn new(backend: Arc<dyn CredentialBackend>) -> Self {
        Self {
            backend,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve the handle for `user_id` in `domain`.
    pub async fn resolve(&self, user_id: &str, domain: &str) -> ConductorResult<CredentialHandle> {
        let key = (user_id.to_string(), domain.to_string());

        let cached = self.cache.read().await.get(&key).cloned();
        let entry = match cached {
            Some(entry) => entry,
            None => {
                let found = self.backend.lookup(user_id, domain).await?;
                self.cache.write().await.insert(key, found.clone());
                debug!(user_id, domain, found = found.is_some(), "Credential lookup");
                found
            }
        };

        entry.ok_or_else(|| {
            warn!(user_id, domain, "No credential binding");
            ConductorError::AuthResolution {
                user_id: user_id.to_string(),
                domain: domain.to_string(),
            }
        })
    }

    /// Number of cached lookups, hits and misses alike.
    pub async fn cached_entries(&self) -> usize {
        self.cache.read().await.len()
    }

    /// Forget cached lookups, so the next resolve hits the backend again.
    pub async fn clear_cache(&self) {
        self.cache.write().await.clear();
    }
}
