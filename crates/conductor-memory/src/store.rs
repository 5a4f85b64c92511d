use chrono::{DateTime, Utc};
use conductor_core::{ConductorError, ConductorResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// Key that asks the store to generate a fresh one.
const AUTO_KEY: &str = "auto";

/// A value stored in the shared store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredArtifact {
    /// The stored JSON value.
    pub value: serde_json::Value,
    /// When the entry was written.
    pub created_at: DateTime<Utc>,
}

/// Key/value artifact store visible to every worker of a run.
pub struct SharedStore {
    entries: RwLock<BTreeMap<String, StoredArtifact>>,
}

impl SharedStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Store a value and return the key it is reachable under.
    ///
    /// An empty key or `"auto"` generates an 8-character key.
    pub async fn put(&self, key: &str, value: serde_json::Value) -> String {
        let key = if key.trim().is_empty() || key == AUTO_KEY {
            generate_key()
        } else {
            key.to_string()
        };

        let size = value.to_string().len();
        let mut entries = self.entries.write().await;
        entries.insert(
            key.clone(),
            StoredArtifact {
                value,
                created_at: Utc::now(),
            },
        );
        info!(key = %key, size, "Stored artifact");
        key
    }

    /// Fetch a value by key.
    pub async fn get(&self, key: &str) -> ConductorResult<serde_json::Value> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .map(|a| a.value.clone())
            .ok_or_else(|| ConductorError::NotFound(format!("no artifact stored under '{key}'")))
    }

    /// Whether `key` is present.
    pub async fn contains(&self, key: &str) -> bool {
        self.entries.read().await.contains_key(key)
    }

    /// Keys in lexical order.
    pub async fn keys(&self) -> Vec<String> {
        self.entries.read().await.keys().cloned().collect()
    }

    /// Number of stored artifacts.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the store holds nothing.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Immutable copy of the current contents.
    pub async fn snapshot(&self) -> StoreSnapshot {
        let entries = self.entries.read().await;
        StoreSnapshot {
            entries: entries
                .iter()
                .map(|(k, a)| (k.clone(), a.value.clone()))
                .collect(),
        }
    }

    /// Explicit cleanup of one key. Returns whether it existed.
    pub async fn remove(&self, key: &str) -> bool {
        let removed = self.entries.write().await.remove(key).is_some();
        debug!(key = %key, removed, "Removed artifact");
        removed
    }

    /// Explicit cleanup of everything.
    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        let count = entries.len();
        entries.clear();
        info!(count, "Cleared shared store");
    }
}

impl Default for SharedStore {
    fn default() -> Self {
        Self::new()
    }
}

fn generate_key() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Read-only view of the shared store taken at worker dispatch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    entries: BTreeMap<String, serde_json::Value>,
}

impl StoreSnapshot {
    /// Value under `key` when the snapshot was taken.
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.entries.get(key)
    }

    /// Keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of entries in the snapshot.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
