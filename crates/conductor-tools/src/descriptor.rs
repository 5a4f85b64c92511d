use crate::schema::ParameterSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Metadata describing one catalog tool.
///
/// `dependencies` are the directed edges of the tool graph: the ids of tools
/// that are commonly needed before or alongside this one (for example,
/// `create_task` depends on `get_project_id`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique tool id, e.g. `github_create_issue`.
    pub id: String,
    /// Integration domain, also the credential scope (e.g. `github`, `asana`).
    pub domain: String,
    /// Natural-language description used for embedding and ranking.
    #[serde(default)]
    pub description: String,
    /// Argument contract checked before every call.
    #[serde(default)]
    pub parameters: ParameterSchema,
    /// Precomputed semantic embedding. Empty until embedded.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedding: Vec<f32>,
    /// Ids of spoke tools reachable from this hub.
    #[serde(default)]
    pub dependencies: BTreeSet<String>,
}

impl ToolDescriptor {
    /// Bare descriptor with no description, parameters or dependencies.
    pub fn new(id: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            domain: domain.into(),
            description: String::new(),
            parameters: ParameterSchema::default(),
            embedding: Vec::new(),
            dependencies: BTreeSet::new(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the parameter schema.
    pub fn with_parameters(mut self, parameters: ParameterSchema) -> Self {
        self.parameters = parameters;
        self
    }

    /// Attach a precomputed embedding.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = embedding;
        self
    }

    /// Add a dependency edge to `tool_id`.
    pub fn with_dependency(mut self, tool_id: impl Into<String>) -> Self {
        self.dependencies.insert(tool_id.into());
        self
    }

    /// Text used to embed a descriptor that ships without an embedding.
    pub fn embedding_text(&self) -> String {
        let name = self.id.replace(['_', '-', '.'], " ");
        if self.description.is_empty() {
            name
        } else {
            format!("{name}: {}", self.description)
        }
    }
}
