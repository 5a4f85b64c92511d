use crate::descriptor::ToolDescriptor;
use crate::embedding::EmbeddingProvider;
use crate::schema::ParameterSchema;
use conductor_core::{ConductorError, ConductorResult};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, info};

/// On-disk catalog layout: `{"tools": [...]}`.
#[derive(Debug, Deserialize)]
struct CatalogFile {
    tools: Vec<CatalogEntry>,
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    id: String,
    domain: String,
    #[serde(default)]
    description: String,
    /// JSON-Schema object description of the arguments.
    #[serde(default)]
    parameters: Option<Value>,
    #[serde(default)]
    embedding: Vec<f32>,
    #[serde(default)]
    dependencies: Vec<String>,
}

impl TryFrom<CatalogEntry> for ToolDescriptor {
    type Error = ConductorError;

    fn try_from(entry: CatalogEntry) -> ConductorResult<Self> {
        let parameters = match &entry.parameters {
            Some(schema) => ParameterSchema::from_json_schema(schema).map_err(|e| {
                ConductorError::Catalog(format!("tool '{}': {e}", entry.id))
            })?,
            None => ParameterSchema::default(),
        };
        Ok(ToolDescriptor {
            id: entry.id,
            domain: entry.domain,
            description: entry.description,
            parameters,
            embedding: entry.embedding,
            dependencies: entry.dependencies.into_iter().collect(),
        })
    }
}

/// Immutable, integrity-checked set of tool descriptors keyed by id.
///
/// Construction guarantees that ids are unique, every dependency edge points
/// at a tool in the catalog, no tool depends on itself, and all non-empty
/// embeddings share one dimension.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tools: BTreeMap<String, ToolDescriptor>,
    dimension: Option<usize>,
}

impl Catalog {
    /// Index descriptors by id and check the catalog invariants.
    pub fn build(descriptors: Vec<ToolDescriptor>) -> ConductorResult<Self> {
        let mut tools = BTreeMap::new();
        let mut dimension: Option<usize> = None;

        for descriptor in descriptors {
            if descriptor.id.trim().is_empty() {
                return Err(ConductorError::Catalog("tool id must not be empty".into()));
            }
            if descriptor.domain.trim().is_empty() {
                return Err(ConductorError::Catalog(format!(
                    "tool '{}' has an empty domain",
                    descriptor.id
                )));
            }
            if !descriptor.embedding.is_empty() {
                let len = descriptor.embedding.len();
                match dimension {
                    None => dimension = Some(len),
                    Some(expected) if expected != len => {
                        return Err(ConductorError::Catalog(format!(
                            "tool '{}' has embedding dimension {len}, expected {expected}",
                            descriptor.id
                        )));
                    }
                    Some(_) => {}
                }
            }
            if tools.contains_key(&descriptor.id) {
                return Err(ConductorError::Catalog(format!(
                    "duplicate tool id '{}'",
                    descriptor.id
                )));
            }
            tools.insert(descriptor.id.clone(), descriptor);
        }

        for descriptor in tools.values() {
            for dep in &descriptor.dependencies {
                if dep == &descriptor.id {
                    return Err(ConductorError::Catalog(format!(
                        "tool '{dep}' depends on itself"
                    )));
                }
                if !tools.contains_key(dep) {
                    return Err(ConductorError::Catalog(format!(
                        "tool '{}' depends on unknown tool '{dep}'",
                        descriptor.id
                    )));
                }
            }
        }

        debug!(tools = tools.len(), ?dimension, "Catalog built");
        Ok(Self { tools, dimension })
    }

    /// Parse a catalog from its JSON representation.
    pub fn from_json(json: &str) -> ConductorResult<Self> {
        let file: CatalogFile = serde_json::from_str(json)?;
        let descriptors = file
            .tools
            .into_iter()
            .map(ToolDescriptor::try_from)
            .collect::<ConductorResult<Vec<_>>>()?;
        Self::build(descriptors)
    }

    /// Load a catalog JSON file.
    pub async fn load(path: &Path) -> ConductorResult<Self> {
        let json = tokio::fs::read_to_string(path).await?;
        let catalog = Self::from_json(&json)?;
        info!(path = %path.display(), tools = catalog.len(), "Catalog loaded");
        Ok(catalog)
    }

    /// Fill in embeddings for descriptors that have none.
    ///
    /// Fails if the catalog already carries embeddings of a different
    /// dimension than the provider produces.
    pub async fn embed_missing(self, embedder: &dyn EmbeddingProvider) -> ConductorResult<Self> {
        let mut embedded = 0usize;
        let mut descriptors = Vec::with_capacity(self.tools.len());
        for mut descriptor in self.tools.into_values() {
            if descriptor.embedding.is_empty() {
                descriptor.embedding = embedder.embed(&descriptor.embedding_text()).await?;
                embedded += 1;
            }
            descriptors.push(descriptor);
        }
        if embedded > 0 {
            debug!(embedded, "Embedded catalog descriptors");
        }
        Self::build(descriptors)
    }

    /// Look up a tool by id.
    pub fn get(&self, id: &str) -> Option<&ToolDescriptor> {
        self.tools.get(id)
    }

    /// Whether a tool with `id` exists.
    pub fn contains(&self, id: &str) -> bool {
        self.tools.contains_key(id)
    }

    /// Descriptors in id order.
    pub fn iter(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.values()
    }

    /// Number of tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the catalog has no tools.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Distinct integration domains, sorted.
    pub fn domains(&self) -> Vec<String> {
        self.tools
            .values()
            .map(|t| t.domain.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Whether any tool belongs to `domain`.
    pub fn has_domain(&self, domain: &str) -> bool {
        self.tools.values().any(|t| t.domain == domain)
    }

    /// Shared embedding dimension, if any descriptor is embedded.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }
}
