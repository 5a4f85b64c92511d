//! Tool catalog and hub & spoke tool discovery.
//!
//! The catalog is produced offline (descriptors, embeddings, dependency
//! edges) and is read-only to the engine. The discovery index ranks catalog
//! tools for a free-text query: a semantic top-m search picks "hub" tools,
//! then one hop along their dependency edges pulls in "spoke" tools that are
//! commonly required alongside them.
//!
//! # Main types
//!
//! - [`ToolDescriptor`]: Metadata, parameter schema, embedding and dependency edges of one tool.
//! - [`ParameterSchema`]: Structural argument contract validated before dispatch.
//! - [`Catalog`]: Immutable, integrity-checked set of descriptors.
//! - [`EmbeddingProvider`]: Embedding collaborator; [`HashingEmbedding`] is the local default.
//! - [`DiscoveryIndex`]: Hub & spoke ranked retrieval over the catalog.

/// Tool catalog loading and integrity checks.
pub mod catalog;
/// Tool descriptor type.
pub mod descriptor;
/// Embedding provider trait and local implementation.
pub mod embedding;
/// Hub & spoke discovery index.
pub mod index;
/// Parameter schemas, argument validation and normalization.
pub mod schema;

pub use catalog::Catalog;
pub use descriptor::ToolDescriptor;
pub use embedding::{cosine_similarity, EmbeddingProvider, HashingEmbedding};
pub use index::{DiscoveryConfig, DiscoveryIndex, ToolMatch};
pub use schema::{normalize_arguments, ParamType, ParameterSchema, ParameterSpec};
