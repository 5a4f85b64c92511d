//! Run-scoped shared artifact store.
//!
//! Workers pass large artifacts to the supervisor (and to each other) by
//! reference: they `put` the payload here and report only the key. Nothing in
//! the store expires during a run; cleanup is an explicit operation.
//!
//! # Main types
//!
//! - [`SharedStore`]: Concurrent key/value store shared by all workers of a run.
//! - [`StoreSnapshot`]: Immutable copy of the store handed to a worker at dispatch.

/// Shared store and snapshot types.
pub mod store;

pub use store::{SharedStore, StoreSnapshot, StoredArtifact};
