//! Paginated entity cache and its snapshot persistence.
//!
//! This module provides a domain-agnostic caching mechanism that:
//! - Mirrors one server page of a collection plus an optional detail entity
//! - Applies confirmed creates, updates, deletes and toggles without a refetch
//! - Persists fetched pages so a new session can start from the last known page

mod entity_cache;
mod key;
mod layer;
mod page;
mod storage;
mod traits;

#[cfg(test)]
pub(crate) mod fixtures;

pub use entity_cache::{EntityCache, Mutation, Patch};
pub use key::QueryKey;
pub use layer::SnapshotLayer;
pub use page::{Page, PageRequest};
pub use storage::{NoopStorage, SnapshotStorage, SqliteStorage, StoredSnapshot};
pub use traits::{CacheResult, CacheSource, Entity, EntityId};
