//! Snapshot layer that persists fetched pages and restores them on startup.

use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

use super::key::QueryKey;
use super::page::Page;
use super::storage::{NoopStorage, SnapshotStorage};
use super::traits::{CacheResult, Entity};
use crate::error::StorageError;

/// Persists pages after successful list fetches so that a later session can
/// show the last known page before the network answers.
///
/// Snapshots are a convenience, not a source of truth: failures to write are
/// logged and swallowed, and restored data is always flagged as coming from
/// the cache.
#[derive(Clone)]
pub struct SnapshotLayer {
  storage: Arc<dyn SnapshotStorage>,
  /// How long before a snapshot is considered stale
  stale_time: Duration,
}

impl SnapshotLayer {
  /// Create a new snapshot layer with the given storage backend.
  pub fn new(storage: impl SnapshotStorage + 'static) -> Self {
    Self {
      storage: Arc::new(storage),
      stale_time: Duration::minutes(5),
    }
  }

  /// A layer that never stores anything.
  pub fn disabled() -> Self {
    Self::new(NoopStorage)
  }

  /// Set the stale time for restored snapshots.
  pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
    self.stale_time = stale_time;
    self
  }

  /// Persist a page, logging instead of failing.
  pub fn persist_page<T: Entity>(&self, key: &QueryKey, page: &Page<T>) {
    if let Err(e) = self.try_persist_page(key, page) {
      warn!(query = %key.description(), error = %e, "failed to persist page snapshot");
    }
  }

  pub fn try_persist_page<T: Entity>(&self, key: &QueryKey, page: &Page<T>) -> Result<(), StorageError> {
    let data = serde_json::to_vec(page)?;
    self
      .storage
      .store_snapshot(&key.cache_hash(), &key.description(), T::entity_type(), &data)?;
    debug!(query = %key.description(), rows = page.len(), "persisted page snapshot");
    Ok(())
  }

  /// Load the snapshot for a query, if any.
  pub fn restore_page<T: Entity>(&self, key: &QueryKey) -> Result<Option<CacheResult<Page<T>>>, StorageError> {
    let Some(stored) = self.storage.load_snapshot(&key.cache_hash(), T::entity_type())? else {
      return Ok(None);
    };

    let page: Page<T> = serde_json::from_slice(&stored.data)?;
    let is_stale = Utc::now() - stored.cached_at > self.stale_time;
    Ok(Some(CacheResult::from_cache(page, stored.cached_at, is_stale)))
  }

  /// Forget every snapshot of an entity type.
  pub fn clear<T: Entity>(&self) -> Result<(), StorageError> {
    self.storage.clear(T::entity_type())
  }
}
