//! Core traits and types for the caching system.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};

/// Server-assigned key, unique within one domain. Never minted by the client.
pub type EntityId = u64;

/// Trait for entities that can live in an [`EntityCache`](super::EntityCache).
///
/// Implementors must be serializable so that pages can be snapshotted and
/// restored as-is.
pub trait Entity: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
  /// Server-assigned identifier
  fn id(&self) -> EntityId;

  /// Entity type name for storage organization (e.g., "brand", "coupon")
  fn entity_type() -> &'static str;

  /// Copy of this entity with its status flag flipped, all other fields kept.
  ///
  /// Returns None for entities without a status flag, in which case a status
  /// toggle leaves the cache untouched.
  fn toggled(&self) -> Option<Self> {
    None
  }
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was cached (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from fresh network data.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      cached_at: None,
    }
  }

  /// Create a new cache result from a persisted snapshot.
  pub fn from_cache(data: T, cached_at: DateTime<Utc>, is_stale: bool) -> Self {
    Self {
      data,
      source: if is_stale {
        CacheSource::CacheStale
      } else {
        CacheSource::CacheFresh
      },
      cached_at: Some(cached_at),
    }
  }
}

/// Indicates where the data currently held by a cache came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheSource {
  /// Nothing loaded yet
  #[default]
  Empty,
  /// Fresh data from network
  Network,
  /// Restored from a snapshot, still considered fresh
  CacheFresh,
  /// Restored from a snapshot older than the stale time
  CacheStale,
}

impl CacheSource {
  /// True when the data did not come from the server in this session.
  pub fn is_offline(self) -> bool {
    matches!(self, CacheSource::CacheFresh | CacheSource::CacheStale)
  }
}
