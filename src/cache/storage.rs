//! Snapshot storage trait and SQLite implementation.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::error::StorageError;

/// A persisted page snapshot.
#[derive(Debug, Clone)]
pub struct StoredSnapshot {
  /// Serialized page
  pub data: Vec<u8>,
  /// When the snapshot was written
  pub cached_at: DateTime<Utc>,
}

/// Trait for snapshot storage backends.
///
/// Payloads are opaque bytes; (de)serialization happens in the
/// [`SnapshotLayer`](super::SnapshotLayer) so the trait stays object safe.
pub trait SnapshotStorage: Send + Sync {
  /// Store (or overwrite) the snapshot for a query.
  fn store_snapshot(
    &self,
    key: &str,
    description: &str,
    entity_type: &str,
    data: &[u8],
  ) -> Result<(), StorageError>;

  /// Get the snapshot for a query, if one was stored for this entity type.
  fn load_snapshot(&self, key: &str, entity_type: &str)
    -> Result<Option<StoredSnapshot>, StorageError>;

  /// Drop every snapshot of an entity type.
  fn clear(&self, entity_type: &str) -> Result<(), StorageError>;
}

/// Storage implementation that doesn't persist anything.
/// Used when snapshots are disabled - all operations are no-ops.
pub struct NoopStorage;

impl SnapshotStorage for NoopStorage {
  fn store_snapshot(
    &self,
    _key: &str,
    _description: &str,
    _entity_type: &str,
    _data: &[u8],
  ) -> Result<(), StorageError> {
    Ok(()) // Discard
  }

  fn load_snapshot(
    &self,
    _key: &str,
    _entity_type: &str,
  ) -> Result<Option<StoredSnapshot>, StorageError> {
    Ok(None) // Always miss
  }

  fn clear(&self, _entity_type: &str) -> Result<(), StorageError> {
    Ok(())
  }
}

/// SQLite-based snapshot storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open the storage at the default location.
  pub fn open() -> Result<Self, StorageError> {
    Self::open_at(&Self::default_path()?)
  }

  /// Open the storage at an explicit path, creating parent directories.
  pub fn open_at(path: &Path) -> Result<Self, StorageError> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    Self::with_connection(Connection::open(path)?)
  }

  /// Storage that lives only as long as this value.
  pub fn open_in_memory() -> Result<Self, StorageError> {
    Self::with_connection(Connection::open_in_memory()?)
  }

  fn with_connection(conn: Connection) -> Result<Self, StorageError> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf, StorageError> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or(StorageError::NoDataDir)?;

    Ok(data_dir.join("dashcache").join("snapshots.db"))
  }

  fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
    self.conn.lock().map_err(|_| StorageError::LockPoisoned)
  }

  /// Run database migrations for snapshot tables.
  fn run_migrations(&self) -> Result<(), StorageError> {
    self.conn()?.execute_batch(SNAPSHOT_SCHEMA)?;
    Ok(())
  }
}

/// Schema for snapshot tables.
const SNAPSHOT_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS page_snapshot (
    query_hash TEXT PRIMARY KEY,
    query_description TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    data BLOB NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_page_snapshot_type ON page_snapshot(entity_type);
"#;

impl SnapshotStorage for SqliteStorage {
  fn store_snapshot(
    &self,
    key: &str,
    description: &str,
    entity_type: &str,
    data: &[u8],
  ) -> Result<(), StorageError> {
    self.conn()?.execute(
      "INSERT OR REPLACE INTO page_snapshot (query_hash, query_description, entity_type, data, cached_at)
       VALUES (?, ?, ?, ?, datetime('now'))",
      params![key, description, entity_type, data],
    )?;
    Ok(())
  }

  fn load_snapshot(
    &self,
    key: &str,
    entity_type: &str,
  ) -> Result<Option<StoredSnapshot>, StorageError> {
    let conn = self.conn()?;
    let row: Option<(Vec<u8>, String)> = conn
      .query_row(
        "SELECT data, cached_at FROM page_snapshot
         WHERE query_hash = ? AND entity_type = ?",
        params![key, entity_type],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .optional()?;

    match row {
      Some((data, cached_at)) => Ok(Some(StoredSnapshot {
        data,
        cached_at: parse_datetime(&cached_at)?,
      })),
      None => Ok(None),
    }
  }

  fn clear(&self, entity_type: &str) -> Result<(), StorageError> {
    self.conn()?.execute(
      "DELETE FROM page_snapshot WHERE entity_type = ?",
      params![entity_type],
    )?;
    Ok(())
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StorageError> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|_| StorageError::Timestamp(s.to_string()))
}
