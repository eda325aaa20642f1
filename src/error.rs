//! Error types shared by the cache, the dispatcher and the remote services.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Uniform failure returned by a remote service call.
///
/// The facades only ever look at whether a call failed, never at transport
/// details: whatever the server (or the network) reported is carried here
/// verbatim so the UI can show it as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct ServiceError {
  pub message: String,
  #[serde(rename = "errorCode", default, skip_serializing_if = "Option::is_none")]
  pub error_code: Option<String>,
}

impl ServiceError {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
      error_code: None,
    }
  }

  pub fn with_code(mut self, code: impl Into<String>) -> Self {
    self.error_code = Some(code.into());
    self
  }

  /// Failure below the HTTP layer (connection refused, timeout, bad body).
  pub fn transport(err: impl std::fmt::Display) -> Self {
    Self::new(err.to_string()).with_code("TRANSPORT")
  }
}

/// Local, pre-submission validation failure. A payload that fails validation
/// is never sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
  #[error("{field} is required")]
  Required { field: &'static str },

  #[error("{field} must not be negative")]
  Negative { field: &'static str },

  #[error("percentage discount must be greater than 0 and at most 100, got {0}")]
  PercentageOutOfRange(Decimal),

  #[error("fixed discount must be greater than 0, got {0}")]
  NonPositiveAmount(Decimal),

  #[error("end date must be after start date")]
  InvalidDateRange,

  #[error("quantity must be at least 1")]
  ZeroQuantity,
}

/// Snapshot persistence failure. Never surfaced as a mutation failure.
#[derive(Debug, Error)]
pub enum StorageError {
  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("failed to (de)serialize snapshot: {0}")]
  Serde(#[from] serde_json::Error),

  #[error("failed to prepare cache directory: {0}")]
  Io(#[from] std::io::Error),

  #[error("could not determine data directory")]
  NoDataDir,

  #[error("lock poisoned")]
  LockPoisoned,

  #[error("failed to parse timestamp '{0}'")]
  Timestamp(String),
}

/// Failure of a facade intent as seen by a caller that wants a single error
/// type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DashError {
  #[error(transparent)]
  Transport(#[from] ServiceError),

  #[error(transparent)]
  Validation(#[from] ValidationError),
}
