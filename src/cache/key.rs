//! Stable keys for persisted page snapshots.

use serde::Serialize;
use sha2::{Digest, Sha256};

use super::page::PageRequest;

/// Identifies one list query: entity type, page request and remote filters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryKey {
  entity_type: &'static str,
  request: PageRequest,
  /// Filters serialized to canonical JSON
  filters: String,
}

impl QueryKey {
  pub fn new(
    entity_type: &'static str,
    request: PageRequest,
    filters: &impl Serialize,
  ) -> serde_json::Result<Self> {
    Ok(Self {
      entity_type,
      request,
      filters: serde_json::to_string(filters)?,
    })
  }

  pub fn entity_type(&self) -> &'static str {
    self.entity_type
  }

  /// SHA256 of the query, for stable, fixed-length keys.
  pub fn cache_hash(&self) -> String {
    let input = format!(
      "{}:{}:{}:{}",
      self.entity_type, self.request.page, self.request.size, self.filters
    );
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
  }

  pub fn description(&self) -> String {
    if self.filters == "{}" || self.filters == "null" {
      format!(
        "{} page {} (size {})",
        self.entity_type, self.request.page, self.request.size
      )
    } else {
      format!(
        "{} page {} (size {}) where {}",
        self.entity_type, self.request.page, self.request.size, self.filters
      )
    }
  }
}
