//! Version tokens that keep displayed images from being served stale.
//!
//! Image URLs are stable across edits, so a client-side image cache would
//! keep showing the old logo after an upload. Every displayed URL carries a
//! `v` query parameter that changes whenever the entity is edited, the user
//! asks for a refresh, or the surrounding list is reloaded.

use std::collections::HashMap;
use url::Url;

use crate::cache::EntityId;

/// Monotonic per-entity image version tokens.
#[derive(Debug, Clone, Default)]
pub struct ImageVersions {
  counter: u64,
  /// Token of the last list-wide bump
  epoch: u64,
  per_entity: HashMap<EntityId, u64>,
}

impl ImageVersions {
  pub fn new() -> Self {
    Self::default()
  }

  /// Current token for an entity.
  pub fn token(&self, id: EntityId) -> u64 {
    self
      .per_entity
      .get(&id)
      .copied()
      .unwrap_or_default()
      .max(self.epoch)
  }

  /// The entity was edited or its image explicitly refreshed.
  pub fn bump(&mut self, id: EntityId) -> u64 {
    self.counter += 1;
    self.per_entity.insert(id, self.counter);
    self.counter
  }

  /// The list was reloaded or a refresh of every image was requested.
  pub fn bump_all(&mut self) -> u64 {
    self.counter += 1;
    self.epoch = self.counter;
    // Every stored token is now at or below the epoch.
    self.per_entity.clear();
    self.counter
  }

  /// `base` with the entity's version token added to its query string.
  ///
  /// Relative URLs (served from the dashboard's own origin) cannot be parsed
  /// without a base, so they get the token spliced in ahead of any fragment.
  pub fn display_url(&self, base: &str, id: EntityId) -> String {
    let token = self.token(id).to_string();
    match Url::parse(base) {
      Ok(mut url) => {
        url.query_pairs_mut().append_pair("v", &token);
        url.into()
      }
      Err(_) => {
        let (path, fragment) = match base.split_once('#') {
          Some((path, fragment)) => (path, Some(fragment)),
          None => (base, None),
        };
        let separator = if path.contains('?') { '&' } else { '?' };
        let mut out = format!("{path}{separator}v={token}");
        if let Some(fragment) = fragment {
          out.push('#');
          out.push_str(fragment);
        }
        out
      }
    }
  }
}
