//! Per-domain cache of one page plus an optional detail entity.
//!
//! Every operation here is a synchronous, local edit over data the server
//! has already confirmed. They never fail: an edit that finds nothing to
//! touch reports [`Patch::Unchanged`] and leaves the snapshot as it was.

use std::collections::HashSet;

use tracing::debug;

use super::page::Page;
use super::traits::{CacheSource, Entity, EntityId};

/// What a protocol operation did to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Patch {
  /// The page or the current entity changed
  Applied,
  /// Nothing matched; the edit was a no-op
  Unchanged,
}

impl Patch {
  pub fn is_applied(self) -> bool {
    matches!(self, Patch::Applied)
  }

  fn from_changed(changed: bool) -> Self {
    if changed {
      Patch::Applied
    } else {
      Patch::Unchanged
    }
  }

  /// Applied if either side applied.
  pub fn or(self, other: Patch) -> Patch {
    Patch::from_changed(self.is_applied() || other.is_applied())
  }
}

/// A confirmed remote result, ready to be folded into a cache.
#[derive(Debug, Clone)]
pub enum Mutation<T> {
  /// A list fetch returned this page
  Fetched(Page<T>),
  /// A fetch-by-id returned this entity
  Detail(T),
  /// A create returned this entity
  Created(T),
  /// An update returned this entity
  Updated(T),
  /// A domain-specific write (stock update, set default) returned this entity
  Patched(T),
  /// A delete succeeded for this id
  Deleted(EntityId),
  /// A status toggle succeeded for this id
  Toggled(EntityId),
  /// An auxiliary list owned by the domain facade, not by the cache
  Side { label: &'static str, items: Vec<T> },
}

impl<T> Mutation<T> {
  pub fn kind(&self) -> &'static str {
    match self {
      Mutation::Fetched(_) => "fetched",
      Mutation::Detail(_) => "detail",
      Mutation::Created(_) => "created",
      Mutation::Updated(_) => "updated",
      Mutation::Patched(_) => "patched",
      Mutation::Deleted(_) => "deleted",
      Mutation::Toggled(_) => "toggled",
      Mutation::Side { .. } => "side",
    }
  }
}

/// Cache for one domain: the visible page and the detail entity.
#[derive(Debug, Clone)]
pub struct EntityCache<T> {
  page: Page<T>,
  current: Option<T>,
  /// Ids removed since the last wholesale replace; keeps removal idempotent
  removed: HashSet<EntityId>,
  source: CacheSource,
}

impl<T: Entity> EntityCache<T> {
  pub fn new(page_size: u32) -> Self {
    Self {
      page: Page::empty(page_size),
      current: None,
      removed: HashSet::new(),
      source: CacheSource::Empty,
    }
  }

  pub fn page(&self) -> &Page<T> {
    &self.page
  }

  pub fn current(&self) -> Option<&T> {
    self.current.as_ref()
  }

  pub fn source(&self) -> CacheSource {
    self.source
  }

  /// Look an entity up on the visible page, falling back to the detail entity.
  pub fn find(&self, id: EntityId) -> Option<&T> {
    self
      .page
      .get(id)
      .or_else(|| self.current.as_ref().filter(|c| c.id() == id))
  }

  /// True until the first page has been fetched or restored.
  pub fn is_unloaded(&self) -> bool {
    self.source == CacheSource::Empty
  }

  /// Wholesale replace after a list fetch.
  pub fn replace_page(&mut self, page: Page<T>) -> Patch {
    self.replace_page_from(page, CacheSource::Network)
  }

  pub(crate) fn replace_page_from(&mut self, page: Page<T>, source: CacheSource) -> Patch {
    self.page = page;
    self.removed.clear();
    self.source = source;
    Patch::Applied
  }

  /// Reflect a confirmed create.
  pub fn insert_optimistic(&mut self, entity: T) -> Patch {
    self.page = self.page.inserted(entity);
    Patch::Applied
  }

  /// Reflect a confirmed update on the page and the detail entity.
  pub fn replace_by_id(&mut self, entity: T) -> Patch {
    let id = entity.id();
    let on_page = match self.page.replaced(&entity) {
      Some(page) => {
        self.page = page;
        Patch::Applied
      }
      None => Patch::Unchanged,
    };

    let on_current = match &mut self.current {
      Some(current) if current.id() == id => {
        *current = entity;
        Patch::Applied
      }
      _ => Patch::Unchanged,
    };

    let patch = on_page.or(on_current);
    if !patch.is_applied() {
      debug!(entity = T::entity_type(), id, "update for id not in cache, ignoring");
    }
    patch
  }

  /// Reflect a confirmed status toggle: the flag flips, every other field
  /// stays as cached.
  pub fn toggle_by_id(&mut self, id: EntityId) -> Patch {
    let toggled = self.find(id).and_then(T::toggled);
    match toggled {
      Some(toggled) => self.replace_by_id(toggled),
      None => {
        debug!(entity = T::entity_type(), id, "toggle for id not in cache, ignoring");
        Patch::Unchanged
      }
    }
  }

  /// Reflect a confirmed delete. A second removal of the same id is a no-op.
  pub fn remove_by_id(&mut self, id: EntityId) -> Patch {
    if !self.removed.insert(id) {
      debug!(entity = T::entity_type(), id, "id already removed, ignoring");
      return Patch::Unchanged;
    }

    self.page = self.page.removed(id);
    if self.current.as_ref().is_some_and(|c| c.id() == id) {
      self.current = None;
    }
    Patch::Applied
  }

  pub fn set_current(&mut self, entity: Option<T>) -> Patch {
    self.current = entity;
    Patch::Applied
  }

  /// Rewrite every cached entity (page and detail) for which `f` returns a
  /// replacement, as one edit.
  pub fn rewrite(&mut self, mut f: impl FnMut(&T) -> Option<T>) -> Patch {
    let on_page = match self.page.rewritten(&mut f) {
      Some(page) => {
        self.page = page;
        Patch::Applied
      }
      None => Patch::Unchanged,
    };

    let on_current = match self.current.as_ref().and_then(&mut f) {
      Some(next) => {
        self.current = Some(next);
        Patch::Applied
      }
      None => Patch::Unchanged,
    };

    on_page.or(on_current)
  }

  /// Fold a confirmed remote result into the cache under the protocol.
  pub fn apply(&mut self, mutation: Mutation<T>) -> Patch {
    match mutation {
      Mutation::Fetched(page) => self.replace_page(page),
      Mutation::Detail(entity) => {
        // Keep the page row identical to the fresher detail copy.
        if let Some(page) = self.page.replaced(&entity) {
          self.page = page;
        }
        self.set_current(Some(entity))
      }
      Mutation::Created(entity) => {
        self.insert_optimistic(entity.clone());
        self.set_current(Some(entity))
      }
      Mutation::Updated(entity) | Mutation::Patched(entity) => self.replace_by_id(entity),
      Mutation::Deleted(id) => self.remove_by_id(id),
      Mutation::Toggled(id) => self.toggle_by_id(id),
      Mutation::Side { .. } => Patch::Unchanged,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::fixtures::{item, items, named, Item};
  use pretty_assertions::assert_eq;

  fn loaded(page: Page<Item>) -> EntityCache<Item> {
    let mut cache = EntityCache::new(page.size());
    cache.replace_page(page);
    cache
  }

  fn assert_page_invariants(cache: &EntityCache<Item>) {
    let page = cache.page();
    let expected = if page.size() == 0 {
      0
    } else {
      page.total_elements().div_ceil(u64::from(page.size()))
    };
    assert_eq!(page.total_pages(), expected);
    assert_eq!(page.is_empty(), page.content().is_empty());
    assert!(page.len() <= page.size() as usize);
  }

  #[test]
  fn test_new_cache_is_unloaded() {
    let cache: EntityCache<Item> = EntityCache::new(10);
    assert!(cache.is_unloaded());
    assert!(cache.page().is_empty());
    assert_eq!(cache.current(), None);
  }

  #[test]
  fn test_insert_scenario() {
    let mut cache = loaded(Page::new(items(1..=10), 0, 10, 25));
    cache.insert_optimistic(item(11));

    let ids: Vec<u64> = cache.page().content().iter().map(|i| i.id).collect();
    assert_eq!(ids, vec![11, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
    assert_eq!(cache.page().total_elements(), 26);
    assert_eq!(cache.page().total_pages(), 3);
    assert_page_invariants(&cache);
  }

  #[test]
  fn test_remove_is_idempotent() {
    let mut cache = loaded(Page::new(items(1..=10), 0, 10, 25));

    assert_eq!(cache.remove_by_id(5), Patch::Applied);
    assert_eq!(cache.page().len(), 9);
    assert_eq!(cache.page().total_elements(), 24);
    assert_eq!(cache.page().total_pages(), 3);
    assert!(!cache.page().is_empty());

    assert_eq!(cache.remove_by_id(5), Patch::Unchanged);
    assert_eq!(cache.page().len(), 9);
    assert_eq!(cache.page().total_elements(), 24);
    assert_page_invariants(&cache);
  }

  #[test]
  fn test_replace_page_forgets_removed_ids() {
    let mut cache = loaded(Page::new(items(1..=3), 0, 10, 3));
    cache.remove_by_id(2);
    cache.replace_page(Page::new(items(1..=3), 0, 10, 3));
    assert_eq!(cache.remove_by_id(2), Patch::Applied);
  }

  #[test]
  fn test_remove_clears_matching_current() {
    let mut cache = loaded(Page::new(items(1..=3), 0, 10, 3));
    cache.set_current(Some(item(2)));

    cache.remove_by_id(3);
    assert_eq!(cache.current(), Some(&item(2)));

    cache.remove_by_id(2);
    assert_eq!(cache.current(), None);
  }

  #[test]
  fn test_replace_updates_page_and_current_together() {
    let mut cache = loaded(Page::new(items(1..=3), 0, 10, 3));
    cache.set_current(Some(item(2)));

    let updated = named(2, Some("renamed"));
    assert_eq!(cache.replace_by_id(updated.clone()), Patch::Applied);
    assert_eq!(cache.page().get(2), Some(&updated));
    assert_eq!(cache.current(), Some(&updated));
  }

  #[test]
  fn test_replace_absent_id_is_noop() {
    let mut cache = loaded(Page::new(items(1..=3), 0, 10, 3));
    let before = cache.page().clone();
    assert_eq!(cache.replace_by_id(item(42)), Patch::Unchanged);
    assert_eq!(cache.page(), &before);
  }

  #[test]
  fn test_replace_current_only() {
    let mut cache = loaded(Page::new(items(1..=3), 0, 10, 3));
    cache.set_current(Some(item(42)));
    let updated = named(42, Some("detail only"));
    assert_eq!(cache.replace_by_id(updated.clone()), Patch::Applied);
    assert_eq!(cache.current(), Some(&updated));
    assert!(!cache.page().contains(42));
  }

  #[test]
  fn test_toggle_flips_only_the_flag() {
    let mut cache = loaded(Page::new(items(1..=3), 0, 10, 3));
    cache.set_current(Some(item(1)));

    assert_eq!(cache.toggle_by_id(1), Patch::Applied);
    let toggled = cache.page().get(1).unwrap();
    assert!(!toggled.active);
    assert_eq!(toggled.name.as_deref(), Some("item-1"));
    assert_eq!(cache.current(), Some(toggled));

    assert_eq!(cache.toggle_by_id(99), Patch::Unchanged);
  }

  #[test]
  fn test_created_sets_current() {
    let mut cache = loaded(Page::new(items(11..=20), 1, 10, 20));
    cache.apply(Mutation::Created(item(77)));
    assert_eq!(cache.current(), Some(&item(77)));
    assert!(!cache.page().contains(77));
    assert_eq!(cache.page().total_elements(), 21);
  }

  #[test]
  fn test_detail_refreshes_page_row() {
    let mut cache = loaded(Page::new(items(1..=3), 0, 10, 3));
    let fresh = named(3, Some("fresh"));
    cache.apply(Mutation::Detail(fresh.clone()));
    assert_eq!(cache.page().get(3), Some(&fresh));
    assert_eq!(cache.current(), Some(&fresh));
  }

  #[test]
  fn test_rewrite_touches_page_and_current() {
    let mut cache = loaded(Page::new(items(1..=3), 0, 10, 3));
    cache.set_current(Some(item(9)));

    let patch = cache.rewrite(|i| {
      i.active.then(|| Item {
        active: false,
        ..i.clone()
      })
    });
    assert_eq!(patch, Patch::Applied);
    assert!(cache.page().content().iter().all(|i| !i.active));
    assert!(!cache.current().unwrap().active);

    assert_eq!(cache.rewrite(|_| None), Patch::Unchanged);
  }

  #[test]
  fn test_side_mutation_is_ignored_by_cache() {
    let mut cache = loaded(Page::new(items(1..=3), 0, 10, 3));
    let patch = cache.apply(Mutation::Side {
      label: "low_stock",
      items: items(7..=8),
    });
    assert_eq!(patch, Patch::Unchanged);
    assert_eq!(cache.page().len(), 3);
  }
}
