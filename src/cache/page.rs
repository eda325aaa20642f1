//! One server page of a collection, with its position and totals.
//!
//! A [`Page`] is immutable: every protocol operation returns a new page. The
//! content vector sits behind an `Arc` so that transitions which leave the
//! visible rows untouched (an insert while viewing page 3, a removal of an id
//! that is not on screen) keep the same content reference, and derived views
//! memoized on that reference stay valid.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::traits::{Entity, EntityId};

/// Which page of a collection to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageRequest {
  /// Zero-based page index
  pub page: u32,
  /// Page length
  pub size: u32,
}

impl PageRequest {
  pub fn new(page: u32, size: u32) -> Self {
    Self { page, size }
  }

  /// First page with the given length.
  pub fn first(size: u32) -> Self {
    Self::new(0, size)
  }

  pub fn with_page(self, page: u32) -> Self {
    Self { page, ..self }
  }
}

/// A server-paginated slice of a collection.
///
/// `total_pages`, `first`, `last` and `empty` are always derived from the
/// other fields, including when a page is deserialized: whatever the server
/// claims for them is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
  rename_all = "camelCase",
  from = "PageParts<T>",
  bound(deserialize = "T: Deserialize<'de>")
)]
pub struct Page<T> {
  content: Arc<Vec<T>>,
  total_elements: u64,
  size: u32,
  number: u32,
  total_pages: u64,
  first: bool,
  last: bool,
  empty: bool,
}

/// Wire shape of a page; only the authoritative fields are read.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageParts<T> {
  #[serde(default = "Vec::new")]
  content: Vec<T>,
  #[serde(default)]
  total_elements: u64,
  #[serde(default)]
  size: u32,
  #[serde(default)]
  number: u32,
}

impl<T> From<PageParts<T>> for Page<T> {
  fn from(parts: PageParts<T>) -> Self {
    Page::new(parts.content, parts.number, parts.size, parts.total_elements)
  }
}

impl<T> Page<T> {
  pub fn new(content: Vec<T>, number: u32, size: u32, total_elements: u64) -> Self {
    Self::from_parts(Arc::new(content), number, size, total_elements)
  }

  /// A page with no rows and no totals.
  pub fn empty(size: u32) -> Self {
    Self::new(Vec::new(), 0, size, 0)
  }

  fn from_parts(content: Arc<Vec<T>>, number: u32, size: u32, total_elements: u64) -> Self {
    let total_pages = if size == 0 {
      0
    } else {
      total_elements.div_ceil(u64::from(size))
    };
    Self {
      empty: content.is_empty(),
      content,
      total_elements,
      size,
      number,
      total_pages,
      first: number == 0,
      last: total_pages == 0 || u64::from(number) + 1 >= total_pages,
    }
  }

  pub fn content(&self) -> &[T] {
    &self.content
  }

  /// Shared handle to the rows; its pointer identity is what derived views
  /// are memoized on.
  pub fn content_ref(&self) -> &Arc<Vec<T>> {
    &self.content
  }

  pub fn total_elements(&self) -> u64 {
    self.total_elements
  }

  pub fn size(&self) -> u32 {
    self.size
  }

  pub fn number(&self) -> u32 {
    self.number
  }

  pub fn total_pages(&self) -> u64 {
    self.total_pages
  }

  pub fn is_first(&self) -> bool {
    self.first
  }

  pub fn is_last(&self) -> bool {
    self.last
  }

  pub fn is_empty(&self) -> bool {
    self.empty
  }

  pub fn len(&self) -> usize {
    self.content.len()
  }

  /// The request that would fetch this page again.
  pub fn request(&self) -> PageRequest {
    PageRequest::new(self.number, self.size)
  }
}

impl<T: Clone> Page<T> {
  /// Page after a confirmed create.
  ///
  /// Rows only change on the first page, where the new entity is prepended
  /// and the overflow dropped. Totals grow on every page.
  pub fn inserted(&self, entity: T) -> Self {
    let total_elements = self.total_elements + 1;
    if self.number != 0 {
      return Self::from_parts(
        Arc::clone(&self.content),
        self.number,
        self.size,
        total_elements,
      );
    }

    let mut content = Vec::with_capacity(self.content.len() + 1);
    content.push(entity);
    content.extend(self.content.iter().cloned());
    content.truncate(self.size as usize);
    Self::from_parts(Arc::new(content), self.number, self.size, total_elements)
  }

  /// Page with the rows rewritten by `f`; rows for which `f` returns None are
  /// kept as they are. Returns None when no row changed.
  pub fn rewritten(&self, mut f: impl FnMut(&T) -> Option<T>) -> Option<Self> {
    let mut changed = false;
    let content: Vec<T> = self
      .content
      .iter()
      .map(|row| match f(row) {
        Some(next) => {
          changed = true;
          next
        }
        None => row.clone(),
      })
      .collect();

    changed.then(|| Self::from_parts(Arc::new(content), self.number, self.size, self.total_elements))
  }
}

impl<T: Entity> Page<T> {
  pub fn position(&self, id: EntityId) -> Option<usize> {
    self.content.iter().position(|row| row.id() == id)
  }

  pub fn get(&self, id: EntityId) -> Option<&T> {
    self.content.iter().find(|row| row.id() == id)
  }

  pub fn contains(&self, id: EntityId) -> bool {
    self.position(id).is_some()
  }

  /// Page with the row carrying `entity`'s id replaced. None when the id is
  /// not on this page.
  pub fn replaced(&self, entity: &T) -> Option<Self> {
    let id = entity.id();
    self.rewritten(|row| (row.id() == id).then(|| entity.clone()))
  }

  /// Page after a confirmed delete: the row goes if present, the total
  /// shrinks by one either way (never below zero).
  pub fn removed(&self, id: EntityId) -> Self {
    let total_elements = self.total_elements.saturating_sub(1);
    let content = if self.contains(id) {
      Arc::new(
        self
          .content
          .iter()
          .filter(|row| row.id() != id)
          .cloned()
          .collect(),
      )
    } else {
      Arc::clone(&self.content)
    };
    Self::from_parts(content, self.number, self.size, total_elements)
  }
}

impl<T> Default for Page<T> {
  fn default() -> Self {
    Self::empty(0)
  }
}
