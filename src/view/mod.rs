//! Derived views over cached content.
//!
//! Every view here is a pure projection of a page's content: filtering,
//! sorting, grouping and formatting never touch the cache. Results are
//! memoized on the identity of the content `Arc`, so asking again with the
//! same content and the same parameters hands back the very same `Arc` and
//! consumers can skip re-rendering by comparing pointers.

mod filter;
mod format;
mod group;
mod image;
mod memo;
mod sort;
mod value;

pub use filter::{DateRange, FilterSpec, NumberRange, TextMatch};
pub use format::{Currency, Formatter, Present};
pub use group::Groups;
pub use image::ImageVersions;
pub use sort::{compare_values, SortOrder, SortSpec};
pub use value::{locale_cmp, Fields, Value};

use std::num::NonZeroUsize;
use std::sync::Arc;

pub(crate) use memo::Memo;

/// Default number of memoized results kept per view kind.
pub const DEFAULT_MEMO_CAPACITY: usize = 16;

/// Memoized filter/sort/group/format projections for one domain.
pub struct DerivedViewEngine<T: Present> {
  filtered: Memo<T, FilterSpec, Vec<T>>,
  sorted: Memo<T, SortSpec, Vec<T>>,
  grouped: Memo<T, String, Groups<T>>,
  formatted: Memo<T, Formatter, Vec<T::View>>,
}

impl<T: Fields + Present + Clone> DerivedViewEngine<T> {
  pub fn new(capacity: NonZeroUsize) -> Self {
    Self {
      filtered: Memo::new(capacity),
      sorted: Memo::new(capacity),
      grouped: Memo::new(capacity),
      formatted: Memo::new(capacity),
    }
  }

  /// Rows matching `spec`. The open filter returns `content` itself.
  pub fn filter(&self, content: &Arc<Vec<T>>, spec: &FilterSpec) -> Arc<Vec<T>> {
    if spec.is_open() {
      return Arc::clone(content);
    }
    self.filtered.get_or_compute(content, spec, |items, spec| {
      items.iter().filter(|item| spec.matches(*item)).cloned().collect()
    })
  }

  pub fn sort(&self, content: &Arc<Vec<T>>, spec: &SortSpec) -> Arc<Vec<T>> {
    self
      .sorted
      .get_or_compute(content, spec, |items, spec| spec.sorted(items))
  }

  /// Filter, then sort. Both steps are memoized, so an unchanged filter
  /// result keeps its sorted projection too.
  pub fn view(&self, content: &Arc<Vec<T>>, filter: &FilterSpec, sort: Option<&SortSpec>) -> Arc<Vec<T>> {
    let filtered = self.filter(content, filter);
    match sort {
      Some(spec) => self.sort(&filtered, spec),
      None => filtered,
    }
  }

  pub fn group_by(&self, content: &Arc<Vec<T>>, key: &str) -> Arc<Groups<T>> {
    self
      .grouped
      .get_or_compute(content, &key.to_string(), |items, key| Groups::by(items, key))
  }

  /// Presentation form of every row.
  pub fn format(&self, content: &Arc<Vec<T>>, fmt: &Formatter) -> Arc<Vec<T::View>> {
    self.formatted.get_or_compute(content, fmt, |items, fmt| {
      items.iter().map(|item| item.present(fmt)).collect()
    })
  }

  /// Drop every memoized result.
  pub fn clear(&self) {
    self.filtered.clear();
    self.sorted.clear();
    self.grouped.clear();
    self.formatted.clear();
  }
}

impl<T: Fields + Present + Clone> Default for DerivedViewEngine<T> {
  fn default() -> Self {
    Self::new(NonZeroUsize::new(DEFAULT_MEMO_CAPACITY).unwrap_or(NonZeroUsize::MIN))
  }
}
