//! Reference-keyed memoization for derived views.

use lru::LruCache;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

struct MemoEntry<T, P, O> {
  /// Held so the input allocation, and with it the pointer in the key,
  /// cannot be reused while this entry exists
  input: Arc<Vec<T>>,
  params: P,
  output: Arc<O>,
}

/// LRU of derived outputs keyed by input identity and parameters.
///
/// Asking twice with the same input `Arc` and equal parameters returns the
/// same output `Arc` without recomputing.
pub(crate) struct Memo<T, P, O> {
  entries: Mutex<LruCache<(usize, u64), MemoEntry<T, P, O>>>,
}

impl<T, P: Hash + Eq + Clone, O> Memo<T, P, O> {
  pub fn new(capacity: NonZeroUsize) -> Self {
    Self {
      entries: Mutex::new(LruCache::new(capacity)),
    }
  }

  pub fn get_or_compute(
    &self,
    input: &Arc<Vec<T>>,
    params: &P,
    compute: impl FnOnce(&[T], &P) -> O,
  ) -> Arc<O> {
    let key = (Arc::as_ptr(input) as usize, hash_of(params));
    let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

    if let Some(entry) = entries.get(&key) {
      if Arc::ptr_eq(&entry.input, input) && entry.params == *params {
        return Arc::clone(&entry.output);
      }
    }

    let output = Arc::new(compute(input, params));
    entries.put(
      key,
      MemoEntry {
        input: Arc::clone(input),
        params: params.clone(),
        output: Arc::clone(&output),
      },
    );
    output
  }

  pub fn clear(&self) {
    self
      .entries
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .clear();
  }

  #[cfg(test)]
  pub fn len(&self) -> usize {
    self
      .entries
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .len()
  }
}

fn hash_of<P: Hash>(params: &P) -> u64 {
  let mut hasher = DefaultHasher::new();
  params.hash(&mut hasher);
  hasher.finish()
}
