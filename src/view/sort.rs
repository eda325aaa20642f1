//! Sorting with an explicit null policy.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use super::value::{Fields, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortOrder {
  #[default]
  Asc,
  Desc,
}

impl FromStr for SortOrder {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "asc" | "ascending" => Ok(SortOrder::Asc),
      "desc" | "descending" => Ok(SortOrder::Desc),
      other => Err(format!("unknown sort order '{other}', expected asc or desc")),
    }
  }
}

/// Sort by one field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SortSpec {
  pub key: String,
  pub order: SortOrder,
}

impl SortSpec {
  pub fn new(key: &str, order: SortOrder) -> Self {
    Self {
      key: key.to_string(),
      order,
    }
  }

  pub fn asc(key: &str) -> Self {
    Self::new(key, SortOrder::Asc)
  }

  pub fn desc(key: &str) -> Self {
    Self::new(key, SortOrder::Desc)
  }

  /// Order two entities by this spec. Nulls go last in both directions.
  pub fn compare<T: Fields>(&self, a: &T, b: &T) -> Ordering {
    compare_values(&a.field(&self.key), &b.field(&self.key), self.order)
  }

  /// Stable sort; entities that compare equal keep their content order.
  pub fn sorted<T: Fields + Clone>(&self, items: &[T]) -> Vec<T> {
    let mut out = items.to_vec();
    out.sort_by(|a, b| self.compare(a, b));
    out
  }
}

/// `key` or `key:asc` / `key:desc`.
impl FromStr for SortSpec {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.split_once(':') {
      Some((key, order)) if !key.is_empty() => Ok(Self::new(key, order.parse()?)),
      None if !s.is_empty() => Ok(Self::asc(s)),
      _ => Err(format!("invalid sort '{s}'")),
    }
  }
}

impl fmt::Display for SortSpec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let order = match self.order {
      SortOrder::Asc => "asc",
      SortOrder::Desc => "desc",
    };
    write!(f, "{}:{}", self.key, order)
  }
}

pub fn compare_values(a: &Value, b: &Value, order: SortOrder) -> Ordering {
  match (a.is_null(), b.is_null()) {
    (true, true) => Ordering::Equal,
    (true, false) => Ordering::Greater,
    (false, true) => Ordering::Less,
    (false, false) => {
      let ordering = a.compare(b);
      match order {
        SortOrder::Asc => ordering,
        SortOrder::Desc => ordering.reverse(),
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::fixtures::{item, named, Item};
  use pretty_assertions::assert_eq;

  fn names(items: &[Item]) -> Vec<Option<&str>> {
    items.iter().map(|i| i.name.as_deref()).collect()
  }

  #[test]
  fn test_nulls_sort_last_ascending() {
    let items = vec![named(1, Some("B")), named(2, None), named(3, Some("A"))];
    let sorted = SortSpec::asc("name").sorted(&items);
    assert_eq!(names(&sorted), vec![Some("A"), Some("B"), None]);
  }

  #[test]
  fn test_nulls_sort_last_descending() {
    let items = vec![named(1, Some("B")), named(2, None), named(3, Some("A"))];
    let sorted = SortSpec::desc("name").sorted(&items);
    assert_eq!(names(&sorted), vec![Some("B"), Some("A"), None]);
  }

  #[test]
  fn test_strings_are_case_insensitive() {
    let items = vec![
      named(1, Some("banana")),
      named(2, Some("Apple")),
      named(3, Some("cherry")),
    ];
    let sorted = SortSpec::asc("name").sorted(&items);
    assert_eq!(
      names(&sorted),
      vec![Some("Apple"), Some("banana"), Some("cherry")]
    );
  }

  #[test]
  fn test_accented_names_sort_with_base_letter() {
    let items = vec![
      named(1, Some("Zeta")),
      named(2, Some("Éclat")),
      named(3, Some("fern")),
      named(4, Some("eagle")),
    ];
    let sorted = SortSpec::asc("name").sorted(&items);
    assert_eq!(
      names(&sorted),
      vec![Some("eagle"), Some("Éclat"), Some("fern"), Some("Zeta")]
    );
  }

  #[test]
  fn test_numbers_sort_numerically() {
    let with_score = |id, score| Item {
      score: Some(score),
      ..item(id)
    };
    let items = vec![with_score(1, 10), with_score(2, 9), with_score(3, 100)];
    let sorted = SortSpec::asc("score").sorted(&items);
    let scores: Vec<i64> = sorted.iter().filter_map(|i| i.score).collect();
    assert_eq!(scores, vec![9, 10, 100]);
  }

  #[test]
  fn test_false_before_true_ascending() {
    let items = vec![
      item(1),
      Item {
        active: false,
        ..item(2)
      },
    ];
    let sorted = SortSpec::asc("active").sorted(&items);
    assert_eq!(sorted[0].id, 2);
    let sorted = SortSpec::desc("active").sorted(&items);
    assert_eq!(sorted[0].id, 1);
  }

  #[test]
  fn test_sort_is_stable() {
    let items = vec![named(1, Some("x")), named(2, Some("x")), named(3, Some("x"))];
    let ids: Vec<u64> = SortSpec::desc("name").sorted(&items).iter().map(|i| i.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
  }

  #[test]
  fn test_parse_sort_spec() {
    assert_eq!("name".parse::<SortSpec>().unwrap(), SortSpec::asc("name"));
    assert_eq!(
      "createdAt:desc".parse::<SortSpec>().unwrap(),
      SortSpec::desc("createdAt")
    );
    assert!("name:sideways".parse::<SortSpec>().is_err());
    assert!("".parse::<SortSpec>().is_err());
    assert_eq!(SortSpec::desc("price").to_string(), "price:desc");
  }
}
