//! Partitioning content by a field value.

use std::collections::HashMap;

use super::value::{Fields, Value};

/// Content partitioned by the value of one field.
///
/// Groups appear in the order their first member appears in the content, and
/// members keep their content order.
#[derive(Debug, Clone, PartialEq)]
pub struct Groups<T> {
  groups: Vec<(Value, Vec<T>)>,
  index: HashMap<Value, usize>,
}

impl<T: Fields + Clone> Groups<T> {
  pub fn by(items: &[T], key: &str) -> Self {
    let mut groups: Vec<(Value, Vec<T>)> = Vec::new();
    let mut index: HashMap<Value, usize> = HashMap::new();

    for item in items {
      let value = item.field(key);
      match index.get(&value) {
        Some(&slot) => groups[slot].1.push(item.clone()),
        None => {
          index.insert(value.clone(), groups.len());
          groups.push((value, vec![item.clone()]));
        }
      }
    }

    Self { groups, index }
  }
}

impl<T> Groups<T> {
  pub fn get(&self, value: &Value) -> Option<&[T]> {
    self
      .index
      .get(value)
      .and_then(|&slot| self.groups.get(slot))
      .map(|(_, members)| members.as_slice())
  }

  pub fn keys(&self) -> impl Iterator<Item = &Value> {
    self.groups.iter().map(|(value, _)| value)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&Value, &[T])> {
    self
      .groups
      .iter()
      .map(|(value, members)| (value, members.as_slice()))
  }

  pub fn len(&self) -> usize {
    self.groups.len()
  }

  pub fn is_empty(&self) -> bool {
    self.groups.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::fixtures::{item, Item};
  use pretty_assertions::assert_eq;

  fn in_category(id: u64, category: Option<&str>) -> Item {
    Item {
      category: category.map(String::from),
      ..item(id)
    }
  }

  #[test]
  fn test_groups_preserve_content_order() {
    let items = vec![
      in_category(1, Some("shoes")),
      in_category(2, Some("hats")),
      in_category(3, Some("shoes")),
      in_category(4, None),
      in_category(5, Some("hats")),
    ];
    let groups = Groups::by(&items, "category");

    let keys: Vec<String> = groups.keys().map(ToString::to_string).collect();
    assert_eq!(keys, vec!["shoes", "hats", "(none)"]);

    let shoes: Vec<u64> = groups
      .get(&Value::from("shoes"))
      .unwrap()
      .iter()
      .map(|i| i.id)
      .collect();
    assert_eq!(shoes, vec![1, 3]);
    assert_eq!(groups.get(&Value::Null).unwrap().len(), 1);
    assert!(groups.get(&Value::from("gloves")).is_none());
  }

  #[test]
  fn test_group_sizes_cover_content() {
    let items: Vec<Item> = (1..=6)
      .map(|id| Item {
        active: id % 2 == 0,
        ..item(id)
      })
      .collect();
    let groups = Groups::by(&items, "active");
    assert_eq!(groups.len(), 2);
    let total: usize = groups.iter().map(|(_, members)| members.len()).sum();
    assert_eq!(total, items.len());
  }

  #[test]
  fn test_empty_content_has_no_groups() {
    let groups = Groups::<Item>::by(&[], "category");
    assert!(groups.is_empty());
  }
}
