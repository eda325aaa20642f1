//! Test entity shared by the cache, view and dispatcher tests.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

use super::traits::{Entity, EntityId};
use crate::view::{Fields, Formatter, Present, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
  pub id: EntityId,
  pub name: Option<String>,
  #[serde(default)]
  pub active: bool,
  #[serde(default)]
  pub score: Option<i64>,
  #[serde(default)]
  pub price: Option<Decimal>,
  #[serde(default)]
  pub created: Option<DateTime<Utc>>,
  #[serde(default)]
  pub category: Option<String>,
}

pub fn item(id: EntityId) -> Item {
  Item {
    id,
    name: Some(format!("item-{id}")),
    active: true,
    score: None,
    price: None,
    created: None,
    category: None,
  }
}

pub fn named(id: EntityId, name: Option<&str>) -> Item {
  Item {
    name: name.map(String::from),
    ..item(id)
  }
}

pub fn items(ids: RangeInclusive<EntityId>) -> Vec<Item> {
  ids.map(item).collect()
}

impl Entity for Item {
  fn id(&self) -> EntityId {
    self.id
  }

  fn entity_type() -> &'static str {
    "item"
  }

  fn toggled(&self) -> Option<Self> {
    Some(Item {
      active: !self.active,
      ..self.clone()
    })
  }
}

impl Fields for Item {
  const SEARCH_FIELDS: &'static [&'static str] = &["name", "category"];

  fn field(&self, key: &str) -> Value {
    match key {
      "id" => Value::from(self.id),
      "name" => Value::from(self.name.clone()),
      "active" => Value::Bool(self.active),
      "score" => Value::from(self.score),
      "price" => Value::from(self.price),
      "created" => Value::from(self.created),
      "category" => Value::from(self.category.clone()),
      _ => Value::Null,
    }
  }
}

impl Present for Item {
  type View = String;

  fn present(&self, fmt: &Formatter) -> String {
    let price = self.price.map(|p| fmt.money(p)).unwrap_or_default();
    format!("#{} {} {}", self.id, self.name.as_deref().unwrap_or("-"), price)
  }
}

impl crate::service::Validate for Item {
  fn validate(&self) -> Result<(), crate::error::ValidationError> {
    match self.name.as_deref() {
      Some(name) if !name.trim().is_empty() => Ok(()),
      _ => Err(crate::error::ValidationError::Required { field: "name" }),
    }
  }
}

/// Server-side builder: the payload with the id the server assigned.
pub fn build_item(id: EntityId, payload: &Item) -> Item {
  Item {
    id,
    ..payload.clone()
  }
}
