//! Dynamically typed field values that filters, sorts and groups work on.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::fmt;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// A single field of an entity, as seen by the derived views.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
  /// Missing or unset field
  Null,
  Text(String),
  Int(i64),
  Decimal(Decimal),
  Bool(bool),
  Date(DateTime<Utc>),
}

/// Access to an entity's fields by name.
///
/// Names follow the wire format (`isActive`, `createdAt`, ...). Unknown names
/// yield [`Value::Null`].
pub trait Fields {
  /// Text fields a free-text search covers by default.
  const SEARCH_FIELDS: &'static [&'static str] = &[];

  fn field(&self, key: &str) -> Value;
}

impl Value {
  pub fn is_null(&self) -> bool {
    matches!(self, Value::Null)
  }

  pub fn as_text(&self) -> Option<&str> {
    match self {
      Value::Text(s) => Some(s),
      _ => None,
    }
  }

  /// Numeric view of the value; ints widen to decimals.
  pub fn as_decimal(&self) -> Option<Decimal> {
    match self {
      Value::Int(i) => Some(Decimal::from(*i)),
      Value::Decimal(d) => Some(*d),
      _ => None,
    }
  }

  pub fn as_date(&self) -> Option<DateTime<Utc>> {
    match self {
      Value::Date(d) => Some(*d),
      _ => None,
    }
  }

  /// Text a substring search looks at. Only text and numbers are searchable.
  pub fn search_text(&self) -> Option<String> {
    match self {
      Value::Text(s) => Some(s.to_lowercase()),
      Value::Int(i) => Some(i.to_string()),
      Value::Decimal(d) => Some(d.normalize().to_string()),
      _ => None,
    }
  }

  /// Equality that treats `Int(1)` and `Decimal(1.00)` as the same value.
  pub fn loosely_eq(&self, other: &Value) -> bool {
    match (self.as_decimal(), other.as_decimal()) {
      (Some(a), Some(b)) => a == b,
      _ => self == other,
    }
  }

  fn rank(&self) -> u8 {
    match self {
      Value::Bool(_) => 0,
      Value::Int(_) | Value::Decimal(_) => 1,
      Value::Date(_) => 2,
      Value::Text(_) => 3,
      Value::Null => 4,
    }
  }

  /// Total order over values. Null sorts after everything; values of
  /// different kinds order by kind.
  pub fn compare(&self, other: &Value) -> Ordering {
    match (self, other) {
      (Value::Text(a), Value::Text(b)) => locale_cmp(a, b),
      (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
      (Value::Date(a), Value::Date(b)) => a.timestamp_millis().cmp(&b.timestamp_millis()),
      _ => match (self.as_decimal(), other.as_decimal()) {
        (Some(a), Some(b)) => a.cmp(&b),
        _ => self.rank().cmp(&other.rank()),
      },
    }
  }
}

/// Locale-style string order, compared in three passes:
///
/// 1. base letters, ignoring accents and case (`é` sorts with `e`)
/// 2. accents, unaccented first
/// 3. case, lowercase first
pub fn locale_cmp(a: &str, b: &str) -> Ordering {
  let base = |s: &str| {
    s.nfd()
      .filter(|c| !is_combining_mark(*c))
      .flat_map(char::to_lowercase)
      .collect::<String>()
  };
  let accented = |s: &str| s.nfd().flat_map(char::to_lowercase).collect::<String>();

  base(a)
    .cmp(&base(b))
    .then_with(|| accented(a).cmp(&accented(b)))
    .then_with(|| b.nfd().cmp(a.nfd()))
}

impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Value::Null => write!(f, "(none)"),
      Value::Text(s) => write!(f, "{s}"),
      Value::Int(i) => write!(f, "{i}"),
      Value::Decimal(d) => write!(f, "{}", d.normalize()),
      Value::Bool(b) => write!(f, "{b}"),
      Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
    }
  }
}

impl From<String> for Value {
  fn from(s: String) -> Self {
    Value::Text(s)
  }
}

impl From<&str> for Value {
  fn from(s: &str) -> Self {
    Value::Text(s.to_string())
  }
}

impl From<bool> for Value {
  fn from(b: bool) -> Self {
    Value::Bool(b)
  }
}

impl From<i64> for Value {
  fn from(i: i64) -> Self {
    Value::Int(i)
  }
}

impl From<u32> for Value {
  fn from(i: u32) -> Self {
    Value::Int(i64::from(i))
  }
}

impl From<u64> for Value {
  fn from(i: u64) -> Self {
    match i64::try_from(i) {
      Ok(i) => Value::Int(i),
      Err(_) => Value::Decimal(Decimal::from(i)),
    }
  }
}

impl From<Decimal> for Value {
  fn from(d: Decimal) -> Self {
    Value::Decimal(d)
  }
}

impl From<DateTime<Utc>> for Value {
  fn from(d: DateTime<Utc>) -> Self {
    Value::Date(d)
  }
}

impl<V: Into<Value>> From<Option<V>> for Value {
  fn from(v: Option<V>) -> Self {
    v.map(Into::into).unwrap_or(Value::Null)
  }
}
