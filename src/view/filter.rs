//! Conjunctive filters over entity fields.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::value::{Fields, Value};

/// Case-insensitive substring match over one or more text fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextMatch {
  /// Lowercased, trimmed query
  pub query: String,
  pub fields: Vec<String>,
}

/// Inclusive date-range containment. A missing bound is open.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DateRange {
  pub field: String,
  pub from: Option<DateTime<Utc>>,
  pub to: Option<DateTime<Utc>>,
}

/// Inclusive numeric range containment. A missing bound is open.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NumberRange {
  pub field: String,
  pub min: Option<Decimal>,
  pub max: Option<Decimal>,
}

/// A conjunction of independent predicates. Predicates that are not set
/// match everything, so `FilterSpec::default()` is the open filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FilterSpec {
  status: Option<(String, Value)>,
  text: Option<TextMatch>,
  dates: Option<DateRange>,
  numbers: Option<NumberRange>,
}

impl FilterSpec {
  pub fn new() -> Self {
    Self::default()
  }

  /// Require `field` to equal `value`.
  pub fn status(mut self, field: &str, value: impl Into<Value>) -> Self {
    self.status = Some((field.to_string(), value.into()));
    self
  }

  /// Require `query` to appear (ignoring case) in at least one of `fields`.
  /// A blank query clears the predicate.
  pub fn search<I, S>(mut self, query: &str, fields: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let query = query.trim().to_lowercase();
    self.text = (!query.is_empty()).then(|| TextMatch {
      query,
      fields: fields.into_iter().map(Into::into).collect(),
    });
    self
  }

  pub fn dates(mut self, field: &str, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
    self.dates = Some(DateRange {
      field: field.to_string(),
      from,
      to,
    });
    self
  }

  pub fn numbers(mut self, field: &str, min: Option<Decimal>, max: Option<Decimal>) -> Self {
    self.numbers = Some(NumberRange {
      field: field.to_string(),
      min,
      max,
    });
    self
  }

  /// True when no predicate is set.
  pub fn is_open(&self) -> bool {
    self.status.is_none() && self.text.is_none() && self.dates.is_none() && self.numbers.is_none()
  }

  pub fn matches<T: Fields>(&self, entity: &T) -> bool {
    self.matches_status(entity)
      && self.matches_text(entity)
      && self.matches_dates(entity)
      && self.matches_numbers(entity)
  }

  fn matches_status<T: Fields>(&self, entity: &T) -> bool {
    match &self.status {
      None => true,
      Some((field, expected)) => entity.field(field).loosely_eq(expected),
    }
  }

  fn matches_text<T: Fields>(&self, entity: &T) -> bool {
    let Some(text) = &self.text else {
      return true;
    };
    text.fields.iter().any(|field| {
      entity
        .field(field)
        .search_text()
        .is_some_and(|haystack| haystack.contains(&text.query))
    })
  }

  fn matches_dates<T: Fields>(&self, entity: &T) -> bool {
    let Some(range) = &self.dates else {
      return true;
    };
    if range.from.is_none() && range.to.is_none() {
      return true;
    }
    let Some(at) = entity.field(&range.field).as_date() else {
      return false;
    };
    let millis = at.timestamp_millis();
    range.from.map_or(true, |from| millis >= from.timestamp_millis())
      && range.to.map_or(true, |to| millis <= to.timestamp_millis())
  }

  fn matches_numbers<T: Fields>(&self, entity: &T) -> bool {
    let Some(range) = &self.numbers else {
      return true;
    };
    if range.min.is_none() && range.max.is_none() {
      return true;
    }
    let Some(n) = entity.field(&range.field).as_decimal() else {
      return false;
    };
    range.min.map_or(true, |min| n >= min) && range.max.map_or(true, |max| n <= max)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::fixtures::{item, named, Item};
  use chrono::TimeZone;

  fn dated(id: u64, month: u32) -> Item {
    Item {
      created: Some(Utc.with_ymd_and_hms(2024, month, 1, 0, 0, 0).unwrap()),
      ..item(id)
    }
  }

  fn priced(id: u64, cents: i64) -> Item {
    Item {
      price: Some(Decimal::new(cents, 2)),
      ..item(id)
    }
  }

  #[test]
  fn test_open_filter_matches_everything() {
    let spec = FilterSpec::new();
    assert!(spec.is_open());
    assert!(spec.matches(&item(1)));
    assert!(spec.matches(&named(2, None)));
  }

  #[test]
  fn test_status_equality() {
    let spec = FilterSpec::new().status("active", false);
    assert!(!spec.matches(&item(1)));
    assert!(spec.matches(&Item {
      active: false,
      ..item(1)
    }));
  }

  #[test]
  fn test_text_search_is_case_insensitive_across_fields() {
    let mut thing = named(1, Some("Acme Widgets"));
    thing.category = Some("Hardware".into());

    let by_name = FilterSpec::new().search("WIDGET", ["name", "category"]);
    let by_category = FilterSpec::new().search("hard", ["name", "category"]);
    let miss = FilterSpec::new().search("software", ["name", "category"]);

    assert!(by_name.matches(&thing));
    assert!(by_category.matches(&thing));
    assert!(!miss.matches(&thing));
    assert!(!by_name.matches(&named(2, None)));
  }

  #[test]
  fn test_blank_search_is_open() {
    let spec = FilterSpec::new().search("   ", ["name"]);
    assert!(spec.is_open());
  }

  #[test]
  fn test_date_range_is_inclusive() {
    let from = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
    let to = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
    let spec = FilterSpec::new().dates("created", Some(from), Some(to));

    assert!(!spec.matches(&dated(1, 1)));
    assert!(spec.matches(&dated(2, 2)));
    assert!(spec.matches(&dated(3, 4)));
    assert!(!spec.matches(&dated(4, 5)));
    assert!(!spec.matches(&item(5)));
  }

  #[test]
  fn test_half_open_number_range() {
    let spec = FilterSpec::new().numbers("price", Some(Decimal::new(1000, 2)), None);
    assert!(!spec.matches(&priced(1, 999)));
    assert!(spec.matches(&priced(2, 1000)));
    assert!(spec.matches(&priced(3, 500_000)));
  }

  #[test]
  fn test_predicates_are_conjunctive() {
    let spec = FilterSpec::new()
      .status("active", true)
      .numbers("price", None, Some(Decimal::new(2000, 2)));

    assert!(spec.matches(&priced(1, 1500)));
    assert!(!spec.matches(&priced(2, 2500)));
    assert!(!spec.matches(&Item {
      active: false,
      ..priced(3, 1500)
    }));
  }
}
