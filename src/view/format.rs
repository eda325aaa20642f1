//! Presentation-only formatting: money, percentages and relative dates.

use chrono::{DateTime, Utc};
use chrono_humanize::HumanTime;
use num_format::{Locale, ToFormattedString};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// ISO 4217 currency codes the dashboard can display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Currency {
  #[default]
  USD,
  EUR,
  GBP,
  CAD,
  AUD,
}

impl Currency {
  pub fn symbol(&self) -> &'static str {
    match self {
      Self::USD | Self::CAD | Self::AUD => "$",
      Self::EUR => "€",
      Self::GBP => "£",
    }
  }

  pub fn code(&self) -> &'static str {
    match self {
      Self::USD => "USD",
      Self::EUR => "EUR",
      Self::GBP => "GBP",
      Self::CAD => "CAD",
      Self::AUD => "AUD",
    }
  }
}

/// Formatting context: display currency and the instant relative dates are
/// measured from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Formatter {
  currency: Currency,
  now: DateTime<Utc>,
}

impl Formatter {
  pub fn new(currency: Currency) -> Self {
    Self {
      currency,
      now: Utc::now(),
    }
  }

  /// Same formatter, measuring relative dates from `now`.
  pub fn at(self, now: DateTime<Utc>) -> Self {
    Self { now, ..self }
  }

  pub fn now(&self) -> DateTime<Utc> {
    self.now
  }

  pub fn currency(&self) -> Currency {
    self.currency
  }

  /// `1234.5` → `$1,234.50`, `-5` → `-$5.00`.
  pub fn money(&self, amount: Decimal) -> String {
    let rounded = format!("{:.2}", amount.abs().round_dp(2));
    let (whole, cents) = rounded.split_once('.').unwrap_or((rounded.as_str(), "00"));
    let sign = if amount.is_sign_negative() && !amount.is_zero() {
      "-"
    } else {
      ""
    };
    format!(
      "{sign}{}{}.{cents}",
      self.currency.symbol(),
      group_thousands(whole)
    )
  }

  /// `15` → `15%`, `12.50` → `12.5%`.
  pub fn percent(&self, value: Decimal) -> String {
    format!("{}%", value.normalize())
  }

  /// `in 3 days`, `2 hours ago`, `now`.
  pub fn relative(&self, at: DateTime<Utc>) -> String {
    HumanTime::from(at - self.now).to_string()
  }

  pub fn date(&self, at: DateTime<Utc>) -> String {
    at.format("%b %-d, %Y").to_string()
  }
}

impl Default for Formatter {
  fn default() -> Self {
    Self::new(Currency::default())
  }
}

fn group_thousands(digits: &str) -> String {
  match digits.parse::<u128>() {
    Ok(n) => n.to_formatted_string(&Locale::en),
    Err(_) => digits.to_string(),
  }
}

/// Entities that have a presentation form.
///
/// Presenting builds a new value; the cached entity is never touched.
pub trait Present {
  type View: Clone + Send + Sync + 'static;

  fn present(&self, fmt: &Formatter) -> Self::View;
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::{Duration, TimeZone};

  fn fmt() -> Formatter {
    Formatter::new(Currency::USD).at(Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap())
  }

  #[test]
  fn test_money() {
    let f = fmt();
    assert_eq!(f.money(Decimal::new(123450, 2)), "$1,234.50");
    assert_eq!(f.money(Decimal::new(5, 0)), "$5.00");
    assert_eq!(f.money(Decimal::new(-5, 0)), "-$5.00");
    assert_eq!(f.money(Decimal::new(99999, 3)), "$100.00");
    assert_eq!(f.money(Decimal::new(100000000, 0)), "$100,000,000.00");
    assert_eq!(f.money(Decimal::ZERO), "$0.00");
  }

  #[test]
  fn test_money_uses_currency_symbol() {
    let f = Formatter::new(Currency::EUR);
    assert_eq!(f.money(Decimal::new(1999, 2)), "€19.99");
  }

  #[test]
  fn test_percent() {
    let f = fmt();
    assert_eq!(f.percent(Decimal::new(15, 0)), "15%");
    assert_eq!(f.percent(Decimal::new(1250, 2)), "12.5%");
  }

  #[test]
  fn test_relative_dates() {
    let f = fmt();
    assert_eq!(f.relative(f.now() + Duration::days(3)), "in 3 days");
    assert_eq!(f.relative(f.now() - Duration::days(2)), "2 days ago");
  }

  #[test]
  fn test_date() {
    let f = fmt();
    assert_eq!(f.date(f.now()), "Jun 15, 2024");
  }

  #[test]
  fn test_group_thousands() {
    assert_eq!(group_thousands("1"), "1");
    assert_eq!(group_thousands("123"), "123");
    assert_eq!(group_thousands("1234"), "1,234");
    assert_eq!(group_thousands("1234567"), "1,234,567");
  }
}
