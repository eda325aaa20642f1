use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::is_blank;
use crate::cache::{Entity, EntityId};
use crate::error::ValidationError;
use crate::facade::EntityFacade;
use crate::service::{RestResource, Validate};
use crate::view::{Fields, Formatter, Present, Value};

// =============================================================================
// Coupon Types
// =============================================================================

/// How the discount value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CouponType {
  /// `discountValue` is a percentage of the order total
  Percentage,
  /// `discountValue` is an amount in the store currency
  FixedAmount,
}

impl CouponType {
  pub const fn as_str(self) -> &'static str {
    match self {
      Self::Percentage => "PERCENTAGE",
      Self::FixedAmount => "FIXED_AMOUNT",
    }
  }
}

impl std::fmt::Display for CouponType {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Percentage => write!(f, "Percentage"),
      Self::FixedAmount => write!(f, "Fixed amount"),
    }
  }
}

/// Redeemability at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CouponStatus {
  Active,
  Inactive,
  Scheduled,
  Expired,
  Exhausted,
}

impl std::fmt::Display for CouponStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Active => write!(f, "Active"),
      Self::Inactive => write!(f, "Inactive"),
      Self::Scheduled => write!(f, "Scheduled"),
      Self::Expired => write!(f, "Expired"),
      Self::Exhausted => write!(f, "Limit reached"),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
  pub id: EntityId,
  pub code: String,
  pub description: Option<String>,
  pub coupon_type: CouponType,
  pub discount_value: Decimal,
  pub minimum_order_amount: Option<Decimal>,
  pub maximum_discount_amount: Option<Decimal>,
  pub start_date: Option<DateTime<Utc>>,
  pub end_date: Option<DateTime<Utc>>,
  /// `None` means unlimited
  pub usage_limit: Option<u32>,
  #[serde(default)]
  pub used_count: u32,
  #[serde(default)]
  pub is_active: bool,
  pub created_at: Option<DateTime<Utc>>,
}

impl Coupon {
  pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
    self.end_date.is_some_and(|end| end < now)
  }

  pub fn is_scheduled(&self, now: DateTime<Utc>) -> bool {
    self.start_date.is_some_and(|start| start > now)
  }

  pub fn is_usage_exhausted(&self) -> bool {
    self.usage_limit.is_some_and(|limit| self.used_count >= limit)
  }

  /// Uses left before the limit; `None` when unlimited.
  pub fn remaining_uses(&self) -> Option<u32> {
    self
      .usage_limit
      .map(|limit| limit.saturating_sub(self.used_count))
  }

  pub fn status(&self, now: DateTime<Utc>) -> CouponStatus {
    if !self.is_active {
      CouponStatus::Inactive
    } else if self.is_expired(now) {
      CouponStatus::Expired
    } else if self.is_usage_exhausted() {
      CouponStatus::Exhausted
    } else if self.is_scheduled(now) {
      CouponStatus::Scheduled
    } else {
      CouponStatus::Active
    }
  }

  pub fn is_redeemable(&self, now: DateTime<Utc>) -> bool {
    self.status(now) == CouponStatus::Active
  }

  /// `15%` or `$10.00` depending on the coupon type.
  pub fn display_value(&self, fmt: &Formatter) -> String {
    match self.coupon_type {
      CouponType::Percentage => fmt.percent(self.discount_value),
      CouponType::FixedAmount => fmt.money(self.discount_value),
    }
  }
}

impl Entity for Coupon {
  fn id(&self) -> EntityId {
    self.id
  }

  fn entity_type() -> &'static str {
    "coupon"
  }

  fn toggled(&self) -> Option<Self> {
    Some(Coupon {
      is_active: !self.is_active,
      ..self.clone()
    })
  }
}

impl Fields for Coupon {
  const SEARCH_FIELDS: &'static [&'static str] = &["code", "description"];

  fn field(&self, key: &str) -> Value {
    match key {
      "id" => Value::from(self.id),
      "code" => Value::from(self.code.as_str()),
      "description" => Value::from(self.description.clone()),
      "couponType" => Value::from(self.coupon_type.as_str()),
      "discountValue" => Value::from(self.discount_value),
      "minimumOrderAmount" => Value::from(self.minimum_order_amount),
      "usageLimit" => Value::from(self.usage_limit),
      "usedCount" => Value::from(self.used_count),
      "usageExhausted" => Value::Bool(self.is_usage_exhausted()),
      "isActive" => Value::Bool(self.is_active),
      "startDate" => Value::from(self.start_date),
      "endDate" => Value::from(self.end_date),
      "createdAt" => Value::from(self.created_at),
      _ => Value::Null,
    }
  }
}

/// Display row for a coupon.
#[derive(Debug, Clone, PartialEq)]
pub struct CouponView {
  pub id: EntityId,
  pub code: String,
  pub value: String,
  pub status: CouponStatus,
  /// `3 / 100` or `3 / unlimited`
  pub usage: String,
  pub expires: Option<String>,
  pub minimum_order: Option<String>,
}

impl std::fmt::Display for CouponView {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(
      f,
      "#{:<6} {:<16} {:>10} {:<14} {:>16}",
      self.id,
      self.code,
      self.value,
      self.status.to_string(),
      self.usage
    )?;
    if let Some(minimum) = &self.minimum_order {
      write!(f, "  min {minimum}")?;
    }
    if let Some(expires) = &self.expires {
      write!(f, "  expires {expires}")?;
    }
    Ok(())
  }
}

impl Present for Coupon {
  type View = CouponView;

  fn present(&self, fmt: &Formatter) -> CouponView {
    let limit = self
      .usage_limit
      .map_or_else(|| "unlimited".to_string(), |l| l.to_string());
    CouponView {
      id: self.id,
      code: self.code.clone(),
      value: self.display_value(fmt),
      status: self.status(fmt.now()),
      usage: format!("{} / {}", self.used_count, limit),
      expires: self.end_date.map(|end| fmt.relative(end)),
      minimum_order: self.minimum_order_amount.map(|m| fmt.money(m)),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponPayload {
  pub code: String,
  pub description: Option<String>,
  pub coupon_type: CouponType,
  pub discount_value: Decimal,
  pub minimum_order_amount: Option<Decimal>,
  pub maximum_discount_amount: Option<Decimal>,
  pub start_date: Option<DateTime<Utc>>,
  pub end_date: Option<DateTime<Utc>>,
  pub usage_limit: Option<u32>,
  pub is_active: bool,
}

impl Validate for CouponPayload {
  fn validate(&self) -> Result<(), ValidationError> {
    if is_blank(&self.code) {
      return Err(ValidationError::Required { field: "code" });
    }

    match self.coupon_type {
      CouponType::Percentage => {
        if self.discount_value <= Decimal::ZERO || self.discount_value > Decimal::ONE_HUNDRED {
          return Err(ValidationError::PercentageOutOfRange(self.discount_value));
        }
      }
      CouponType::FixedAmount => {
        if self.discount_value <= Decimal::ZERO {
          return Err(ValidationError::NonPositiveAmount(self.discount_value));
        }
      }
    }

    if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
      if end <= start {
        return Err(ValidationError::InvalidDateRange);
      }
    }

    if self.minimum_order_amount.is_some_and(|m| m.is_sign_negative()) {
      return Err(ValidationError::Negative {
        field: "minimumOrderAmount",
      });
    }
    Ok(())
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponFilters {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub code: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub is_active: Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub coupon_type: Option<CouponType>,
}

pub type CouponResource = RestResource<Coupon, CouponPayload, CouponFilters>;

/// Coupons need nothing beyond the generic facade: their specialization is
/// in the derived flags and the presentation.
pub type CouponFacade<S> = EntityFacade<S>;
