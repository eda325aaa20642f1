//! Product variants and the stock side caches.
//!
//! Besides the paged list, the inventory screens show two short lists:
//! variants running low and variants out of stock. Both are owned by the
//! variant facade and patched in the same step as the main cache whenever a
//! stock change (or any other confirmed write) comes back, so a variant
//! never shows one quantity in the table and another in the alerts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use super::{blank_as_none, bump_images, is_blank};
use crate::cache::{Entity, EntityCache, EntityId, Mutation, Patch};
use crate::dispatch::{Intent, Settled, Ticket};
use crate::error::{ServiceError, ValidationError};
use crate::facade::{DomainFacade, EntityFacade};
use crate::service::{RemoteService, RestResource, Validate};
use crate::view::{Fields, Formatter, ImageVersions, Present, Value};

const LOW_STOCK: &str = "low-stock";
const OUT_OF_STOCK: &str = "out-of-stock";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductVariant {
  pub id: EntityId,
  pub product_id: EntityId,
  pub sku: String,
  pub name: String,
  pub price: Decimal,
  pub compare_at_price: Option<Decimal>,
  #[serde(default)]
  pub stock_quantity: u32,
  #[serde(default, deserialize_with = "blank_as_none")]
  pub image_url: Option<String>,
  #[serde(default)]
  pub is_active: bool,
  pub created_at: Option<DateTime<Utc>>,
  pub updated_at: Option<DateTime<Utc>>,
}

/// Where a quantity falls relative to the low-stock threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StockLevel {
  OutOfStock,
  Low,
  InStock,
}

impl StockLevel {
  pub fn of(quantity: u32, threshold: u32) -> Self {
    if quantity == 0 {
      StockLevel::OutOfStock
    } else if quantity <= threshold {
      StockLevel::Low
    } else {
      StockLevel::InStock
    }
  }
}

impl ProductVariant {
  pub fn stock_level(&self, threshold: u32) -> StockLevel {
    StockLevel::of(self.stock_quantity, threshold)
  }

  /// Percentage off the compare-at price, if the variant is discounted.
  pub fn discount_percent(&self) -> Option<Decimal> {
    let compare = self.compare_at_price.filter(|c| *c > self.price && !c.is_zero())?;
    Some(((compare - self.price) / compare * Decimal::ONE_HUNDRED).round_dp(0))
  }
}

impl Entity for ProductVariant {
  fn id(&self) -> EntityId {
    self.id
  }

  fn entity_type() -> &'static str {
    "variant"
  }

  fn toggled(&self) -> Option<Self> {
    Some(ProductVariant {
      is_active: !self.is_active,
      ..self.clone()
    })
  }
}

impl Fields for ProductVariant {
  const SEARCH_FIELDS: &'static [&'static str] = &["sku", "name"];

  fn field(&self, key: &str) -> Value {
    match key {
      "id" => Value::from(self.id),
      "productId" => Value::from(self.product_id),
      "sku" => Value::from(self.sku.as_str()),
      "name" => Value::from(self.name.as_str()),
      "price" => Value::from(self.price),
      "compareAtPrice" => Value::from(self.compare_at_price),
      "stockQuantity" => Value::from(self.stock_quantity),
      "isActive" => Value::Bool(self.is_active),
      "createdAt" => Value::from(self.created_at),
      "updatedAt" => Value::from(self.updated_at),
      _ => Value::Null,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariantView {
  pub id: EntityId,
  pub sku: String,
  pub name: String,
  pub price: String,
  pub compare_at: Option<String>,
  pub discount: Option<String>,
  pub stock: String,
}

impl std::fmt::Display for VariantView {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "#{:<6} {:<14} {:<28} {:>10}", self.id, self.sku, self.name, self.price)?;
    if let (Some(compare_at), Some(discount)) = (&self.compare_at, &self.discount) {
      write!(f, " (was {compare_at}, -{discount})")?;
    }
    write!(f, "  {}", self.stock)
  }
}

impl Present for ProductVariant {
  type View = VariantView;

  fn present(&self, fmt: &Formatter) -> VariantView {
    VariantView {
      id: self.id,
      sku: self.sku.clone(),
      name: self.name.clone(),
      price: fmt.money(self.price),
      compare_at: self.compare_at_price.map(|c| fmt.money(c)),
      discount: self.discount_percent().map(|d| fmt.percent(d)),
      stock: match self.stock_quantity {
        0 => "Out of stock".to_string(),
        n => format!("{n} in stock"),
      },
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantPayload {
  pub product_id: EntityId,
  pub sku: String,
  pub name: String,
  pub price: Decimal,
  pub compare_at_price: Option<Decimal>,
  pub stock_quantity: i64,
  pub image_url: Option<String>,
  pub is_active: bool,
}

impl Validate for VariantPayload {
  fn validate(&self) -> Result<(), ValidationError> {
    if is_blank(&self.sku) {
      return Err(ValidationError::Required { field: "sku" });
    }
    if is_blank(&self.name) {
      return Err(ValidationError::Required { field: "name" });
    }
    if self.price.is_sign_negative() {
      return Err(ValidationError::Negative { field: "price" });
    }
    if self.stock_quantity < 0 {
      return Err(ValidationError::Negative {
        field: "stockQuantity",
      });
    }
    Ok(())
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantFilters {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub product_id: Option<EntityId>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub sku: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub is_active: Option<bool>,
}

// =============================================================================
// Service
// =============================================================================

/// Stock endpoints on top of the variant CRUD.
#[async_trait]
pub trait VariantService: RemoteService<Entity = ProductVariant> {
  async fn update_stock(&self, id: EntityId, quantity: u32) -> Result<ProductVariant, ServiceError>;

  async fn low_stock(&self, threshold: u32) -> Result<Vec<ProductVariant>, ServiceError>;

  async fn out_of_stock(&self) -> Result<Vec<ProductVariant>, ServiceError>;
}

pub type VariantResource = RestResource<ProductVariant, VariantPayload, VariantFilters>;

#[async_trait]
impl VariantService for VariantResource {
  async fn update_stock(&self, id: EntityId, quantity: u32) -> Result<ProductVariant, ServiceError> {
    self
      .client()
      .patch(&self.item_path(id, "stock"), &[("quantity", quantity)])
      .await
  }

  async fn low_stock(&self, threshold: u32) -> Result<Vec<ProductVariant>, ServiceError> {
    self
      .client()
      .get(&format!("{}/low-stock", self.path()), &[("threshold", threshold)])
      .await
  }

  async fn out_of_stock(&self) -> Result<Vec<ProductVariant>, ServiceError> {
    self
      .client()
      .get(&format!("{}/out-of-stock", self.path()), &())
      .await
  }
}

// =============================================================================
// Side caches
// =============================================================================

/// Low-stock (`0 < qty <= threshold`) and out-of-stock (`qty == 0`) lists.
#[derive(Debug, Clone)]
pub struct StockSideCaches {
  threshold: u32,
  low: Vec<ProductVariant>,
  out: Vec<ProductVariant>,
}

impl StockSideCaches {
  pub fn new(threshold: u32) -> Self {
    Self {
      threshold,
      low: Vec::new(),
      out: Vec::new(),
    }
  }

  pub fn threshold(&self) -> u32 {
    self.threshold
  }

  pub fn low(&self) -> &[ProductVariant] {
    &self.low
  }

  pub fn out(&self) -> &[ProductVariant] {
    &self.out
  }

  /// Replace a list wholesale after it was fetched. Entries that do not
  /// belong to the list are dropped.
  pub fn replace(&mut self, label: &str, items: Vec<ProductVariant>) -> Patch {
    let threshold = self.threshold;
    let (list, level) = match label {
      LOW_STOCK => (&mut self.low, StockLevel::Low),
      OUT_OF_STOCK => (&mut self.out, StockLevel::OutOfStock),
      _ => return Patch::Unchanged,
    };
    *list = items
      .into_iter()
      .filter(|v| v.stock_level(threshold) == level)
      .collect();
    Patch::Applied
  }

  /// Move, insert or remove `variant` so each list holds exactly the
  /// variants at its level. An entry already in the right list keeps its
  /// position.
  pub fn place(&mut self, variant: &ProductVariant) -> Patch {
    let level = variant.stock_level(self.threshold);
    let mut patch = Patch::Unchanged;
    for (list, list_level) in [(&mut self.low, StockLevel::Low), (&mut self.out, StockLevel::OutOfStock)] {
      let position = list.iter().position(|v| v.id == variant.id);
      let change = match (position, level == list_level) {
        (Some(idx), true) if list[idx] != *variant => {
          list[idx] = variant.clone();
          Patch::Applied
        }
        (Some(idx), false) => {
          list.remove(idx);
          Patch::Applied
        }
        (None, true) => {
          list.insert(0, variant.clone());
          Patch::Applied
        }
        _ => Patch::Unchanged,
      };
      patch = patch.or(change);
    }
    patch
  }

  pub fn remove(&mut self, id: EntityId) -> Patch {
    let before = self.low.len() + self.out.len();
    self.low.retain(|v| v.id != id);
    self.out.retain(|v| v.id != id);
    if self.low.len() + self.out.len() == before {
      Patch::Unchanged
    } else {
      Patch::Applied
    }
  }

  /// Keep a toggled status in sync with the main cache.
  pub fn toggle(&mut self, id: EntityId) -> Patch {
    let mut patch = Patch::Unchanged;
    for variant in self.low.iter_mut().chain(self.out.iter_mut()) {
      if variant.id == id {
        variant.is_active = !variant.is_active;
        patch = Patch::Applied;
      }
    }
    patch
  }

  /// Fold one result: side-list fetches replace a list, writes move the
  /// variant between lists, then the main cache takes its share.
  pub fn fold(&mut self, cache: &mut EntityCache<ProductVariant>, mutation: Mutation<ProductVariant>) -> Patch {
    match mutation {
      Mutation::Side { label, items } => self.replace(label, items),
      other => {
        let side = match &other {
          Mutation::Updated(v) | Mutation::Patched(v) | Mutation::Created(v) | Mutation::Detail(v) => self.place(v),
          Mutation::Deleted(id) => self.remove(*id),
          Mutation::Toggled(id) => self.toggle(*id),
          Mutation::Fetched(_) | Mutation::Side { .. } => Patch::Unchanged,
        };
        cache.apply(other).or(side)
      }
    }
  }
}

// =============================================================================
// Facade
// =============================================================================

pub struct VariantFacade<S: VariantService> {
  inner: EntityFacade<S>,
  stock: StockSideCaches,
  images: ImageVersions,
}

impl<S: VariantService> VariantFacade<S> {
  pub fn new(inner: EntityFacade<S>, low_stock_threshold: u32) -> Self {
    Self {
      inner,
      stock: StockSideCaches::new(low_stock_threshold),
      images: ImageVersions::new(),
    }
  }

  pub fn stock(&self) -> &StockSideCaches {
    &self.stock
  }

  pub fn low_stock(&self) -> &[ProductVariant] {
    self.stock.low()
  }

  pub fn out_of_stock(&self) -> &[ProductVariant] {
    self.stock.out()
  }

  /// Set a variant's stock. Negative quantities are rejected locally.
  pub fn update_stock(&mut self, id: EntityId, quantity: i64) -> Result<Ticket, ValidationError> {
    let quantity = u32::try_from(quantity).map_err(|_| ValidationError::Negative {
      field: "stockQuantity",
    })?;
    let service = Arc::clone(self.inner.service());
    Ok(self.inner.dispatch(Intent::Custom("update-stock"), async move {
      service.update_stock(id, quantity).await.map(Mutation::Patched)
    }))
  }

  pub fn refresh_low_stock(&mut self) -> Ticket {
    let service = Arc::clone(self.inner.service());
    let threshold = self.stock.threshold();
    self.inner.dispatch(Intent::Custom(LOW_STOCK), async move {
      let items = service.low_stock(threshold).await?;
      Ok(Mutation::Side {
        label: LOW_STOCK,
        items,
      })
    })
  }

  pub fn refresh_out_of_stock(&mut self) -> Ticket {
    let service = Arc::clone(self.inner.service());
    self.inner.dispatch(Intent::Custom(OUT_OF_STOCK), async move {
      let items = service.out_of_stock().await?;
      Ok(Mutation::Side {
        label: OUT_OF_STOCK,
        items,
      })
    })
  }

  pub fn image_url(&self, variant: &ProductVariant) -> Option<String> {
    variant
      .image_url
      .as_deref()
      .map(|url| self.images.display_url(url, variant.id))
  }

  pub fn refresh_image(&mut self, id: EntityId) {
    self.images.bump(id);
  }

  pub fn poll(&mut self) -> Vec<Settled> {
    let (stock, images) = (&mut self.stock, &mut self.images);
    self.inner.poll_with(|cache, m| {
      bump_images(images, &m);
      stock.fold(cache, m)
    })
  }

  pub async fn settle(&mut self) -> Vec<Settled> {
    let (stock, images) = (&mut self.stock, &mut self.images);
    self
      .inner
      .settle_with(|cache, m| {
        bump_images(images, &m);
        stock.fold(cache, m)
      })
      .await
  }
}

impl<S: VariantService> DomainFacade for VariantFacade<S> {
  type Service = S;

  fn entities(&self) -> &EntityFacade<S> {
    &self.inner
  }

  fn entities_mut(&mut self) -> &mut EntityFacade<S> {
    &mut self.inner
  }

  async fn settle_all(&mut self) -> Vec<Settled> {
    self.settle().await
  }
}

impl<S: VariantService> Deref for VariantFacade<S> {
  type Target = EntityFacade<S>;

  fn deref(&self) -> &Self::Target {
    &self.inner
  }
}

impl<S: VariantService> DerefMut for VariantFacade<S> {
  fn deref_mut(&mut self) -> &mut Self::Target {
    &mut self.inner
  }
}
