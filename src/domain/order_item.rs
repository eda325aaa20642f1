use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use crate::cache::{Entity, EntityId};
use crate::dispatch::Settled;
use crate::error::{ServiceError, ValidationError};
use crate::facade::{DomainFacade, EntityFacade};
use crate::query::Query;
use crate::service::{RemoteService, RestResource, Validate};
use crate::view::{Fields, Formatter, Present, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
  pub id: EntityId,
  pub order_id: EntityId,
  pub product_id: EntityId,
  pub variant_id: Option<EntityId>,
  pub product_name: String,
  pub variant_name: Option<String>,
  pub sku: Option<String>,
  pub quantity: u32,
  pub unit_price: Decimal,
  pub total_price: Decimal,
  pub created_at: Option<DateTime<Utc>>,
}

impl Entity for OrderItem {
  fn id(&self) -> EntityId {
    self.id
  }

  fn entity_type() -> &'static str {
    "order_item"
  }
}

impl Fields for OrderItem {
  const SEARCH_FIELDS: &'static [&'static str] = &["productName", "variantName", "sku"];

  fn field(&self, key: &str) -> Value {
    match key {
      "id" => Value::from(self.id),
      "orderId" => Value::from(self.order_id),
      "productId" => Value::from(self.product_id),
      "variantId" => Value::from(self.variant_id),
      "productName" => Value::from(self.product_name.as_str()),
      "variantName" => Value::from(self.variant_name.clone()),
      "sku" => Value::from(self.sku.clone()),
      "quantity" => Value::from(self.quantity),
      "unitPrice" => Value::from(self.unit_price),
      "totalPrice" => Value::from(self.total_price),
      "createdAt" => Value::from(self.created_at),
      _ => Value::Null,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderItemView {
  pub id: EntityId,
  pub order_id: EntityId,
  /// `Product (Variant)` or just the product name
  pub item: String,
  pub quantity: u32,
  pub unit_price: String,
  pub total: String,
  pub ordered: Option<String>,
}

impl std::fmt::Display for OrderItemView {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(
      f,
      "#{:<6} order #{:<6} {:<32} {:>4} x {:>10} = {:>10}",
      self.id, self.order_id, self.item, self.quantity, self.unit_price, self.total
    )?;
    if let Some(ordered) = &self.ordered {
      write!(f, "  {ordered}")?;
    }
    Ok(())
  }
}

impl Present for OrderItem {
  type View = OrderItemView;

  fn present(&self, fmt: &Formatter) -> OrderItemView {
    let item = match &self.variant_name {
      Some(variant) => format!("{} ({})", self.product_name, variant),
      None => self.product_name.clone(),
    };
    OrderItemView {
      id: self.id,
      order_id: self.order_id,
      item,
      quantity: self.quantity,
      unit_price: fmt.money(self.unit_price),
      total: fmt.money(self.total_price),
      ordered: self.created_at.map(|at| fmt.date(at)),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemPayload {
  pub order_id: EntityId,
  pub product_id: EntityId,
  pub variant_id: Option<EntityId>,
  pub quantity: u32,
  pub unit_price: Decimal,
}

impl Validate for OrderItemPayload {
  fn validate(&self) -> Result<(), ValidationError> {
    if self.quantity == 0 {
      return Err(ValidationError::ZeroQuantity);
    }
    if self.unit_price.is_sign_negative() {
      return Err(ValidationError::Negative { field: "unitPrice" });
    }
    Ok(())
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemFilters {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub order_id: Option<EntityId>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub product_id: Option<EntityId>,
}

// =============================================================================
// Aggregates
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BestSeller {
  pub product_id: EntityId,
  pub product_name: String,
  pub total_quantity: u64,
  pub total_revenue: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSales {
  pub product_id: EntityId,
  pub total_quantity: u64,
  pub total_revenue: Decimal,
  #[serde(default)]
  pub order_count: u64,
}

#[async_trait]
pub trait OrderItemService: RemoteService<Entity = OrderItem> {
  async fn bestsellers(&self, limit: u32) -> Result<Vec<BestSeller>, ServiceError>;

  async fn product_sales(&self, product_id: EntityId) -> Result<ProductSales, ServiceError>;
}

pub type OrderItemResource = RestResource<OrderItem, OrderItemPayload, OrderItemFilters>;

#[async_trait]
impl OrderItemService for OrderItemResource {
  async fn bestsellers(&self, limit: u32) -> Result<Vec<BestSeller>, ServiceError> {
    self
      .client()
      .get(&format!("{}/bestsellers", self.path()), &[("limit", limit)])
      .await
  }

  async fn product_sales(&self, product_id: EntityId) -> Result<ProductSales, ServiceError> {
    self
      .client()
      .get(&format!("{}/products/{}/sales", self.path(), product_id), &())
      .await
  }
}

/// Order item facade: the paged list plus read-only aggregates.
///
/// Aggregates are never invalidated by list mutations; they change only on
/// an explicit refetch.
pub struct OrderItemFacade<S: OrderItemService> {
  inner: EntityFacade<S>,
  bestsellers: Query<Vec<BestSeller>>,
  sales: HashMap<EntityId, Query<ProductSales>>,
}

impl<S: OrderItemService> OrderItemFacade<S> {
  pub fn new(inner: EntityFacade<S>, bestseller_limit: u32) -> Self {
    let service = Arc::clone(inner.service());
    let bestsellers = Query::new(move || {
      let service = Arc::clone(&service);
      async move { service.bestsellers(bestseller_limit).await }
    });
    Self {
      inner,
      bestsellers,
      sales: HashMap::new(),
    }
  }

  pub fn bestsellers(&self) -> &Query<Vec<BestSeller>> {
    &self.bestsellers
  }

  /// Fetch best sellers once; later calls are no-ops while data exists.
  pub fn load_bestsellers(&mut self) {
    if self.bestsellers.data().is_none() {
      self.bestsellers.fetch();
    }
  }

  pub fn refetch_bestsellers(&mut self) {
    self.bestsellers.refetch();
  }

  pub fn product_sales(&self, product_id: EntityId) -> Option<&Query<ProductSales>> {
    self.sales.get(&product_id)
  }

  /// Start loading a product's sales unless already known.
  pub fn load_product_sales(&mut self, product_id: EntityId) {
    let service = Arc::clone(self.inner.service());
    let query = self.sales.entry(product_id).or_insert_with(|| {
      Query::new(move || {
        let service = Arc::clone(&service);
        async move { service.product_sales(product_id).await }
      })
    });
    if query.data().is_none() {
      query.fetch();
    }
  }

  pub fn refetch_product_sales(&mut self, product_id: EntityId) {
    match self.sales.get_mut(&product_id) {
      Some(query) => query.refetch(),
      None => self.load_product_sales(product_id),
    }
  }

  /// Apply resolved list results and move finished aggregate fetches into
  /// their queries. The second value is true if any aggregate changed.
  pub fn poll(&mut self) -> (Vec<Settled>, bool) {
    let settled = self.inner.poll();
    let mut changed = self.bestsellers.poll();
    for query in self.sales.values_mut() {
      changed |= query.poll();
    }
    (settled, changed)
  }

  /// Wait for every outstanding list call and aggregate fetch.
  pub async fn settle(&mut self) -> Vec<Settled> {
    let settled = self.inner.settle().await;
    if self.bestsellers.is_loading() {
      self.bestsellers.settle().await;
    }
    for query in self.sales.values_mut() {
      if query.is_loading() {
        query.settle().await;
      }
    }
    settled
  }
}

impl<S: OrderItemService> DomainFacade for OrderItemFacade<S> {
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

impl<S: OrderItemService> Deref for OrderItemFacade<S> {
  type Target = EntityFacade<S>;

  fn deref(&self) -> &Self::Target {
    &self.inner
  }
}

impl<S: OrderItemService> DerefMut for OrderItemFacade<S> {
  fn deref_mut(&mut self) -> &mut Self::Target {
    &mut self.inner
  }
}
