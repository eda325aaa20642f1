//! User addresses and the single-default rule.
//!
//! A user has at most one default address. The server enforces this on its
//! side; the cache mirrors it locally by clearing every other default in the
//! same step as applying a result that carries `isDefault = true`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use super::{blank_as_none, is_blank};
use crate::cache::{Entity, EntityCache, EntityId, Mutation, Patch};
use crate::dispatch::{Intent, Settled, Ticket};
use crate::error::{ServiceError, ValidationError};
use crate::facade::{DomainFacade, EntityFacade};
use crate::service::{RemoteService, RestResource, Validate};
use crate::view::{Fields, Formatter, Present, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
  pub id: EntityId,
  pub user_id: EntityId,
  pub full_name: String,
  #[serde(default, deserialize_with = "blank_as_none")]
  pub phone: Option<String>,
  pub address_line1: String,
  #[serde(default, deserialize_with = "blank_as_none")]
  pub address_line2: Option<String>,
  pub city: String,
  #[serde(default, deserialize_with = "blank_as_none")]
  pub state: Option<String>,
  pub postal_code: String,
  pub country: String,
  #[serde(default)]
  pub is_default: bool,
  pub created_at: Option<DateTime<Utc>>,
}

impl Address {
  /// Single-line form, e.g. `1 Main St, Apt 2, Springfield, IL 62701, US`.
  pub fn one_line(&self) -> String {
    let region = match &self.state {
      Some(state) => format!("{} {}", state, self.postal_code),
      None => self.postal_code.clone(),
    };
    [
      Some(self.address_line1.as_str()),
      self.address_line2.as_deref(),
      Some(self.city.as_str()),
      Some(region.as_str()),
      Some(self.country.as_str()),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(", ")
  }
}

impl Entity for Address {
  fn id(&self) -> EntityId {
    self.id
  }

  fn entity_type() -> &'static str {
    "address"
  }
}

impl Fields for Address {
  const SEARCH_FIELDS: &'static [&'static str] = &["fullName", "addressLine1", "city", "postalCode"];

  fn field(&self, key: &str) -> Value {
    match key {
      "id" => Value::from(self.id),
      "userId" => Value::from(self.user_id),
      "fullName" => Value::from(self.full_name.as_str()),
      "phone" => Value::from(self.phone.clone()),
      "addressLine1" => Value::from(self.address_line1.as_str()),
      "addressLine2" => Value::from(self.address_line2.clone()),
      "city" => Value::from(self.city.as_str()),
      "state" => Value::from(self.state.clone()),
      "postalCode" => Value::from(self.postal_code.as_str()),
      "country" => Value::from(self.country.as_str()),
      "isDefault" => Value::Bool(self.is_default),
      "createdAt" => Value::from(self.created_at),
      _ => Value::Null,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AddressView {
  pub id: EntityId,
  pub name: String,
  pub address: String,
  pub is_default: bool,
  pub added: Option<String>,
}

impl std::fmt::Display for AddressView {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let marker = if self.is_default { "*" } else { " " };
    write!(f, "{marker} #{:<6} {:<24} {}", self.id, self.name, self.address)
  }
}

impl Present for Address {
  type View = AddressView;

  fn present(&self, fmt: &Formatter) -> AddressView {
    AddressView {
      id: self.id,
      name: self.full_name.clone(),
      address: self.one_line(),
      is_default: self.is_default,
      added: self.created_at.map(|at| fmt.date(at)),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressPayload {
  pub user_id: EntityId,
  pub full_name: String,
  pub phone: Option<String>,
  pub address_line1: String,
  pub address_line2: Option<String>,
  pub city: String,
  pub state: Option<String>,
  pub postal_code: String,
  pub country: String,
  pub is_default: bool,
}

impl Validate for AddressPayload {
  fn validate(&self) -> Result<(), ValidationError> {
    let required = [
      ("fullName", &self.full_name),
      ("addressLine1", &self.address_line1),
      ("city", &self.city),
      ("postalCode", &self.postal_code),
      ("country", &self.country),
    ];
    match required.into_iter().find(|(_, value)| is_blank(value)) {
      Some((field, _)) => Err(ValidationError::Required { field }),
      None => Ok(()),
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressFilters {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub user_id: Option<EntityId>,
}

#[async_trait]
pub trait AddressService: RemoteService<Entity = Address> {
  /// Make `id` its user's default address; answers with the updated address.
  async fn set_default(&self, id: EntityId) -> Result<Address, ServiceError>;
}

pub type AddressResource = RestResource<Address, AddressPayload, AddressFilters>;

#[async_trait]
impl AddressService for AddressResource {
  async fn set_default(&self, id: EntityId) -> Result<Address, ServiceError> {
    self.client().patch(&self.item_path(id, "default"), &()).await
  }
}

/// Fold a result, clearing every other default first when it carries the
/// default flag.
pub fn fold(cache: &mut EntityCache<Address>, mutation: Mutation<Address>) -> Patch {
  let new_default = match &mutation {
    Mutation::Created(a) | Mutation::Updated(a) | Mutation::Patched(a) | Mutation::Detail(a) if a.is_default => {
      Some(a.id)
    }
    _ => None,
  };

  let cleared = match new_default {
    Some(id) => cache.rewrite(|other| {
      (other.id != id && other.is_default).then(|| Address {
        is_default: false,
        ..other.clone()
      })
    }),
    None => Patch::Unchanged,
  };

  cache.apply(mutation).or(cleared)
}

/// Addresses of one user.
pub struct AddressFacade<S: AddressService> {
  inner: EntityFacade<S>,
  user_id: EntityId,
}

impl<S: AddressService<Filters = AddressFilters>> AddressFacade<S> {
  pub fn new(service: Arc<S>, user_id: EntityId, page_size: u32) -> Self {
    Self::scoped(EntityFacade::new(service, page_size), user_id)
  }

  /// Scope an already configured facade to one user's addresses.
  pub fn scoped(inner: EntityFacade<S>, user_id: EntityId) -> Self {
    let inner = inner.with_query(AddressFilters {
      user_id: Some(user_id),
    });
    Self { inner, user_id }
  }
}

impl<S: AddressService> AddressFacade<S> {
  pub fn user_id(&self) -> EntityId {
    self.user_id
  }

  pub fn default_address(&self) -> Option<&Address> {
    self
      .inner
      .page()
      .content()
      .iter()
      .find(|a| a.is_default)
      .or_else(|| self.inner.current().filter(|a| a.is_default))
  }

  pub fn set_default(&mut self, id: EntityId) -> Ticket {
    let service = Arc::clone(self.inner.service());
    self.inner.dispatch(Intent::Custom("set-default"), async move {
      service.set_default(id).await.map(Mutation::Patched)
    })
  }

  pub fn poll(&mut self) -> Vec<Settled> {
    self.inner.poll_with(fold)
  }

  pub async fn settle(&mut self) -> Vec<Settled> {
    self.inner.settle_with(fold).await
  }
}

impl<S: AddressService> DomainFacade for AddressFacade<S> {
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

impl<S: AddressService> Deref for AddressFacade<S> {
  type Target = EntityFacade<S>;

  fn deref(&self) -> &Self::Target {
    &self.inner
  }
}

impl<S: AddressService> DerefMut for AddressFacade<S> {
  fn deref_mut(&mut self) -> &mut Self::Target {
    &mut self.inner
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::Page;
  use crate::service::fake::{not_found, FakeService};
  use pretty_assertions::assert_eq;

  type Fake = FakeService<Address, AddressPayload, AddressFilters>;

  #[async_trait]
  impl AddressService for Fake {
    async fn set_default(&self, id: EntityId) -> Result<Address, ServiceError> {
      self.begin(format!("default {id}")).await?;
      let target = self.row(id).ok_or_else(|| not_found(id))?;
      for mut row in self.rows() {
        row.is_default = row.id == id;
        self.upsert(row);
      }
      Ok(Address {
        is_default: true,
        ..target
      })
    }
  }

  fn address(id: EntityId, is_default: bool) -> Address {
    Address {
      id,
      user_id: 1,
      full_name: "Ada Lovelace".to_string(),
      phone: None,
      address_line1: format!("{id} Main St"),
      address_line2: None,
      city: "Springfield".to_string(),
      state: Some("IL".to_string()),
      postal_code: "62701".to_string(),
      country: "US".to_string(),
      is_default,
      created_at: None,
    }
  }

  fn payload(is_default: bool) -> AddressPayload {
    AddressPayload {
      user_id: 1,
      full_name: "Ada Lovelace".to_string(),
      phone: None,
      address_line1: "9 Side Rd".to_string(),
      address_line2: None,
      city: "Springfield".to_string(),
      state: None,
      postal_code: "62702".to_string(),
      country: "US".to_string(),
      is_default,
    }
  }

  fn build(id: EntityId, p: &AddressPayload) -> Address {
    Address {
      address_line1: p.address_line1.clone(),
      postal_code: p.postal_code.clone(),
      state: p.state.clone(),
      ..address(id, p.is_default)
    }
  }

  async fn loaded(rows: Vec<Address>) -> (Arc<Fake>, AddressFacade<Fake>) {
    let service = Arc::new(FakeService::new(rows, build));
    let mut facade = AddressFacade::new(Arc::clone(&service), 1, 10);
    facade.refresh();
    facade.settle().await;
    (service, facade)
  }

  fn defaults(facade: &AddressFacade<Fake>) -> Vec<EntityId> {
    facade.page().content().iter().filter(|a| a.is_default).map(|a| a.id).collect()
  }

  #[test]
  fn test_one_line() {
    let mut a = address(1, false);
    a.address_line2 = Some("Apt 2".to_string());
    assert_eq!(a.one_line(), "1 Main St, Apt 2, Springfield, IL 62701, US");
    a.state = None;
    a.address_line2 = None;
    assert_eq!(a.one_line(), "1 Main St, Springfield, 62701, US");
  }

  #[test]
  fn test_payload_requires_fields() {
    let mut p = payload(false);
    assert_eq!(p.validate(), Ok(()));
    p.city = "  ".to_string();
    assert_eq!(p.validate(), Err(ValidationError::Required { field: "city" }));
  }

  #[test]
  fn test_fold_clears_other_defaults_on_page_and_current() {
    let mut cache = EntityCache::new(10);
    cache.replace_page(Page::new(vec![address(1, false), address(2, true)], 0, 10, 2));
    cache.set_current(Some(address(2, true)));

    let patch = fold(&mut cache, Mutation::Updated(address(1, true)));
    assert_eq!(patch, Patch::Applied);
    let flags: Vec<_> = cache.page().content().iter().map(|a| (a.id, a.is_default)).collect();
    assert_eq!(flags, vec![(1, true), (2, false)]);
    assert_eq!(cache.current().map(|a| a.is_default), Some(false));
  }

  #[test]
  fn test_fold_detail_with_default_clears_siblings() {
    let mut cache = EntityCache::new(10);
    cache.replace_page(Page::new(vec![address(1, false), address(2, true)], 0, 10, 2));

    fold(&mut cache, Mutation::Detail(address(1, true)));
    let flags: Vec<_> = cache.page().content().iter().map(|a| (a.id, a.is_default)).collect();
    assert_eq!(flags, vec![(1, true), (2, false)]);
    assert_eq!(cache.current().map(|a| (a.id, a.is_default)), Some((1, true)));
  }

  #[test]
  fn test_fold_non_default_leaves_others() {
    let mut cache = EntityCache::new(10);
    cache.replace_page(Page::new(vec![address(1, false), address(2, true)], 0, 10, 2));
    fold(&mut cache, Mutation::Updated(address(1, false)));
    assert_eq!(cache.page().get(2).map(|a| a.is_default), Some(true));
  }

  #[tokio::test]
  async fn test_facade_scoped_to_user() {
    let (_, facade) = loaded(vec![address(1, true)]).await;
    assert_eq!(facade.user_id(), 1);
    assert_eq!(facade.query(), &AddressFilters { user_id: Some(1) });
  }

  #[tokio::test]
  async fn test_set_default_leaves_exactly_one() {
    let (_, mut facade) = loaded(vec![address(1, false), address(2, true), address(3, false)]).await;
    facade.set_default(1);
    facade.settle().await;
    assert_eq!(defaults(&facade), vec![1]);
    assert_eq!(facade.default_address().map(|a| a.id), Some(1));
  }

  #[tokio::test]
  async fn test_create_default_clears_previous() {
    let (_, mut facade) = loaded(vec![address(1, true), address(2, false)]).await;
    facade.create(payload(true)).unwrap();
    facade.settle().await;

    assert_eq!(defaults(&facade), vec![3]);
    assert_eq!(facade.current().map(|a| (a.id, a.is_default)), Some((3, true)));
  }

  #[tokio::test]
  async fn test_failed_set_default_changes_nothing() {
    let (service, mut facade) = loaded(vec![address(1, false), address(2, true)]).await;
    service.fail_next(ServiceError::new("Address belongs to another user"));
    facade.set_default(1);
    let settled = facade.settle().await;

    assert!(settled[0].is_failed());
    assert_eq!(defaults(&facade), vec![2]);
  }
}
