use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use super::{blank_as_none, bump_images, is_blank};
use crate::cache::{Entity, EntityCache, EntityId, Mutation, Patch};
use crate::dispatch::Settled;
use crate::error::ValidationError;
use crate::facade::{DomainFacade, EntityFacade};
use crate::service::{RemoteService, RestResource, Validate};
use crate::view::{Fields, Formatter, ImageVersions, Memo, Present, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Brand {
  pub id: EntityId,
  pub name: String,
  #[serde(default, deserialize_with = "blank_as_none")]
  pub description: Option<String>,
  #[serde(default, deserialize_with = "blank_as_none")]
  pub logo_url: Option<String>,
  #[serde(default, deserialize_with = "blank_as_none")]
  pub website: Option<String>,
  #[serde(default)]
  pub is_active: bool,
  #[serde(default)]
  pub product_count: u32,
  pub created_at: Option<DateTime<Utc>>,
  pub updated_at: Option<DateTime<Utc>>,
}

impl Entity for Brand {
  fn id(&self) -> EntityId {
    self.id
  }

  fn entity_type() -> &'static str {
    "brand"
  }

  fn toggled(&self) -> Option<Self> {
    Some(Brand {
      is_active: !self.is_active,
      ..self.clone()
    })
  }
}

impl Fields for Brand {
  const SEARCH_FIELDS: &'static [&'static str] = &["name", "description", "website"];

  fn field(&self, key: &str) -> Value {
    match key {
      "id" => Value::from(self.id),
      "name" => Value::from(self.name.as_str()),
      "description" => Value::from(self.description.clone()),
      "website" => Value::from(self.website.clone()),
      "isActive" => Value::Bool(self.is_active),
      "productCount" => Value::from(self.product_count),
      "createdAt" => Value::from(self.created_at),
      "updatedAt" => Value::from(self.updated_at),
      _ => Value::Null,
    }
  }
}

/// Display row for a brand.
#[derive(Debug, Clone, PartialEq)]
pub struct BrandView {
  pub id: EntityId,
  pub name: String,
  pub status: &'static str,
  pub products: String,
  pub updated: Option<String>,
}

impl std::fmt::Display for BrandView {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "#{:<6} {:<28} {:<9} {:>12}", self.id, self.name, self.status, self.products)?;
    if let Some(updated) = &self.updated {
      write!(f, "  updated {updated}")?;
    }
    Ok(())
  }
}

impl Present for Brand {
  type View = BrandView;

  fn present(&self, fmt: &Formatter) -> BrandView {
    BrandView {
      id: self.id,
      name: self.name.clone(),
      status: if self.is_active { "Active" } else { "Inactive" },
      products: match self.product_count {
        1 => "1 product".to_string(),
        n => format!("{n} products"),
      },
      updated: self.updated_at.or(self.created_at).map(|at| fmt.relative(at)),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandPayload {
  pub name: String,
  pub description: Option<String>,
  pub logo_url: Option<String>,
  pub website: Option<String>,
  pub is_active: bool,
}

impl Validate for BrandPayload {
  fn validate(&self) -> Result<(), ValidationError> {
    if is_blank(&self.name) {
      return Err(ValidationError::Required { field: "name" });
    }
    Ok(())
  }
}

/// Server-side list filters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandFilters {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub is_active: Option<bool>,
}

pub type BrandResource = RestResource<Brand, BrandPayload, BrandFilters>;

/// Active/inactive counts over the visible page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BrandSummary {
  pub total: usize,
  pub active: usize,
  pub inactive: usize,
}

impl BrandSummary {
  pub fn of(brands: &[Brand]) -> Self {
    let active = brands.iter().filter(|b| b.is_active).count();
    Self {
      total: brands.len(),
      active,
      inactive: brands.len() - active,
    }
  }
}

/// Brand facade: the generic facade plus logo cache-busting and the
/// summary.
pub struct BrandFacade<S: RemoteService<Entity = Brand>> {
  inner: EntityFacade<S>,
  images: ImageVersions,
  summary: Memo<Brand, (), BrandSummary>,
}

impl<S: RemoteService<Entity = Brand>> BrandFacade<S> {
  pub fn new(inner: EntityFacade<S>) -> Self {
    Self {
      inner,
      images: ImageVersions::new(),
      summary: Memo::new(std::num::NonZeroUsize::MIN),
    }
  }

  /// Summary of the page content. Recomputed only when the content changes.
  pub fn summary(&self) -> Arc<BrandSummary> {
    self
      .summary
      .get_or_compute(self.inner.page().content_ref(), &(), |brands, _| BrandSummary::of(brands))
  }

  /// Logo URL carrying the brand's current version token.
  pub fn logo_url(&self, brand: &Brand) -> Option<String> {
    brand
      .logo_url
      .as_deref()
      .map(|url| self.images.display_url(url, brand.id))
  }

  /// Force the logo to reload, e.g. after uploading a new file under the
  /// same URL.
  pub fn refresh_logo(&mut self, id: EntityId) {
    self.images.bump(id);
  }

  pub fn refresh_all_logos(&mut self) {
    self.images.bump_all();
  }

  pub fn poll(&mut self) -> Vec<Settled> {
    let images = &mut self.images;
    self.inner.poll_with(|cache, m| fold(images, cache, m))
  }

  pub async fn settle(&mut self) -> Vec<Settled> {
    let images = &mut self.images;
    self.inner.settle_with(|cache, m| fold(images, cache, m)).await
  }
}

fn fold(images: &mut ImageVersions, cache: &mut EntityCache<Brand>, mutation: Mutation<Brand>) -> Patch {
  bump_images(images, &mutation);
  cache.apply(mutation)
}

impl<S: RemoteService<Entity = Brand>> DomainFacade for BrandFacade<S> {
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

impl<S: RemoteService<Entity = Brand>> Deref for BrandFacade<S> {
  type Target = EntityFacade<S>;

  fn deref(&self) -> &Self::Target {
    &self.inner
  }
}

impl<S: RemoteService<Entity = Brand>> DerefMut for BrandFacade<S> {
  fn deref_mut(&mut self) -> &mut Self::Target {
    &mut self.inner
  }
}
