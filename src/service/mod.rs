//! Remote service collaborators: one per domain.

pub mod api_types;
pub mod client;
#[cfg(test)]
pub(crate) mod fake;

use async_trait::async_trait;
use serde::Serialize;

use crate::cache::{Entity, EntityId, Page, PageRequest};
use crate::error::{ServiceError, ValidationError};
use crate::view::{Fields, Present};

pub use client::{RestClient, RestResource};

/// Local checks run before a payload is sent.
pub trait Validate {
  fn validate(&self) -> Result<(), ValidationError> {
    Ok(())
  }
}

/// CRUD surface of one domain's REST API.
///
/// Every call either succeeds or fails with a [`ServiceError`]; callers never
/// see status codes or headers.
#[async_trait]
pub trait RemoteService: Send + Sync + 'static {
  type Entity: Entity + Fields + Present;
  type Payload: Validate + Serialize + Clone + Send + Sync + 'static;
  /// Server-side list filters, sent as query parameters
  type Filters: Serialize + Clone + Default + Send + Sync + 'static;

  async fn list(
    &self,
    request: PageRequest,
    filters: &Self::Filters,
  ) -> Result<Page<Self::Entity>, ServiceError>;

  async fn get_by_id(&self, id: EntityId) -> Result<Self::Entity, ServiceError>;

  async fn create(&self, payload: &Self::Payload) -> Result<Self::Entity, ServiceError>;

  async fn update(
    &self,
    id: EntityId,
    payload: &Self::Payload,
  ) -> Result<Self::Entity, ServiceError>;

  async fn delete(&self, id: EntityId) -> Result<(), ServiceError>;

  /// Flip the entity's status flag; the server answers with the id only.
  async fn toggle_status(&self, id: EntityId) -> Result<EntityId, ServiceError>;
}
