use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::api_types::{error_from_body, ApiIdResponse};
use super::{RemoteService, Validate};
use crate::cache::{Entity, EntityId, Page, PageRequest};
use crate::config::ApiConfig;
use crate::error::ServiceError;
use crate::view::{Fields, Present};

/// Admin API client wrapper
#[derive(Clone)]
pub struct RestClient {
  http: reqwest::Client,
  base_url: Url,
  token: Option<String>,
}

impl RestClient {
  pub fn new(config: &ApiConfig, token: Option<String>) -> Result<Self> {
    let base_url = parse_base_url(&config.base_url)?;

    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base_url,
      token,
    })
  }

  pub fn base_url(&self) -> &Url {
    &self.base_url
  }

  /// Resolve a path relative to the base URL.
  pub fn endpoint(&self, path: &str) -> Result<Url, ServiceError> {
    self
      .base_url
      .join(path.trim_start_matches('/'))
      .map_err(ServiceError::transport)
  }

  fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ServiceError> {
    let url = self.endpoint(path)?;
    debug!(%method, %url, "request");
    let builder = self.http.request(method, url);
    Ok(match &self.token {
      Some(token) => builder.bearer_auth(token),
      None => builder,
    })
  }

  /// Send a request, mapping every failure to the uniform error.
  async fn execute(&self, builder: RequestBuilder) -> Result<Response, ServiceError> {
    let response = builder.send().await.map_err(|e| {
      warn!(error = %e, "request failed");
      ServiceError::transport(e)
    })?;

    let status = response.status();
    if status.is_success() {
      return Ok(response);
    }

    let body = response.bytes().await.unwrap_or_default();
    let err = error_from_body(status.as_u16(), &body);
    warn!(status = status.as_u16(), message = %err.message, "request rejected");
    Err(err)
  }

  async fn json<R: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<R, ServiceError> {
    self
      .execute(builder)
      .await?
      .json::<R>()
      .await
      .map_err(ServiceError::transport)
  }

  pub async fn get<R, Q>(&self, path: &str, query: &Q) -> Result<R, ServiceError>
  where
    R: DeserializeOwned,
    Q: Serialize + ?Sized,
  {
    self.json(self.request(Method::GET, path)?.query(query)).await
  }

  /// GET a page: paging parameters plus the domain's list filters.
  pub async fn get_page<T, F>(&self, path: &str, request: PageRequest, filters: &F) -> Result<Page<T>, ServiceError>
  where
    T: DeserializeOwned,
    F: Serialize + ?Sized,
  {
    let builder = self
      .request(Method::GET, path)?
      .query(&request)
      .query(filters);
    self.json(builder).await
  }

  pub async fn post<R, B>(&self, path: &str, body: &B) -> Result<R, ServiceError>
  where
    R: DeserializeOwned,
    B: Serialize + ?Sized,
  {
    self.json(self.request(Method::POST, path)?.json(body)).await
  }

  pub async fn put<R, B>(&self, path: &str, body: &B) -> Result<R, ServiceError>
  where
    R: DeserializeOwned,
    B: Serialize + ?Sized,
  {
    self.json(self.request(Method::PUT, path)?.json(body)).await
  }

  /// PATCH without a body; arguments travel as query parameters.
  pub async fn patch<R, Q>(&self, path: &str, query: &Q) -> Result<R, ServiceError>
  where
    R: DeserializeOwned,
    Q: Serialize + ?Sized,
  {
    self.json(self.request(Method::PATCH, path)?.query(query)).await
  }

  pub async fn delete(&self, path: &str) -> Result<(), ServiceError> {
    self.execute(self.request(Method::DELETE, path)?).await?;
    Ok(())
  }
}

/// Parse the configured base URL so relative joins keep its last segment.
fn parse_base_url(raw: &str) -> Result<Url> {
  let mut normalized = raw.trim().to_string();
  if !normalized.ends_with('/') {
    normalized.push('/');
  }
  Url::parse(&normalized).map_err(|e| eyre!("Invalid API base URL {}: {}", raw, e))
}

/// One REST collection (`/brands`, `/coupons`, ...) exposed as a
/// [`RemoteService`].
pub struct RestResource<E, P, F> {
  client: RestClient,
  path: String,
  _marker: PhantomData<fn() -> (E, P, F)>,
}

impl<E, P, F> RestResource<E, P, F> {
  pub fn new(client: RestClient, path: &str) -> Self {
    Self {
      client,
      path: path.trim_matches('/').to_string(),
      _marker: PhantomData,
    }
  }

  pub fn client(&self) -> &RestClient {
    &self.client
  }

  pub fn path(&self) -> &str {
    &self.path
  }

  /// `{collection}/{id}` followed by any extra segments.
  pub fn item_path(&self, id: EntityId, suffix: &str) -> String {
    if suffix.is_empty() {
      format!("{}/{}", self.path, id)
    } else {
      format!("{}/{}/{}", self.path, id, suffix.trim_start_matches('/'))
    }
  }
}

impl<E, P, F> Clone for RestResource<E, P, F> {
  fn clone(&self) -> Self {
    Self {
      client: self.client.clone(),
      path: self.path.clone(),
      _marker: PhantomData,
    }
  }
}

#[async_trait]
impl<E, P, F> RemoteService for RestResource<E, P, F>
where
  E: Entity + Fields + Present,
  P: Validate + Serialize + Clone + Send + Sync + 'static,
  F: Serialize + Clone + Default + Send + Sync + 'static,
{
  type Entity = E;
  type Payload = P;
  type Filters = F;

  async fn list(&self, request: PageRequest, filters: &F) -> Result<Page<E>, ServiceError> {
    self.client.get_page(&self.path, request, filters).await
  }

  async fn get_by_id(&self, id: EntityId) -> Result<E, ServiceError> {
    self.client.get(&self.item_path(id, ""), &()).await
  }

  async fn create(&self, payload: &P) -> Result<E, ServiceError> {
    self.client.post(&self.path, payload).await
  }

  async fn update(&self, id: EntityId, payload: &P) -> Result<E, ServiceError> {
    self.client.put(&self.item_path(id, ""), payload).await
  }

  async fn delete(&self, id: EntityId) -> Result<(), ServiceError> {
    self.client.delete(&self.item_path(id, "")).await
  }

  async fn toggle_status(&self, id: EntityId) -> Result<EntityId, ServiceError> {
    let response: ApiIdResponse = self
      .client
      .patch(&self.item_path(id, "toggle-status"), &())
      .await?;
    Ok(response.id())
  }
}
