//! Scripted in-memory service standing in for the REST API in tests.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::VecDeque;
use std::marker::PhantomData;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::{RemoteService, Validate};
use crate::cache::{Entity, EntityId, Page, PageRequest};
use crate::error::ServiceError;
use crate::view::{Fields, Present};

pub type Builder<E, P> = fn(EntityId, &P) -> E;

pub struct FakeState<E> {
  pub rows: Vec<E>,
  next_id: EntityId,
  failures: VecDeque<ServiceError>,
  delays: VecDeque<Duration>,
  pub calls: Vec<String>,
}

/// Server-side rows kept newest first, like the admin API's default sort.
pub struct FakeService<E, P, F = ()> {
  state: Mutex<FakeState<E>>,
  build: Builder<E, P>,
  _marker: PhantomData<fn() -> F>,
}

pub fn not_found(id: EntityId) -> ServiceError {
  ServiceError::new(format!("Entity {id} not found")).with_code("NOT_FOUND")
}

impl<E: Entity, P, F> FakeService<E, P, F> {
  pub fn new(rows: Vec<E>, build: Builder<E, P>) -> Self {
    let next_id = rows.iter().map(Entity::id).max().unwrap_or(0) + 1;
    Self {
      state: Mutex::new(FakeState {
        rows,
        next_id,
        failures: VecDeque::new(),
        delays: VecDeque::new(),
        calls: Vec::new(),
      }),
      build,
      _marker: PhantomData,
    }
  }

  pub fn state(&self) -> MutexGuard<'_, FakeState<E>> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// The next call fails with `err` instead of touching any row.
  pub fn fail_next(&self, err: ServiceError) {
    self.state().failures.push_back(err);
  }

  /// The next call resolves only after `delay`.
  pub fn delay_next(&self, delay: Duration) {
    self.state().delays.push_back(delay);
  }

  pub fn rows(&self) -> Vec<E> {
    self.state().rows.clone()
  }

  pub fn calls(&self) -> Vec<String> {
    self.state().calls.clone()
  }

  pub fn row(&self, id: EntityId) -> Option<E> {
    self.state().rows.iter().find(|r| r.id() == id).cloned()
  }

  /// Insert or replace a row server-side.
  pub fn upsert(&self, entity: E) {
    let mut state = self.state();
    match state.rows.iter().position(|r| r.id() == entity.id()) {
      Some(idx) => state.rows[idx] = entity,
      None => state.rows.insert(0, entity),
    }
  }

  /// Record a call and wait out any scripted delay, then surface a scripted
  /// failure if one is queued.
  pub async fn begin(&self, call: String) -> Result<(), ServiceError> {
    let (delay, failure) = {
      let mut state = self.state();
      state.calls.push(call);
      (state.delays.pop_front(), state.failures.pop_front())
    };
    if let Some(delay) = delay {
      tokio::time::sleep(delay).await;
    }
    match failure {
      Some(err) => Err(err),
      None => Ok(()),
    }
  }
}

impl<E: Entity, P, F> FakeService<E, P, F> {
  fn page_of(rows: &[E], request: PageRequest) -> Page<E> {
    let start = (request.page as usize).saturating_mul(request.size as usize);
    let content = rows
      .iter()
      .skip(start)
      .take(request.size as usize)
      .cloned()
      .collect();
    Page::new(content, request.page, request.size, rows.len() as u64)
  }
}

#[async_trait]
impl<E, P, F> RemoteService for FakeService<E, P, F>
where
  E: Entity + Fields + Present,
  P: Validate + Serialize + Clone + Send + Sync + 'static,
  F: Serialize + Clone + Default + Send + Sync + 'static,
{
  type Entity = E;
  type Payload = P;
  type Filters = F;

  async fn list(&self, request: PageRequest, _filters: &F) -> Result<Page<E>, ServiceError> {
    self.begin(format!("list {} {}", request.page, request.size)).await?;
    Ok(Self::page_of(&self.state().rows, request))
  }

  async fn get_by_id(&self, id: EntityId) -> Result<E, ServiceError> {
    self.begin(format!("get {id}")).await?;
    self.row(id).ok_or_else(|| not_found(id))
  }

  async fn create(&self, payload: &P) -> Result<E, ServiceError> {
    self.begin("create".to_string()).await?;
    let mut state = self.state();
    let id = state.next_id;
    state.next_id += 1;
    let entity = (self.build)(id, payload);
    state.rows.insert(0, entity.clone());
    Ok(entity)
  }

  async fn update(&self, id: EntityId, payload: &P) -> Result<E, ServiceError> {
    self.begin(format!("update {id}")).await?;
    let mut state = self.state();
    let idx = state
      .rows
      .iter()
      .position(|r| r.id() == id)
      .ok_or_else(|| not_found(id))?;
    let entity = (self.build)(id, payload);
    state.rows[idx] = entity.clone();
    Ok(entity)
  }

  async fn delete(&self, id: EntityId) -> Result<(), ServiceError> {
    self.begin(format!("delete {id}")).await?;
    let mut state = self.state();
    let before = state.rows.len();
    state.rows.retain(|r| r.id() != id);
    if state.rows.len() == before {
      return Err(not_found(id));
    }
    Ok(())
  }

  async fn toggle_status(&self, id: EntityId) -> Result<EntityId, ServiceError> {
    self.begin(format!("toggle {id}")).await?;
    let mut state = self.state();
    let row = state
      .rows
      .iter_mut()
      .find(|r| r.id() == id)
      .ok_or_else(|| not_found(id))?;
    if let Some(next) = row.toggled() {
      *row = next;
    }
    Ok(id)
  }
}
