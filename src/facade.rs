//! Per-domain facade: intents in, cache state and derived views out.

use std::collections::HashMap;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cache::{CacheSource, Entity, EntityCache, EntityId, Mutation, Page, PageRequest, Patch, QueryKey, SnapshotLayer};
use crate::dispatch::{Delivery, Intent, MutationDispatcher, Outcome, Settled, Ticket};
use crate::error::{ServiceError, ValidationError};
use crate::service::{RemoteService, Validate};
use crate::view::{DerivedViewEngine, Fields, FilterSpec, Formatter, Groups, Present, SortSpec};

type EntityOf<S> = <S as RemoteService>::Entity;
type ViewOf<S> = <EntityOf<S> as Present>::View;

/// Owns one domain's cache and wires intents to remote calls.
///
/// Intents return immediately with a [`Ticket`]; the cache only changes when
/// results are settled through [`poll`](Self::poll) or
/// [`settle`](Self::settle). A failed call leaves the cache exactly as it
/// was.
pub struct EntityFacade<S: RemoteService> {
  service: Arc<S>,
  cache: EntityCache<S::Entity>,
  views: DerivedViewEngine<S::Entity>,
  dispatcher: MutationDispatcher<S::Entity>,
  request: PageRequest,
  query: S::Filters,
  filter: FilterSpec,
  sort: Option<SortSpec>,
  snapshots: SnapshotLayer,
  /// List fetches still in flight
  pending_fetches: HashMap<Ticket, PendingFetch>,
}

/// A list fetch waiting for its result. The facade's request only moves to
/// `request` once the page has actually arrived.
struct PendingFetch {
  request: PageRequest,
  key: Option<QueryKey>,
}

impl<S: RemoteService> EntityFacade<S> {
  pub fn new(service: Arc<S>, page_size: u32) -> Self {
    Self {
      service,
      cache: EntityCache::new(page_size),
      views: DerivedViewEngine::default(),
      dispatcher: MutationDispatcher::new(),
      request: PageRequest::first(page_size),
      query: S::Filters::default(),
      filter: FilterSpec::new(),
      sort: None,
      snapshots: SnapshotLayer::disabled(),
      pending_fetches: HashMap::new(),
    }
  }

  pub fn with_snapshots(mut self, snapshots: SnapshotLayer) -> Self {
    self.snapshots = snapshots;
    self
  }

  pub fn with_memo_capacity(mut self, capacity: NonZeroUsize) -> Self {
    self.views = DerivedViewEngine::new(capacity);
    self
  }

  /// Initial server-side filters, applied from the first fetch on.
  pub fn with_query(mut self, query: S::Filters) -> Self {
    self.query = query;
    self
  }

  // --------------------------------------------------------------------------
  // Reads
  // --------------------------------------------------------------------------

  pub fn service(&self) -> &Arc<S> {
    &self.service
  }

  pub fn cache(&self) -> &EntityCache<S::Entity> {
    &self.cache
  }

  pub fn page(&self) -> &Page<S::Entity> {
    self.cache.page()
  }

  pub fn current(&self) -> Option<&S::Entity> {
    self.cache.current()
  }

  pub fn source(&self) -> CacheSource {
    self.cache.source()
  }

  pub fn request(&self) -> PageRequest {
    self.request
  }

  pub fn query(&self) -> &S::Filters {
    &self.query
  }

  pub fn filter(&self) -> &FilterSpec {
    &self.filter
  }

  pub fn sort(&self) -> Option<&SortSpec> {
    self.sort.as_ref()
  }

  pub fn in_flight(&self) -> usize {
    self.dispatcher.in_flight()
  }

  /// Visible rows after the local filter and sort.
  pub fn view(&self) -> Arc<Vec<S::Entity>> {
    self
      .views
      .view(self.cache.page().content_ref(), &self.filter, self.sort.as_ref())
  }

  /// Visible rows grouped by a field.
  pub fn groups(&self, key: &str) -> Arc<Groups<S::Entity>> {
    self.views.group_by(&self.view(), key)
  }

  /// Presentation form of the visible rows.
  pub fn formatted(&self, fmt: &Formatter) -> Arc<Vec<ViewOf<S>>> {
    self.views.format(&self.view(), fmt)
  }

  // --------------------------------------------------------------------------
  // Local view state
  // --------------------------------------------------------------------------

  pub fn set_filter(&mut self, filter: FilterSpec) {
    self.filter = filter;
  }

  /// Replace the free-text part of the filter, searching the entity's
  /// default search fields.
  pub fn search(&mut self, query: &str) {
    let filter = std::mem::take(&mut self.filter);
    self.filter = filter.search(query, <S::Entity as Fields>::SEARCH_FIELDS.iter().copied());
  }

  pub fn set_sort(&mut self, sort: Option<SortSpec>) {
    self.sort = sort;
  }

  pub fn close_detail(&mut self) -> Patch {
    self.cache.set_current(None)
  }

  // --------------------------------------------------------------------------
  // Intents
  // --------------------------------------------------------------------------

  /// Refetch the current page. The current request only changes when a
  /// fetch succeeds, so a failed `set_page` leaves it pointing at the page
  /// on screen.
  pub fn refresh(&mut self) -> Ticket {
    self.fetch(self.request)
  }

  pub fn set_page(&mut self, page: u32) -> Ticket {
    self.fetch(self.request.with_page(page))
  }

  /// Change the page length, starting over at the first page.
  pub fn set_page_size(&mut self, size: u32) -> Ticket {
    self.fetch(PageRequest::first(size))
  }

  /// Change the server-side filters, starting over at the first page.
  pub fn set_query(&mut self, query: S::Filters) -> Ticket {
    self.query = query;
    self.fetch(PageRequest::first(self.request.size))
  }

  pub fn open(&mut self, id: EntityId) -> Ticket {
    let service = Arc::clone(&self.service);
    self.dispatch(Intent::Open, async move {
      service.get_by_id(id).await.map(Mutation::Detail)
    })
  }

  /// Validate locally, then create. An invalid payload is never sent.
  pub fn create(&mut self, payload: S::Payload) -> Result<Ticket, ValidationError> {
    payload.validate()?;
    let service = Arc::clone(&self.service);
    Ok(self.dispatch(Intent::Create, async move {
      service.create(&payload).await.map(Mutation::Created)
    }))
  }

  pub fn update(&mut self, id: EntityId, payload: S::Payload) -> Result<Ticket, ValidationError> {
    payload.validate()?;
    let service = Arc::clone(&self.service);
    Ok(self.dispatch(Intent::Update, async move {
      service.update(id, &payload).await.map(Mutation::Updated)
    }))
  }

  pub fn delete(&mut self, id: EntityId) -> Ticket {
    let service = Arc::clone(&self.service);
    self.dispatch(Intent::Delete, async move {
      service.delete(id).await.map(|()| Mutation::Deleted(id))
    })
  }

  pub fn toggle_status(&mut self, id: EntityId) -> Ticket {
    let service = Arc::clone(&self.service);
    self.dispatch(Intent::Toggle, async move {
      service.toggle_status(id).await.map(Mutation::Toggled)
    })
  }

  /// Drop every outstanding call; none of them will touch the cache.
  pub fn abandon(&mut self) {
    self.dispatcher.abandon();
    self.pending_fetches.clear();
  }

  /// Issue any call whose result folds into this facade.
  pub fn dispatch<F>(&mut self, intent: Intent, call: F) -> Ticket
  where
    F: Future<Output = Result<Mutation<S::Entity>, ServiceError>> + Send + 'static,
  {
    self.dispatcher.dispatch(intent, call)
  }

  fn fetch(&mut self, request: PageRequest) -> Ticket {
    let service = Arc::clone(&self.service);
    let query = self.query.clone();
    let ticket = self.dispatch(Intent::Fetch, async move {
      service.list(request, &query).await.map(Mutation::Fetched)
    });

    let key = QueryKey::new(<S::Entity as Entity>::entity_type(), request, &self.query)
      .map_err(|e| warn!(error = %e, "unserializable list filters, page will not be persisted"))
      .ok();
    self.pending_fetches.insert(ticket, PendingFetch { request, key });
    ticket
  }

  // --------------------------------------------------------------------------
  // Warm start
  // --------------------------------------------------------------------------

  /// Show the last persisted page for the current request while nothing has
  /// been fetched yet. Returns where the restored page came from.
  pub fn restore(&mut self) -> Option<CacheSource> {
    if !self.cache.is_unloaded() {
      return None;
    }
    let key = QueryKey::new(<S::Entity as Entity>::entity_type(), self.request, &self.query).ok()?;
    match self.snapshots.restore_page::<S::Entity>(&key) {
      Ok(Some(restored)) => {
        info!(query = %key.description(), source = ?restored.source, "restored page snapshot");
        self.cache.replace_page_from(restored.data, restored.source);
        Some(restored.source)
      }
      Ok(None) => None,
      Err(e) => {
        warn!(query = %key.description(), error = %e, "failed to restore page snapshot");
        None
      }
    }
  }

  // --------------------------------------------------------------------------
  // Settlement
  // --------------------------------------------------------------------------

  /// Apply every result that has resolved so far, in resolution order.
  pub fn poll(&mut self) -> Vec<Settled> {
    self.poll_with(EntityCache::apply)
  }

  /// Like [`poll`](Self::poll) with a custom fold, for facades that patch
  /// more than the main cache per result.
  pub fn poll_with<F>(&mut self, mut apply: F) -> Vec<Settled>
  where
    F: FnMut(&mut EntityCache<S::Entity>, Mutation<S::Entity>) -> Patch,
  {
    self
      .dispatcher
      .drain()
      .into_iter()
      .map(|delivery| self.settle_delivery(delivery, &mut apply))
      .collect::<Vec<_>>()
  }

  /// Wait for every outstanding call and apply the results as they resolve.
  pub async fn settle(&mut self) -> Vec<Settled> {
    self.settle_with(EntityCache::apply).await
  }

  pub async fn settle_with<F>(&mut self, mut apply: F) -> Vec<Settled>
  where
    F: FnMut(&mut EntityCache<S::Entity>, Mutation<S::Entity>) -> Patch,
  {
    let mut settled = Vec::new();
    while let Some(delivery) = self.dispatcher.next().await {
      settled.push(self.settle_delivery(delivery, &mut apply));
    }
    self.pending_fetches.clear();
    settled
  }

  fn settle_delivery<F>(&mut self, delivery: Delivery<S::Entity>, apply: &mut F) -> Settled
  where
    F: FnMut(&mut EntityCache<S::Entity>, Mutation<S::Entity>) -> Patch,
  {
    let pending = self.pending_fetches.remove(&delivery.ticket);
    let outcome = match delivery.result {
      Ok(mutation) => {
        if let (Mutation::Fetched(page), Some(pending)) = (&mutation, pending) {
          self.request = pending.request;
          if let Some(key) = &pending.key {
            self.snapshots.persist_page(key, page);
          }
        }
        let kind = mutation.kind();
        let patch = apply(&mut self.cache, mutation);
        debug!(ticket = delivery.ticket, kind, ?patch, "settled");
        Outcome::from(patch)
      }
      Err(err) => Outcome::Failed(err),
    };

    Settled {
      ticket: delivery.ticket,
      intent: delivery.intent,
      outcome,
    }
  }
}

/// Uniform handle over the generic facade and its domain specializations.
///
/// Specialized facades fold more than the main cache on settlement, so
/// callers driving any domain generically go through [`settle_all`].
///
/// [`settle_all`]: DomainFacade::settle_all
#[allow(async_fn_in_trait)]
pub trait DomainFacade {
  type Service: RemoteService;

  fn entities(&self) -> &EntityFacade<Self::Service>;

  fn entities_mut(&mut self) -> &mut EntityFacade<Self::Service>;

  /// Wait for every outstanding call and fold the results in.
  async fn settle_all(&mut self) -> Vec<Settled>;
}

impl<S: RemoteService> DomainFacade for EntityFacade<S> {
  type Service = S;

  fn entities(&self) -> &EntityFacade<S> {
    self
  }

  fn entities_mut(&mut self) -> &mut EntityFacade<S> {
    self
  }

  async fn settle_all(&mut self) -> Vec<Settled> {
    self.settle().await
  }
}

impl<S: RemoteService> Drop for EntityFacade<S> {
  fn drop(&mut self) {
    self.dispatcher.abandon();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::fixtures::{build_item, item, items, named, Item};
  use crate::cache::SqliteStorage;
  use crate::service::fake::FakeService;
  use pretty_assertions::assert_eq;
  use std::time::Duration;

  type Fake = FakeService<Item, Item>;

  fn facade(rows: Vec<Item>, size: u32) -> (Arc<Fake>, EntityFacade<Fake>) {
    let service = Arc::new(FakeService::new(rows, build_item));
    let facade = EntityFacade::new(Arc::clone(&service), size);
    (service, facade)
  }

  async fn loaded(rows: Vec<Item>, size: u32) -> (Arc<Fake>, EntityFacade<Fake>) {
    let (service, mut facade) = facade(rows, size);
    facade.refresh();
    facade.settle().await;
    (service, facade)
  }

  fn ids(facade: &EntityFacade<Fake>) -> Vec<EntityId> {
    facade.page().content().iter().map(|i| i.id).collect()
  }

  #[tokio::test]
  async fn test_refresh_loads_first_page() {
    let (_, facade) = loaded(items(1..=25), 10).await;
    assert_eq!(ids(&facade), (1..=10).collect::<Vec<_>>());
    assert_eq!(facade.page().total_elements(), 25);
    assert_eq!(facade.page().total_pages(), 3);
    assert_eq!(facade.source(), CacheSource::Network);
  }

  #[tokio::test]
  async fn test_set_page_and_page_size() {
    let (_, mut facade) = loaded(items(1..=25), 10).await;
    facade.set_page(2);
    facade.settle().await;
    assert_eq!(ids(&facade), (21..=25).collect::<Vec<_>>());
    assert!(facade.page().is_last());

    facade.set_page_size(5);
    facade.settle().await;
    assert_eq!(facade.request(), PageRequest::first(5));
    assert_eq!(facade.page().total_pages(), 5);
  }

  #[tokio::test]
  async fn test_failed_page_change_keeps_request() {
    let (service, mut facade) = loaded(items(1..=25), 10).await;
    service.fail_next(ServiceError::new("Service unavailable"));
    facade.set_page(1);
    let settled = facade.settle().await;

    assert!(settled[0].is_failed());
    assert_eq!(facade.request(), PageRequest::first(10));
    assert_eq!(facade.page().number(), 0);

    facade.refresh();
    facade.settle().await;
    assert_eq!(ids(&facade), (1..=10).collect::<Vec<_>>());
  }

  #[tokio::test]
  async fn test_create_prepends_and_opens() {
    let (_, mut facade) = loaded(items(1..=3), 3).await;
    facade.create(named(0, Some("fresh"))).unwrap();
    let settled = facade.settle().await;

    assert_eq!(settled.len(), 1);
    assert_eq!(settled[0].outcome, Outcome::Applied);
    assert_eq!(ids(&facade), vec![4, 1, 2]);
    assert_eq!(facade.page().total_elements(), 4);
    assert_eq!(facade.current().map(|i| i.id), Some(4));
  }

  #[tokio::test]
  async fn test_invalid_payload_is_never_sent() {
    let (service, mut facade) = loaded(items(1..=3), 10).await;
    let err = facade.create(named(0, Some("  "))).unwrap_err();
    assert_eq!(err, ValidationError::Required { field: "name" });
    assert_eq!(facade.in_flight(), 0);
    assert!(!service.calls().iter().any(|c| c == "create"));
  }

  #[tokio::test]
  async fn test_failed_update_leaves_cache_untouched() {
    let (service, mut facade) = loaded(items(1..=3), 10).await;
    let before = facade.page().clone();

    service.fail_next(ServiceError::new("Name already taken").with_code("DUPLICATE"));
    facade.update(2, named(2, Some("clash"))).unwrap();
    let settled = facade.settle().await;

    assert_eq!(
      settled[0].outcome,
      Outcome::Failed(ServiceError::new("Name already taken").with_code("DUPLICATE"))
    );
    assert_eq!(facade.page(), &before);
  }

  #[tokio::test]
  async fn test_update_replaces_row_and_current() {
    let (_, mut facade) = loaded(items(1..=3), 10).await;
    facade.open(2);
    facade.settle().await;

    facade.update(2, named(2, Some("renamed"))).unwrap();
    facade.settle().await;

    assert_eq!(facade.page().get(2).and_then(|i| i.name.clone()).as_deref(), Some("renamed"));
    assert_eq!(facade.current().and_then(|i| i.name.clone()).as_deref(), Some("renamed"));
  }

  #[tokio::test]
  async fn test_delete_and_toggle() {
    let (_, mut facade) = loaded(items(1..=3), 10).await;
    facade.delete(1);
    facade.toggle_status(2);
    facade.settle().await;

    assert_eq!(ids(&facade), vec![2, 3]);
    assert_eq!(facade.page().total_elements(), 2);
    assert_eq!(facade.page().get(2).map(|i| i.active), Some(false));
  }

  #[tokio::test]
  async fn test_results_fold_in_resolution_order() {
    let (service, mut facade) = loaded(items(1..=3), 10).await;

    service.delay_next(Duration::from_millis(40));
    facade.update(1, named(1, Some("slow"))).unwrap();
    facade.update(1, named(1, Some("fast"))).unwrap();
    let settled = facade.settle().await;

    assert_eq!(settled.len(), 2);
    assert!(settled[0].ticket > settled[1].ticket);
    // Last write to resolve wins
    assert_eq!(facade.page().get(1).and_then(|i| i.name.clone()).as_deref(), Some("slow"));
  }

  #[tokio::test]
  async fn test_abandoned_results_never_apply() {
    let (service, mut facade) = loaded(items(1..=3), 10).await;
    let before = facade.page().clone();

    service.delay_next(Duration::from_millis(20));
    facade.delete(1);
    facade.abandon();

    assert!(facade.settle().await.is_empty());
    assert_eq!(facade.page(), &before);
  }

  #[tokio::test]
  async fn test_poll_applies_only_resolved() {
    let (service, mut facade) = loaded(items(1..=3), 10).await;
    service.delay_next(Duration::from_millis(200));
    facade.delete(3);
    assert!(facade.poll().is_empty());
    assert_eq!(facade.page().len(), 3);

    facade.abandon();
  }

  #[tokio::test]
  async fn test_view_is_stable_until_content_changes() {
    let (_, mut facade) = loaded(vec![named(1, Some("b")), named(2, Some("a"))], 10).await;
    facade.set_sort(Some(SortSpec::asc("name")));

    let a = facade.view();
    let b = facade.view();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(a.iter().map(|i| i.id).collect::<Vec<_>>(), vec![2, 1]);

    facade.toggle_status(1);
    facade.settle().await;
    assert!(!Arc::ptr_eq(&a, &facade.view()));
  }

  #[tokio::test]
  async fn test_filter_and_format() {
    let (_, mut facade) = loaded(items(1..=4), 10).await;
    facade.toggle_status(3);
    facade.settle().await;

    facade.set_filter(FilterSpec::new().status("active", true));
    assert_eq!(facade.view().len(), 3);
    assert_eq!(facade.groups("active").len(), 1);

    let fmt = Formatter::default();
    let rows = facade.formatted(&fmt);
    assert_eq!(rows.first().map(String::as_str), Some("#1 item-1 "));
    assert!(Arc::ptr_eq(&rows, &facade.formatted(&fmt)));
  }

  #[tokio::test]
  async fn test_search_keeps_other_predicates() {
    let (_, mut facade) = loaded(items(1..=4), 10).await;
    facade.set_filter(FilterSpec::new().status("active", true));
    facade.search("ITEM-2");
    assert_eq!(facade.view().iter().map(|i| i.id).collect::<Vec<_>>(), vec![2]);

    facade.search("  ");
    assert_eq!(facade.view().len(), 4);
  }

  #[tokio::test]
  async fn test_open_missing_leaves_current() {
    let (_, mut facade) = loaded(items(1..=2), 10).await;
    facade.open(1);
    facade.settle().await;
    facade.open(99);
    let settled = facade.settle().await;

    assert!(settled[0].is_failed());
    assert_eq!(facade.current().map(|i| i.id), Some(1));
    facade.close_detail();
    assert!(facade.current().is_none());
  }

  #[tokio::test]
  async fn test_snapshot_warm_start() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let layer = SnapshotLayer::new(storage);

    let service = Arc::new(FakeService::<Item, Item>::new(items(1..=5), build_item));
    let mut first = EntityFacade::new(Arc::clone(&service), 10).with_snapshots(layer.clone());
    first.refresh();
    first.settle().await;
    drop(first);

    let offline = Arc::new(FakeService::<Item, Item>::new(vec![item(42)], build_item));
    let mut second = EntityFacade::new(offline, 10).with_snapshots(layer);
    assert_eq!(second.restore(), Some(CacheSource::CacheFresh));
    assert_eq!(second.page().len(), 5);
    assert!(second.source().is_offline());

    // Once loaded, restore is a no-op
    second.refresh();
    second.settle().await;
    assert_eq!(second.restore(), None);
    assert_eq!(second.page().len(), 1);
  }
}
