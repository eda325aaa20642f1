//! Standalone async query for data that lives outside any page cache.
//!
//! Aggregates such as best sellers or per-product sales are read-only and
//! only refreshed on demand: a `Query<T>` owns the fetcher, the latest
//! result and its age, and hands results over when polled.
//!
//! # Example
//!
//! ```ignore
//! let service = Arc::clone(&order_items);
//! let mut bestsellers = Query::new(move || {
//!     let service = Arc::clone(&service);
//!     async move { service.bestsellers(10).await }
//! });
//!
//! bestsellers.fetch();
//!
//! // Later, on the caller's tick
//! if bestsellers.poll() {
//!     render(bestsellers.data());
//! }
//! ```

use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::task::{JoinError, JoinHandle};
use tracing::debug;

use crate::error::ServiceError;

/// The state of a query
#[derive(Debug, Clone, PartialEq)]
pub enum QueryState<T> {
  /// Never fetched
  Idle,
  /// A fetch is in flight; `previous` keeps the last good data on screen
  Loading { previous: Option<T> },
  Success(T),
  /// The last fetch failed; `previous` is the data from before it
  Error { error: ServiceError, previous: Option<T> },
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading { .. })
  }

  pub fn is_success(&self) -> bool {
    matches!(self, QueryState::Success(_))
  }

  pub fn is_error(&self) -> bool {
    matches!(self, QueryState::Error { .. })
  }

  /// Latest good data, including while a refetch is in flight or after it
  /// failed.
  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Idle => None,
      QueryState::Success(data) => Some(data),
      QueryState::Loading { previous } | QueryState::Error { previous, .. } => previous.as_ref(),
    }
  }

  pub fn error(&self) -> Option<&ServiceError> {
    match self {
      QueryState::Error { error, .. } => Some(error),
      _ => None,
    }
  }

  fn into_data(self) -> Option<T> {
    match self {
      QueryState::Idle => None,
      QueryState::Success(data) => Some(data),
      QueryState::Loading { previous } | QueryState::Error { previous, .. } => previous,
    }
  }
}

type FetcherFn<T> = Box<dyn Fn() -> BoxFuture<'static, Result<T, ServiceError>> + Send + Sync>;

/// Async query with explicit fetch/refetch and stale tracking.
pub struct Query<T> {
  state: QueryState<T>,
  fetcher: FetcherFn<T>,
  /// In-flight fetch, aborted when superseded
  task: Option<JoinHandle<Result<T, ServiceError>>>,
  fetched_at: Option<Instant>,
  stale_time: Duration,
}

impl<T: Send + 'static> Query<T> {
  /// The fetcher is called once per `fetch()`/`refetch()`.
  pub fn new<F, Fut>(fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ServiceError>> + Send + 'static,
  {
    Self {
      state: QueryState::Idle,
      fetcher: Box::new(move || Box::pin(fetcher())),
      task: None,
      fetched_at: None,
      stale_time: Duration::from_secs(60),
    }
  }

  pub fn with_stale_time(mut self, duration: Duration) -> Self {
    self.stale_time = duration;
    self
  }

  pub fn state(&self) -> &QueryState<T> {
    &self.state
  }

  pub fn data(&self) -> Option<&T> {
    self.state.data()
  }

  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  pub fn is_success(&self) -> bool {
    self.state.is_success()
  }

  pub fn is_error(&self) -> bool {
    self.state.is_error()
  }

  pub fn error(&self) -> Option<&ServiceError> {
    self.state.error()
  }

  /// True once data is older than the stale time. Never-fetched data is not
  /// stale, it is absent.
  pub fn is_stale(&self) -> bool {
    match &self.state {
      QueryState::Success(_) => self
        .fetched_at
        .map(|t| t.elapsed() > self.stale_time)
        .unwrap_or(true),
      _ => false,
    }
  }

  /// Start fetching unless a fetch is already in flight.
  pub fn fetch(&mut self) {
    if self.state.is_loading() {
      return;
    }
    self.start_fetch();
  }

  /// Start over, aborting any pending fetch.
  pub fn refetch(&mut self) {
    if let Some(task) = self.task.take() {
      debug!("refetch aborts pending query");
      task.abort();
    }
    self.start_fetch();
  }

  /// Move a finished fetch into the state. Returns `true` if the state
  /// changed.
  pub fn poll(&mut self) -> bool {
    let Some(task) = &mut self.task else {
      return false;
    };
    match task.now_or_never() {
      Some(joined) => {
        self.finish(joined);
        true
      }
      None => false,
    }
  }

  /// Wait for the pending fetch, if any, and move it into the state.
  pub async fn settle(&mut self) -> &QueryState<T> {
    if let Some(task) = &mut self.task {
      let joined = task.await;
      self.finish(joined);
    }
    &self.state
  }

  fn finish(&mut self, joined: Result<Result<T, ServiceError>, JoinError>) {
    self.task = None;
    let error = match joined {
      Ok(Ok(data)) => {
        self.state = QueryState::Success(data);
        self.fetched_at = Some(Instant::now());
        return;
      }
      Ok(Err(error)) => error,
      Err(e) => ServiceError::new(format!("Query was cancelled: {e}")),
    };
    let previous = std::mem::replace(&mut self.state, QueryState::Idle).into_data();
    self.state = QueryState::Error { error, previous };
  }

  fn start_fetch(&mut self) {
    let previous = std::mem::replace(&mut self.state, QueryState::Idle).into_data();
    self.state = QueryState::Loading { previous };
    self.task = Some(tokio::spawn((self.fetcher)()));
  }
}

impl<T> Drop for Query<T> {
  fn drop(&mut self) {
    if let Some(task) = self.task.take() {
      task.abort();
    }
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("state", &self.state)
      .field("fetched_at", &self.fetched_at)
      .field("stale_time", &self.stale_time)
      .finish_non_exhaustive()
  }
}
