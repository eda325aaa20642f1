//! Asynchronous dispatch of remote calls and in-order delivery of their
//! results.
//!
//! Every intent becomes one spawned task. Results come back over a channel in
//! the order they resolve, not the order they were issued, and are folded
//! into the cache one at a time by whoever drains the dispatcher. A facade
//! that goes away (or navigates elsewhere) abandons its outstanding calls:
//! their results are dropped before they can touch any cache.

use std::future::Future;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::{Mutation, Patch};
use crate::error::{DashError, ServiceError};

/// Identifies one dispatched call.
pub type Ticket = u64;

/// What a dispatched call was for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
  Fetch,
  Open,
  Create,
  Update,
  Delete,
  Toggle,
  /// A domain-specific call (stock update, aggregates, set default)
  Custom(&'static str),
}

/// A resolved call that is still live.
#[derive(Debug)]
pub struct Delivery<T> {
  pub ticket: Ticket,
  pub intent: Intent,
  pub result: Result<Mutation<T>, ServiceError>,
}

struct Resolved<T> {
  ticket: Ticket,
  intent: Intent,
  /// Token of the generation the call was issued under
  token: CancellationToken,
  /// `None` when the call was cut short by cancellation
  result: Option<Result<Mutation<T>, ServiceError>>,
}

/// How a settled call ended up affecting the cache.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
  Applied,
  Unchanged,
  Failed(ServiceError),
}

impl From<Patch> for Outcome {
  fn from(patch: Patch) -> Self {
    match patch {
      Patch::Applied => Outcome::Applied,
      Patch::Unchanged => Outcome::Unchanged,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settled {
  pub ticket: Ticket,
  pub intent: Intent,
  pub outcome: Outcome,
}

impl Settled {
  pub fn is_failed(&self) -> bool {
    matches!(self.outcome, Outcome::Failed(_))
  }

  pub fn into_result(self) -> Result<Patch, DashError> {
    match self.outcome {
      Outcome::Applied => Ok(Patch::Applied),
      Outcome::Unchanged => Ok(Patch::Unchanged),
      Outcome::Failed(err) => Err(err.into()),
    }
  }
}

/// Spawns remote calls and hands their results back in resolution order.
pub struct MutationDispatcher<T> {
  tx: mpsc::UnboundedSender<Resolved<T>>,
  rx: mpsc::UnboundedReceiver<Resolved<T>>,
  token: CancellationToken,
  next_ticket: Ticket,
  in_flight: usize,
}

impl<T: Send + Sync + 'static> MutationDispatcher<T> {
  pub fn new() -> Self {
    let (tx, rx) = mpsc::unbounded_channel();
    Self {
      tx,
      rx,
      token: CancellationToken::new(),
      next_ticket: 0,
      in_flight: 0,
    }
  }

  /// Calls issued and not yet drained.
  pub fn in_flight(&self) -> usize {
    self.in_flight
  }

  /// Spawn `call`. Must be called from within a tokio runtime.
  pub fn dispatch<F>(&mut self, intent: Intent, call: F) -> Ticket
  where
    F: Future<Output = Result<Mutation<T>, ServiceError>> + Send + 'static,
  {
    self.next_ticket += 1;
    let ticket = self.next_ticket;
    let token = self.token.clone();
    let tx = self.tx.clone();
    self.in_flight += 1;
    debug!(ticket, ?intent, "dispatching");

    tokio::spawn(async move {
      let result = tokio::select! {
        biased;
        _ = token.cancelled() => None,
        result = call => Some(result),
      };
      // The dispatcher may already be gone
      let _ = tx.send(Resolved {
        ticket,
        intent,
        token,
        result,
      });
    });

    ticket
  }

  /// Cancel every outstanding call. Results that already resolved but were
  /// not drained yet are dropped too.
  pub fn abandon(&mut self) {
    if self.in_flight > 0 {
      debug!(in_flight = self.in_flight, "abandoning outstanding calls");
    }
    self.token.cancel();
    self.token = CancellationToken::new();
  }

  fn accept(&mut self, resolved: Resolved<T>) -> Option<Delivery<T>> {
    self.in_flight = self.in_flight.saturating_sub(1);
    if resolved.token.is_cancelled() {
      debug!(ticket = resolved.ticket, intent = ?resolved.intent, "discarding abandoned result");
      return None;
    }
    let result = resolved.result?;
    if let Err(err) = &result {
      warn!(ticket = resolved.ticket, intent = ?resolved.intent, error = %err, "remote call failed");
    }
    Some(Delivery {
      ticket: resolved.ticket,
      intent: resolved.intent,
      result,
    })
  }

  /// Every live result that has resolved so far, without waiting.
  pub fn drain(&mut self) -> Vec<Delivery<T>> {
    let mut deliveries = Vec::new();
    while let Ok(resolved) = self.rx.try_recv() {
      deliveries.extend(self.accept(resolved));
    }
    deliveries
  }

  /// Wait for the next live result. `None` once nothing is in flight.
  pub async fn next(&mut self) -> Option<Delivery<T>> {
    while self.in_flight > 0 {
      let resolved = self.rx.recv().await?;
      if let Some(delivery) = self.accept(resolved) {
        return Some(delivery);
      }
    }
    None
  }
}

impl<T: Send + Sync + 'static> Default for MutationDispatcher<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T> Drop for MutationDispatcher<T> {
  fn drop(&mut self) {
    self.token.cancel();
  }
}
