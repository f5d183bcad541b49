//! Invalidation bus: remote change events in, refetches out.
//!
//! One feed subscription per record group, opened when the first consumer
//! registers and closed when the last [`Subscription`] is dropped. Every
//! event, whatever its kind or payload, runs each consumer's full refetch.

use std::{collections::HashMap, future::Future, sync::Arc};

use futures::{
  FutureExt as _, StreamExt as _,
  future::BoxFuture,
  stream,
};
use parking_lot::Mutex;
use rapport_core::{
  change::{EventMask, Table},
  store::ChangeFeed,
};
use tokio::task::JoinHandle;

use crate::Result;

/// Record groups whose changes other sessions need to see promptly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Group {
  RelationshipRequests,
  Introductions,
}

impl Group {
  pub fn tables(self) -> &'static [Table] {
    match self {
      // An accept writes its contacts after the status flip.
      Self::RelationshipRequests => &[Table::RelationshipRequests, Table::Contacts],
      Self::Introductions => &[Table::Introductions, Table::IntroductionParticipants],
    }
  }
}

type Refetch = Arc<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

struct Channel {
  consumers: Vec<(u64, Refetch)>,
  pump:      JoinHandle<()>,
}

#[derive(Default)]
struct Registry {
  channels: HashMap<Group, Channel>,
  next_id:  u64,
}

pub struct InvalidationBus<S> {
  store:    Arc<S>,
  registry: Arc<Mutex<Registry>>,
}

impl<S: ChangeFeed + 'static> InvalidationBus<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self { store, registry: Arc::new(Mutex::new(Registry::default())) }
  }

  /// Run `refetch` after every change in `group` until the returned guard
  /// is dropped. Must be called inside a tokio runtime.
  pub fn subscribe<F, Fut>(&self, group: Group, refetch: F) -> Subscription
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
  {
    let refetch: Refetch = Arc::new(move || refetch().boxed());
    let mut registry = self.registry.lock();
    let id = registry.next_id;
    registry.next_id += 1;

    if let Some(channel) = registry.channels.get_mut(&group) {
      channel.consumers.push((id, refetch));
    } else {
      tracing::debug!(?group, "opening change subscription");
      let pump = self.open(group);
      registry
        .channels
        .insert(group, Channel { consumers: vec![(id, refetch)], pump });
    }

    Subscription { registry: self.registry.clone(), group, id }
  }

  /// Consumers currently registered for `group`.
  pub fn consumers(&self, group: Group) -> usize {
    self
      .registry
      .lock()
      .channels
      .get(&group)
      .map_or(0, |c| c.consumers.len())
  }

  fn open(&self, group: Group) -> JoinHandle<()> {
    let mut events = stream::select_all(
      group
        .tables()
        .iter()
        .map(|&table| self.store.subscribe(table, EventMask::ALL)),
    );
    let registry = self.registry.clone();

    tokio::spawn(async move {
      while let Some(event) = events.next().await {
        let consumers: Vec<Refetch> = match registry.lock().channels.get(&group) {
          Some(channel) => channel.consumers.iter().map(|(_, f)| f.clone()).collect(),
          None => break,
        };
        tracing::debug!(?group, table = event.table.as_str(), kind = ?event.kind, "change event");
        for refetch in consumers {
          if let Err(e) = refetch().await {
            tracing::warn!(?group, error = %e, "refetch after change failed");
          }
        }
      }
    })
  }
}

/// Keeps one consumer registered. Dropping it unregisters the consumer and,
/// if it was the last one, closes the group's subscription.
#[must_use = "dropping a Subscription unregisters it immediately"]
pub struct Subscription {
  registry: Arc<Mutex<Registry>>,
  group:    Group,
  id:       u64,
}

impl Drop for Subscription {
  fn drop(&mut self) {
    let mut registry = self.registry.lock();
    let Some(channel) = registry.channels.get_mut(&self.group) else {
      return;
    };
    channel.consumers.retain(|(id, _)| *id != self.id);
    if channel.consumers.is_empty()
      && let Some(channel) = registry.channels.remove(&self.group)
    {
      tracing::debug!(group = ?self.group, "closing change subscription");
      channel.pump.abort();
    }
  }
}

#[cfg(test)]
mod tests {
  use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
  };

  use rapport_core::{relationship::NewRequest, store::RequestStore};

  use super::*;
  use crate::testing::{probe, seed_user};

  fn counter() -> (Arc<AtomicUsize>, impl Fn() -> BoxFuture<'static, Result<()>> + Send + Sync) {
    let count = Arc::new(AtomicUsize::new(0));
    let hits = count.clone();
    let refetch = move || {
      hits.fetch_add(1, Ordering::SeqCst);
      async { Ok(()) }.boxed()
    };
    (count, refetch)
  }

  async fn settle(mut done: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
      while !done() {
        tokio::task::yield_now().await;
      }
    })
    .await
    .expect("condition not reached");
  }

  #[tokio::test]
  async fn one_feed_subscription_per_group() {
    let store = probe().await;
    let bus = InvalidationBus::new(store.clone());

    let (_, a) = counter();
    let (_, b) = counter();
    let first = bus.subscribe(Group::RelationshipRequests, a);
    let second = bus.subscribe(Group::RelationshipRequests, b);
    let feeds = Group::RelationshipRequests.tables().len();
    assert_eq!(bus.consumers(Group::RelationshipRequests), 2);
    assert_eq!(store.sqlite().subscriber_count(), feeds);

    drop(first);
    assert_eq!(bus.consumers(Group::RelationshipRequests), 1);
    assert_eq!(store.sqlite().subscriber_count(), feeds);

    drop(second);
    assert_eq!(bus.consumers(Group::RelationshipRequests), 0);
    settle(|| store.sqlite().subscriber_count() == 0).await;
  }

  #[tokio::test]
  async fn introductions_group_watches_both_tables() {
    let store = probe().await;
    let bus = InvalidationBus::new(store.clone());
    let (_, f) = counter();
    let _sub = bus.subscribe(Group::Introductions, f);
    assert_eq!(store.sqlite().subscriber_count(), 2);
  }

  #[tokio::test]
  async fn every_event_refetches_every_consumer() {
    let store = probe().await;
    let alice = seed_user(&store, "Alice").await;
    let bob = seed_user(&store, "Bob").await;
    let bus = InvalidationBus::new(store.clone());

    let (a_count, a) = counter();
    let (b_count, b) = counter();
    let _a = bus.subscribe(Group::RelationshipRequests, a);
    let _b = bus.subscribe(Group::RelationshipRequests, b);

    let req = store
      .add_request(NewRequest { requester_id: alice, target_id: bob })
      .await
      .unwrap();
    settle(|| a_count.load(Ordering::SeqCst) == 1 && b_count.load(Ordering::SeqCst) == 1).await;

    store
      .set_request_status(req.request_id, rapport_core::relationship::RequestStatus::Declined)
      .await
      .unwrap();
    settle(|| a_count.load(Ordering::SeqCst) == 2 && b_count.load(Ordering::SeqCst) == 2).await;
  }

  #[tokio::test]
  async fn failing_refetch_does_not_stop_the_pump() {
    let store = probe().await;
    let alice = seed_user(&store, "Alice").await;
    let bob = seed_user(&store, "Bob").await;
    let carol = seed_user(&store, "Carol").await;
    let bus = InvalidationBus::new(store.clone());

    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    let _sub = bus.subscribe(Group::RelationshipRequests, move || {
      seen.fetch_add(1, Ordering::SeqCst);
      async { Err(crate::Error::Conflict("offline".into())) }
    });

    store.add_request(NewRequest { requester_id: alice, target_id: bob }).await.unwrap();
    store.add_request(NewRequest { requester_id: alice, target_id: carol }).await.unwrap();
    settle(|| calls.load(Ordering::SeqCst) == 2).await;
  }
}
