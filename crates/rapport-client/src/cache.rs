//! Read-through cache of the signed-in user's profile, contacts and meetings.
//!
//! Reads never wait: [`ReadThroughCache::get`] hands back the last complete
//! snapshot. Fetches run the three remote reads concurrently and swap the
//! snapshot in one step once all three succeed. At most one fetch is in
//! flight; later callers attach to it instead of starting another.

use std::{sync::Arc, time::Duration};

use futures::{
  FutureExt as _,
  future::{BoxFuture, Shared},
};
use parking_lot::Mutex;
use rapport_core::{
  contact::Contact,
  meeting::Meeting,
  profile::Profile,
  store::{ContactStore, MeetingStore, ProfileStore},
};
use tokio::time::Instant;
use uuid::Uuid;

use crate::{Error, Result};

/// Everything the cache holds, replaced as a unit.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
  pub profile:    Option<Profile>,
  pub contacts:   Vec<Contact>,
  pub meetings:   Vec<Meeting>,
  /// When the reads behind this snapshot completed. `None` until the first
  /// successful fetch.
  pub fetched_at: Option<Instant>,
}

type Fetch = Shared<BoxFuture<'static, Result<()>>>;

struct InFlight {
  id:    u64,
  fetch: Fetch,
}

struct State {
  snapshot:    Arc<Snapshot>,
  /// `None` means stale.
  fresh_until: Option<Instant>,
  in_flight:   Option<InFlight>,
  next_id:     u64,
}

pub struct ReadThroughCache<S> {
  store:     Arc<S>,
  user_id:   Uuid,
  freshness: Duration,
  state:     Arc<Mutex<State>>,
}

impl<S> ReadThroughCache<S>
where
  S: ProfileStore + ContactStore + MeetingStore + 'static,
{
  pub fn new(store: Arc<S>, user_id: Uuid, freshness: Duration) -> Self {
    Self {
      store,
      user_id,
      freshness,
      state: Arc::new(Mutex::new(State {
        snapshot:    Arc::new(Snapshot::default()),
        fresh_until: None,
        in_flight:   None,
        next_id:     0,
      })),
    }
  }

  /// The best-known snapshot. Never blocks on the network.
  pub fn get(&self) -> Arc<Snapshot> { self.state.lock().snapshot.clone() }

  /// Whether a fetch is currently outstanding.
  pub fn is_fetching(&self) -> bool { self.state.lock().in_flight.is_some() }

  /// Fetch if the snapshot is older than the freshness window, or always
  /// when `force` is set. Joins an outstanding fetch rather than starting a
  /// second one.
  ///
  /// On failure the previous snapshot stays in place and the error is
  /// returned to every caller attached to that fetch.
  pub async fn refresh(&self, force: bool) -> Result<()> {
    let fetch = {
      let mut state = self.state.lock();
      if let Some(in_flight) = &state.in_flight {
        tracing::debug!(user_id = %self.user_id, "joining in-flight fetch");
        in_flight.fetch.clone()
      } else if !force && state.fresh_until.is_some_and(|t| Instant::now() < t) {
        tracing::debug!(user_id = %self.user_id, "cache fresh");
        return Ok(());
      } else {
        self.start(&mut state)
      }
    };
    fetch.await
  }

  /// Mark the snapshot stale and refetch, for read-your-writes after a
  /// mutation.
  ///
  /// A fetch already in flight may have read before the write landed, so it
  /// is awaited first and a new fetch follows it.
  pub async fn invalidate(&self) -> Result<()> {
    let earlier = {
      let mut state = self.state.lock();
      state.fresh_until = None;
      state.in_flight.as_ref().map(|f| f.fetch.clone())
    };
    if let Some(earlier) = earlier {
      // Its outcome predates the write; only the follow-up counts.
      let _ = earlier.await;
    }
    self.refresh(true).await
  }

  /// Spawn the fetch and record it as in flight. Called with the lock held.
  fn start(&self, state: &mut State) -> Fetch {
    let id = state.next_id;
    state.next_id += 1;

    let store = self.store.clone();
    let shared = self.state.clone();
    let user_id = self.user_id;
    let freshness = self.freshness;

    let task = tokio::spawn(async move {
      let result = fetch_snapshot(&*store, user_id).await;
      let mut state = shared.lock();
      if state.in_flight.as_ref().is_some_and(|f| f.id == id) {
        state.in_flight = None;
      }
      match result {
        Ok(snapshot) => {
          state.fresh_until = snapshot.fetched_at.map(|t| t + freshness);
          state.snapshot = Arc::new(snapshot);
          Ok(())
        }
        Err(e) => {
          tracing::warn!(%user_id, error = %e, "cache fetch failed; keeping last snapshot");
          Err(e)
        }
      }
    });

    let fetch = async move {
      task
        .await
        .unwrap_or_else(|e| Err(Error::remote(e)))
    }
    .boxed()
    .shared();

    tracing::debug!(%user_id, fetch = id, "cache fetch started");
    state.in_flight = Some(InFlight { id, fetch: fetch.clone() });
    fetch
  }
}

async fn fetch_snapshot<S>(store: &S, user_id: Uuid) -> Result<Snapshot>
where
  S: ProfileStore + ContactStore + MeetingStore,
{
  let (profile, contacts, meetings) = tokio::try_join!(
    async { store.get_profile(user_id).await.map_err(Error::remote) },
    async { store.list_contacts(user_id).await.map_err(Error::remote) },
    async { store.list_meetings(user_id).await.map_err(Error::remote) },
  )?;
  Ok(Snapshot { profile, contacts, meetings, fetched_at: Some(Instant::now()) })
}
