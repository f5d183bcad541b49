//! Incremental profile search.
//!
//! [`SearchCoordinator::run`] is called on every keystroke. Only the most
//! recently issued query may write results: each fetch carries a ticket and
//! its response is dropped on arrival unless that ticket is still the
//! pending one. Superseded fetches are also cancelled outright.
//!
//! Private profiles are scrubbed down to id, name and avatar before they
//! reach the result cache, so a later cache hit cannot reveal more than the
//! first fetch showed.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use rapport_core::{
  profile::{Profile, ProfileQuery},
  store::ProfileStore,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{ClientConfig, Error, Result};

/// One search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
  pub profile:    Profile,
  pub is_private: bool,
}

/// What a call to [`SearchCoordinator::run`] did.
#[derive(Debug, Clone)]
pub enum SearchOutcome {
  /// The query was too short; results were cleared.
  Cleared,
  /// Same as the last settled query; nothing changed.
  Unchanged,
  /// Served from the result cache without a fetch.
  Cached,
  /// Fetched and applied.
  Applied,
  /// Fetched, but a newer query had been issued by the time it arrived.
  Superseded,
  /// Cancelled by a newer query before the response arrived.
  Cancelled,
  /// The fetch failed; results were emptied.
  Failed(Error),
}

struct Pending {
  ticket: u64,
  query:  String,
  cancel: CancellationToken,
}

#[derive(Default)]
struct State {
  results:     Arc<[SearchHit]>,
  loading:     bool,
  settled:     Option<String>,
  pending:     Option<Pending>,
  next_ticket: u64,
  /// Insertion-ordered; the oldest entry is evicted first.
  cache:       IndexMap<String, Arc<[SearchHit]>>,
}

impl State {
  fn cancel_pending(&mut self) {
    if let Some(pending) = self.pending.take() {
      tracing::debug!(query = %pending.query, "cancelling in-flight search");
      pending.cancel.cancel();
    }
  }
}

pub struct SearchCoordinator<S> {
  store:    Arc<S>,
  viewer:   Uuid,
  min_len:  usize,
  limit:    usize,
  capacity: usize,
  state:    Mutex<State>,
}

impl<S: ProfileStore> SearchCoordinator<S> {
  pub fn new(store: Arc<S>, viewer: Uuid, config: &ClientConfig) -> Self {
    Self {
      store,
      viewer,
      min_len: config.search_min_len,
      limit: config.search_result_limit,
      capacity: config.search_cache_capacity.max(1),
      state: Mutex::new(State::default()),
    }
  }

  /// Current results.
  pub fn results(&self) -> Arc<[SearchHit]> { self.state.lock().results.clone() }

  pub fn is_loading(&self) -> bool { self.state.lock().loading }

  /// Number of queries held by the result cache.
  pub fn cached_queries(&self) -> usize { self.state.lock().cache.len() }

  /// Drop the results and cancel anything in flight.
  pub fn clear(&self) {
    let mut state = self.state.lock();
    state.cancel_pending();
    state.results = Arc::from([]);
    state.loading = false;
    state.settled = None;
  }

  pub async fn run(&self, raw: &str) -> SearchOutcome {
    let query = raw.trim().to_lowercase();

    let (ticket, cancel) = {
      let mut state = self.state.lock();

      if query.chars().count() < self.min_len {
        state.cancel_pending();
        state.results = Arc::from([]);
        state.loading = false;
        state.settled = None;
        return SearchOutcome::Cleared;
      }

      // Back on the query already shown: anything issued since is stale.
      if state.settled.as_deref() == Some(query.as_str()) {
        state.cancel_pending();
        state.loading = false;
        return SearchOutcome::Unchanged;
      }

      if let Some(hits) = state.cache.get(&query).cloned() {
        tracing::debug!(%query, "search cache hit");
        state.cancel_pending();
        state.results = hits;
        state.loading = false;
        state.settled = Some(query);
        return SearchOutcome::Cached;
      }

      state.cancel_pending();
      let ticket = state.next_ticket;
      state.next_ticket += 1;
      let cancel = CancellationToken::new();
      state.pending = Some(Pending { ticket, query: query.clone(), cancel: cancel.clone() });
      state.loading = true;
      (ticket, cancel)
    };

    let fetched = tokio::select! {
      biased;
      _ = cancel.cancelled() => None,
      result = self.fetch(&query) => Some(result),
    };

    // A cancelled request's outcome is expected and never surfaces.
    let Some(result) = fetched else {
      tracing::debug!(%query, "search cancelled");
      return SearchOutcome::Cancelled;
    };

    let mut state = self.state.lock();
    if state.pending.as_ref().map(|p| p.ticket) != Some(ticket) {
      tracing::debug!(%query, "discarding superseded search response");
      return SearchOutcome::Superseded;
    }
    state.pending = None;
    state.loading = false;

    match result {
      Ok(hits) => {
        let hits: Arc<[SearchHit]> = hits.into();
        if state.cache.len() >= self.capacity {
          state.cache.shift_remove_index(0);
        }
        state.cache.insert(query.clone(), hits.clone());
        state.results = hits;
        state.settled = Some(query);
        SearchOutcome::Applied
      }
      Err(e) => {
        tracing::warn!(%query, error = %e, "search failed");
        state.results = Arc::from([]);
        state.settled = None;
        SearchOutcome::Failed(e)
      }
    }
  }

  async fn fetch(&self, query: &str) -> Result<Vec<SearchHit>> {
    let request = ProfileQuery {
      text:    query.to_owned(),
      exclude: Some(self.viewer),
      limit:   Some(self.limit),
    };
    let profiles = self
      .store
      .search_profiles(&request)
      .await
      .map_err(Error::remote)?;

    let ids: Vec<Uuid> = profiles.iter().map(|p| p.user_id).collect();
    let private = self
      .store
      .private_profiles(&ids)
      .await
      .map_err(Error::remote)?;

    Ok(
      profiles
        .into_iter()
        .map(|profile| {
          let is_private = private.contains(&profile.user_id);
          let profile = if is_private { profile.scrubbed() } else { profile };
          SearchHit { profile, is_private }
        })
        .collect(),
    )
  }
}
