//! The per-sign-in context every component is built from.

use std::sync::Arc;

use rapport_core::{
  profile::{Profile, ProfilePatch, UserSettings},
  store::RemoteStore,
};
use uuid::Uuid;

use crate::{ClientConfig, Error, ReadThroughCache, Result};

/// One signed-in user's view of the remote store.
///
/// Created by [`Session::sign_in`] and shared as `Arc<Session<S>>`. Owns the
/// session's single [`ReadThroughCache`]; dropping the last handle is
/// sign-out, and nothing cached outlives it.
pub struct Session<S> {
  store:   Arc<S>,
  user_id: Uuid,
  config:  ClientConfig,
  cache:   ReadThroughCache<S>,
}

impl<S: RemoteStore + 'static> Session<S> {
  /// Start a session for an already authenticated `user_id` and prime the
  /// cache.
  ///
  /// A failed first fetch is logged, not returned; the cache stays empty
  /// until the next refresh succeeds.
  pub async fn sign_in(
    store: Arc<S>,
    user_id: Uuid,
    config: ClientConfig,
  ) -> Result<Arc<Self>> {
    if user_id.is_nil() {
      return Err(Error::NotSignedIn);
    }
    if store.get_profile(user_id).await.map_err(Error::remote)?.is_none() {
      return Err(Error::not_found("profile", user_id));
    }

    let cache = ReadThroughCache::new(store.clone(), user_id, config.freshness_window);
    let session = Arc::new(Self { store, user_id, config, cache });
    if let Err(e) = session.cache.refresh(true).await {
      tracing::warn!(%user_id, error = %e, "initial cache fetch failed");
    }

    tracing::info!(%user_id, "signed in");
    Ok(session)
  }

  pub fn user_id(&self) -> Uuid { self.user_id }

  pub fn store(&self) -> &Arc<S> { &self.store }

  pub fn config(&self) -> &ClientConfig { &self.config }

  pub fn cache(&self) -> &ReadThroughCache<S> { &self.cache }

  /// Re-read the cache after a committed mutation.
  ///
  /// The mutation already succeeded, so a failed refetch only leaves the
  /// snapshot stale; it is logged and not returned.
  pub(crate) async fn invalidate_after_write(&self) {
    if let Err(e) = self.cache.invalidate().await {
      tracing::warn!(user_id = %self.user_id, error = %e, "refetch after write failed");
    }
  }

  /// Display name for notifications this user triggers.
  pub(crate) fn display_name(&self) -> String {
    self
      .cache
      .get()
      .profile
      .as_ref()
      .map(|p| p.full_name.clone())
      .unwrap_or_else(|| "Someone".to_owned())
  }

  // ── Profile & settings ────────────────────────────────────────────────────

  pub async fn update_profile(&self, patch: ProfilePatch) -> Result<Profile> {
    let updated = self
      .store
      .update_profile(self.user_id, patch)
      .await
      .map_err(Error::remote)?
      .ok_or_else(|| Error::not_found("profile", self.user_id))?;
    self.invalidate_after_write().await;
    Ok(updated)
  }

  /// Stored settings, or the defaults for a user who never saved any.
  pub async fn settings(&self) -> Result<UserSettings> {
    let stored = self
      .store
      .get_settings(self.user_id)
      .await
      .map_err(Error::remote)?;
    Ok(stored.unwrap_or_else(|| UserSettings::defaults_for(self.user_id)))
  }

  /// Insert-or-update in one call and return what the store kept.
  pub async fn save_settings(&self, mut settings: UserSettings) -> Result<UserSettings> {
    settings.user_id = self.user_id;
    self.store.upsert_settings(settings).await.map_err(Error::remote)
  }
}

#[cfg(test)]
mod tests {
  use rapport_core::profile::ProfilePatch;
  use uuid::Uuid;

  use super::*;
  use crate::testing::{probe, seed_user};

  #[tokio::test]
  async fn sign_in_primes_cache() {
    let store = probe().await;
    let alice = seed_user(&store, "Alice").await;

    let session = Session::sign_in(store.clone(), alice, ClientConfig::default())
      .await
      .unwrap();
    let snap = session.cache().get();
    assert_eq!(snap.profile.as_ref().unwrap().full_name, "Alice");
    assert_eq!(store.profile_fetches(), 2);
  }

  #[tokio::test]
  async fn sign_in_rejects_unknown_and_nil_users() {
    let store = probe().await;
    let err = Session::sign_in(store.clone(), Uuid::new_v4(), ClientConfig::default())
      .await
      .err()
      .unwrap();
    assert!(matches!(err, Error::NotFound(_)));

    let err = Session::sign_in(store, Uuid::nil(), ClientConfig::default())
      .await
      .err()
      .unwrap();
    assert!(matches!(err, Error::NotSignedIn));
  }

  #[tokio::test]
  async fn profile_update_is_visible_immediately() {
    let store = probe().await;
    let alice = seed_user(&store, "Alice").await;
    let session = Session::sign_in(store, alice, ClientConfig::default()).await.unwrap();

    session
      .update_profile(ProfilePatch {
        bio: Some(Some("Builds things".into())),
        ..Default::default()
      })
      .await
      .unwrap();

    let snap = session.cache().get();
    assert_eq!(snap.profile.as_ref().unwrap().bio.as_deref(), Some("Builds things"));
  }

  #[tokio::test]
  async fn settings_default_then_saved() {
    let store = probe().await;
    let alice = seed_user(&store, "Alice").await;
    let session = Session::sign_in(store, alice, ClientConfig::default()).await.unwrap();

    let defaults = session.settings().await.unwrap();
    assert!(!defaults.is_private);
    assert!(defaults.email_notifications);

    let mut wanted = defaults.clone();
    wanted.is_private = true;
    // The session's own identity always wins.
    wanted.user_id = Uuid::new_v4();
    let saved = session.save_settings(wanted).await.unwrap();
    assert_eq!(saved.user_id, alice);
    assert!(saved.is_private);
    assert_eq!(session.settings().await.unwrap(), saved);
  }
}
