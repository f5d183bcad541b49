//! Introductions: the signed-in user connecting a few people they know.

use std::{collections::HashSet, sync::Arc};

use chrono::{Duration, Utc};
use parking_lot::Mutex;
use rapport_core::{
  introduction::{
    IntroParticipant, IntroResponse, Introduction, MAX_PARTICIPANTS,
    MIN_PARTICIPANTS, NewIntroduction,
  },
  notification::{NewNotification, NotificationKind},
  store::RemoteStore,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
  Error, Group, InvalidationBus, Result, Session, Subscription,
  notifications::notify,
};

/// Width of the rolling send limit.
const WINDOW_DAYS: i64 = 30;

pub struct Introductions<S> {
  session: Arc<Session<S>>,
  loaded:  Mutex<Arc<[Introduction]>>,
}

impl<S: RemoteStore + 'static> Introductions<S> {
  pub fn new(session: Arc<Session<S>>) -> Self {
    Self { session, loaded: Mutex::new(Arc::from([])) }
  }

  fn me(&self) -> Uuid { self.session.user_id() }

  fn store(&self) -> &S { self.session.store() }

  /// Introduce `participant_ids` to one another.
  pub async fn send(
    &self,
    participant_ids: Vec<Uuid>,
    message: Option<String>,
  ) -> Result<Introduction> {
    let me = self.me();
    if !(MIN_PARTICIPANTS..=MAX_PARTICIPANTS).contains(&participant_ids.len()) {
      return Err(Error::Invalid(format!(
        "an introduction connects {MIN_PARTICIPANTS} to {MAX_PARTICIPANTS} people"
      )));
    }
    if participant_ids.contains(&me) {
      return Err(Error::Invalid("you cannot introduce yourself".into()));
    }
    let distinct: HashSet<_> = participant_ids.iter().collect();
    if distinct.len() != participant_ids.len() {
      return Err(Error::Invalid("participants must be distinct".into()));
    }

    let limit = self.session.config().introduction_monthly_limit;
    let since = Utc::now() - Duration::days(WINDOW_DAYS);
    let sent = self
      .store()
      .count_introductions_since(me, since)
      .await
      .map_err(Error::remote)?;
    if sent >= limit {
      return Err(Error::Conflict(format!(
        "introduction limit reached ({limit} per {WINDOW_DAYS} days)"
      )));
    }

    let message = message.map(|m| m.trim().to_owned()).filter(|m| !m.is_empty());
    let intro = self
      .store()
      .add_introduction(NewIntroduction {
        sender_id: me,
        participant_ids,
        message,
      })
      .await
      .map_err(Error::remote)?;
    tracing::info!(
      introduction_id = %intro.introduction_id,
      participants = intro.participants.len(),
      "introduction sent"
    );

    let sender = self.session.display_name();
    for participant in &intro.participants {
      notify(self.store(), NewNotification {
        recipient_id: participant.user_id,
        kind:         NotificationKind::Introduction,
        title:        "New introduction".into(),
        message:      format!("{sender} introduced you to {} people", intro.participants.len() - 1),
        payload:      json!({ "introduction_id": intro.introduction_id, "sender_id": me }),
      })
      .await;
    }

    self.reload_after_write().await;
    Ok(intro)
  }

  /// Answer an introduction. Only the caller's own row changes, and only
  /// while it is pending.
  pub async fn respond(
    &self,
    introduction_id: Uuid,
    response: IntroResponse,
  ) -> Result<IntroParticipant> {
    let me = self.me();
    if response == IntroResponse::Pending {
      return Err(Error::Invalid("a response must accept or decline".into()));
    }
    let intro = self
      .store()
      .get_introduction(introduction_id)
      .await
      .map_err(Error::remote)?
      .ok_or_else(|| Error::not_found("introduction", introduction_id))?;
    let own = intro
      .participant(me)
      .ok_or_else(|| Error::Forbidden("not part of this introduction".into()))?;
    if own.response != IntroResponse::Pending {
      return Err(Error::Conflict(format!(
        "already {} this introduction",
        own.response.as_str()
      )));
    }

    let row = self
      .store()
      .set_intro_response(introduction_id, me, response)
      .await
      .map_err(Error::remote)?
      .ok_or_else(|| Error::not_found("introduction", introduction_id))?;
    tracing::info!(%introduction_id, response = response.as_str(), "introduction answered");

    notify(self.store(), NewNotification {
      recipient_id: intro.sender_id,
      kind:         NotificationKind::IntroductionResponse,
      title:        "Introduction response".into(),
      message:      format!(
        "{} {} your introduction",
        self.session.display_name(),
        response.as_str()
      ),
      payload:      json!({ "introduction_id": introduction_id, "response": response }),
    })
    .await;

    self.reload_after_write().await;
    Ok(row)
  }

  pub async fn reload(&self) -> Result<()> {
    let all = self
      .store()
      .list_introductions(self.me())
      .await
      .map_err(Error::remote)?;
    *self.loaded.lock() = all.into();
    Ok(())
  }

  /// Introductions the signed-in user sent, newest first.
  pub fn sent(&self) -> Vec<Introduction> {
    let me = self.me();
    self.loaded.lock().iter().filter(|i| i.sender_id == me).cloned().collect()
  }

  /// Introductions the signed-in user was introduced in, newest first.
  pub fn received(&self) -> Vec<Introduction> {
    let me = self.me();
    self
      .loaded
      .lock()
      .iter()
      .filter(|i| i.participant(me).is_some())
      .cloned()
      .collect()
  }

  pub fn watch(self: &Arc<Self>, bus: &InvalidationBus<S>) -> Subscription {
    let this = Arc::downgrade(self);
    bus.subscribe(Group::Introductions, move || {
      let this = this.upgrade();
      async move {
        match this {
          Some(this) => this.reload().await,
          None => Ok(()),
        }
      }
    })
  }

  async fn reload_after_write(&self) {
    if let Err(e) = self.reload().await {
      tracing::warn!(user_id = %self.me(), error = %e, "introduction reload failed");
    }
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration as StdDuration;

  use rapport_core::store::{IntroductionStore, NotificationStore};

  use super::*;
  use crate::testing::{ProbeStore, probe, seed_user, signed_in};

  async fn users(store: &ProbeStore, names: &[&str]) -> Vec<Uuid> {
    let mut ids = Vec::new();
    for name in names {
      ids.push(seed_user(store, name).await);
    }
    ids
  }

  #[tokio::test]
  async fn send_notifies_each_participant() {
    let store = probe().await;
    let ids = users(&store, &["Alice", "Bob", "Carol"]).await;
    let intros = Introductions::new(signed_in(&store, ids[0]).await);

    let intro = intros
      .send(vec![ids[1], ids[2]], Some(" You both like sailing ".into()))
      .await
      .unwrap();
    assert_eq!(intro.message.as_deref(), Some("You both like sailing"));
    assert_eq!(intro.participants.len(), 2);
    assert!(intro.participants.iter().all(|p| p.response == IntroResponse::Pending));

    for id in &ids[1..] {
      let notes = store.list_notifications(*id).await.unwrap();
      assert_eq!(notes.len(), 1);
      assert_eq!(notes[0].kind, NotificationKind::Introduction);
    }
    assert_eq!(intros.sent().len(), 1);
    assert!(intros.received().is_empty());
  }

  #[tokio::test]
  async fn send_validates_participants() {
    let store = probe().await;
    let ids = users(&store, &["Alice", "Bob", "Carol"]).await;
    let intros = Introductions::new(signed_in(&store, ids[0]).await);

    for bad in [
      vec![ids[1]],
      vec![ids[1], ids[1]],
      vec![ids[0], ids[1]],
      (0..6).map(|_| Uuid::new_v4()).collect(),
    ] {
      let err = intros.send(bad, None).await.unwrap_err();
      assert!(matches!(err, Error::Invalid(_)), "{err:?}");
    }
  }

  #[tokio::test]
  async fn rolling_limit_is_a_conflict() {
    let store = probe().await;
    let ids = users(&store, &["Alice", "Bob", "Carol"]).await;
    let mut config = crate::ClientConfig::default();
    config.introduction_monthly_limit = 2;
    let session = Session::sign_in(store.clone(), ids[0], config).await.unwrap();
    let intros = Introductions::new(session);

    intros.send(vec![ids[1], ids[2]], None).await.unwrap();
    intros.send(vec![ids[2], ids[1]], None).await.unwrap();
    let err = intros.send(vec![ids[1], ids[2]], None).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
    assert_eq!(intros.sent().len(), 2);
  }

  #[tokio::test]
  async fn participant_answers_own_row_once() {
    let store = probe().await;
    let ids = users(&store, &["Alice", "Bob", "Carol", "Dan"]).await;
    let alice = Introductions::new(signed_in(&store, ids[0]).await);
    let bob = Introductions::new(signed_in(&store, ids[1]).await);
    let dan = Introductions::new(signed_in(&store, ids[3]).await);

    let intro = alice.send(vec![ids[1], ids[2]], None).await.unwrap();

    let row = bob
      .respond(intro.introduction_id, IntroResponse::Accepted)
      .await
      .unwrap();
    assert_eq!(row.user_id, ids[1]);
    assert_eq!(row.response, IntroResponse::Accepted);
    assert!(row.responded_at.is_some());

    let stored = store.get_introduction(intro.introduction_id).await.unwrap().unwrap();
    assert_eq!(stored.participant(ids[2]).unwrap().response, IntroResponse::Pending);
    assert_eq!(bob.received().len(), 1);

    let err = bob
      .respond(intro.introduction_id, IntroResponse::Declined)
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
    let err = dan
      .respond(intro.introduction_id, IntroResponse::Accepted)
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));
    let err = bob.respond(Uuid::new_v4(), IntroResponse::Accepted).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    let to_sender = store.list_notifications(ids[0]).await.unwrap();
    assert_eq!(to_sender.len(), 1);
    assert_eq!(to_sender[0].kind, NotificationKind::IntroductionResponse);
  }

  #[tokio::test]
  async fn watch_reloads_on_remote_change() {
    let store = probe().await;
    let ids = users(&store, &["Alice", "Bob", "Carol"]).await;
    let alice = Introductions::new(signed_in(&store, ids[0]).await);
    let bob = Arc::new(Introductions::new(signed_in(&store, ids[1]).await));
    let bus = InvalidationBus::new(store.clone());
    let _sub = bob.watch(&bus);

    alice.send(vec![ids[1], ids[2]], None).await.unwrap();
    tokio::time::timeout(StdDuration::from_secs(5), async {
      while bob.received().is_empty() {
        tokio::task::yield_now().await;
      }
    })
    .await
    .expect("bus reload");
  }
}
