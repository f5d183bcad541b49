//! Notification delivery and the signed-in user's notification feed.

use std::sync::Arc;

use parking_lot::Mutex;
use rapport_core::{
  notification::{NewNotification, Notification},
  store::{NotificationStore, RemoteStore},
};
use uuid::Uuid;

use crate::{Error, Result, Session};

/// Write a notification as the side effect of a transition that already
/// committed. Failure is logged and otherwise ignored.
pub(crate) async fn notify<S: NotificationStore>(store: &S, input: NewNotification) -> bool {
  let recipient = input.recipient_id;
  let kind = input.kind.as_str();
  match store.dispatch_notification(input).await {
    Ok(_) => true,
    Err(e) => {
      tracing::warn!(%recipient, kind, error = %e, "notification not delivered");
      false
    }
  }
}

/// The signed-in user's notifications, newest first.
pub struct NotificationFeed<S> {
  session: Arc<Session<S>>,
  items:   Mutex<Arc<[Notification]>>,
}

impl<S: RemoteStore + 'static> NotificationFeed<S> {
  pub fn new(session: Arc<Session<S>>) -> Self {
    Self { session, items: Mutex::new(Arc::from([])) }
  }

  pub async fn load(&self) -> Result<Arc<[Notification]>> {
    let items: Arc<[Notification]> = self
      .session
      .store()
      .list_notifications(self.session.user_id())
      .await
      .map_err(Error::remote)?
      .into();
    *self.items.lock() = items.clone();
    Ok(items)
  }

  pub fn items(&self) -> Arc<[Notification]> { self.items.lock().clone() }

  pub fn unread_count(&self) -> usize { self.items.lock().iter().filter(|n| !n.read).count() }

  pub async fn mark_read(&self, notification_id: Uuid) -> Result<()> {
    let owned = self
      .items
      .lock()
      .iter()
      .any(|n| n.notification_id == notification_id);
    if !owned {
      return Err(Error::not_found("notification", notification_id));
    }
    self
      .session
      .store()
      .mark_notification_read(notification_id)
      .await
      .map_err(Error::remote)?;
    self.mark_local(|n| n.notification_id == notification_id);
    Ok(())
  }

  pub async fn mark_all_read(&self) -> Result<u64> {
    let n = self
      .session
      .store()
      .mark_all_read(self.session.user_id())
      .await
      .map_err(Error::remote)?;
    self.mark_local(|_| true);
    Ok(n)
  }

  fn mark_local(&self, matches: impl Fn(&Notification) -> bool) {
    let mut items = self.items.lock();
    let updated: Vec<Notification> = items
      .iter()
      .cloned()
      .map(|mut n| {
        if matches(&n) {
          n.read = true;
        }
        n
      })
      .collect();
    *items = updated.into();
  }
}
