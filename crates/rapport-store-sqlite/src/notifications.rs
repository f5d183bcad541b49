//! [`NotificationStore`] for [`SqliteStore`].

use rapport_core::{
  change::{ChangeKind, Table},
  notification::{NewNotification, Notification},
  store::NotificationStore,
};
use uuid::Uuid;

use crate::{
  Result, SqliteStore,
  encode::{RawNotification, encode_dt, encode_uuid, now},
};

impl NotificationStore for SqliteStore {
  async fn dispatch_notification(&self, input: NewNotification) -> Result<Notification> {
    let notification = Notification {
      notification_id: Uuid::new_v4(),
      recipient_id:    input.recipient_id,
      kind:            input.kind,
      title:           input.title,
      message:         input.message,
      payload:         input.payload,
      read:            false,
      created_at:      now(),
    };

    let id        = encode_uuid(notification.notification_id);
    let recipient = encode_uuid(notification.recipient_id);
    let kind      = notification.kind.as_str();
    let title     = notification.title.clone();
    let message   = notification.message.clone();
    let payload   = serde_json::to_string(&notification.payload)?;
    let at        = encode_dt(notification.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO notifications (
             notification_id, recipient_id, kind, title, message, payload, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![id, recipient, kind, title, message, payload, at],
        )?;
        Ok(())
      })
      .await?;

    tracing::debug!(
      recipient = %notification.recipient_id,
      kind = kind,
      "notification dispatched"
    );
    self.emit(Table::Notifications, ChangeKind::Insert, Some(notification.notification_id));
    Ok(notification)
  }

  async fn list_notifications(&self, recipient_id: Uuid) -> Result<Vec<Notification>> {
    let recipient = encode_uuid(recipient_id);

    let raws: Vec<RawNotification> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT notification_id, recipient_id, kind, title, message, payload,
                  read, created_at
           FROM notifications WHERE recipient_id = ?1
           ORDER BY created_at DESC, rowid DESC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![recipient], |row| {
            Ok(RawNotification {
              notification_id: row.get(0)?,
              recipient_id:    row.get(1)?,
              kind:            row.get(2)?,
              title:           row.get(3)?,
              message:         row.get(4)?,
              payload:         row.get(5)?,
              read:            row.get(6)?,
              created_at:      row.get(7)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawNotification::into_notification).collect()
  }

  async fn mark_notification_read(&self, notification_id: Uuid) -> Result<bool> {
    let id = encode_uuid(notification_id);
    let n = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE notifications SET read = 1 WHERE notification_id = ?1 AND read = 0",
          rusqlite::params![id],
        )?)
      })
      .await?;

    if n > 0 {
      self.emit(Table::Notifications, ChangeKind::Update, Some(notification_id));
    }
    Ok(n > 0)
  }

  async fn mark_all_read(&self, recipient_id: Uuid) -> Result<u64> {
    let recipient = encode_uuid(recipient_id);
    let n = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE notifications SET read = 1 WHERE recipient_id = ?1 AND read = 0",
          rusqlite::params![recipient],
        )?)
      })
      .await?;

    if n > 0 {
      self.emit(Table::Notifications, ChangeKind::Update, None);
    }
    Ok(n as u64)
  }
}
