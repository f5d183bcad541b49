//! Notifications: write-once side effects of state-machine transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
  ConnectionRequest,
  ConnectionAccepted,
  MeetingInvite,
  MeetingUpdated,
  MeetingCancelled,
  MeetingResponse,
  Introduction,
  IntroductionResponse,
}

impl NotificationKind {
  /// The discriminant stored in the `kind` column. Must match the serde
  /// tags above.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::ConnectionRequest => "connection_request",
      Self::ConnectionAccepted => "connection_accepted",
      Self::MeetingInvite => "meeting_invite",
      Self::MeetingUpdated => "meeting_updated",
      Self::MeetingCancelled => "meeting_cancelled",
      Self::MeetingResponse => "meeting_response",
      Self::Introduction => "introduction",
      Self::IntroductionResponse => "introduction_response",
    }
  }
}

/// A delivered notification. Only `read` ever changes after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
  pub notification_id: Uuid,
  pub recipient_id:    Uuid,
  pub kind:            NotificationKind,
  pub title:           String,
  pub message:         String,
  /// Structured context (ids of the records involved).
  pub payload:         serde_json::Value,
  pub read:            bool,
  pub created_at:      DateTime<Utc>,
}

/// Input to [`crate::store::NotificationStore::dispatch_notification`].
#[derive(Debug, Clone)]
pub struct NewNotification {
  pub recipient_id: Uuid,
  pub kind:         NotificationKind,
  pub title:        String,
  pub message:      String,
  pub payload:      serde_json::Value,
}
