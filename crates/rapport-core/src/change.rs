//! Change events pushed by the remote store.
//!
//! Events carry only the table, the kind of change and, when known, the
//! affected row. Consumers never merge them; they refetch.

use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Every record set the remote store can report changes for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
  Profiles,
  UserSettings,
  Contacts,
  RelationshipRequests,
  Meetings,
  MeetingParticipants,
  MeetingNotes,
  Introductions,
  IntroductionParticipants,
  Notifications,
}

impl Table {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Profiles => "profiles",
      Self::UserSettings => "user_settings",
      Self::Contacts => "contacts",
      Self::RelationshipRequests => "relationship_requests",
      Self::Meetings => "meetings",
      Self::MeetingParticipants => "meeting_participants",
      Self::MeetingNotes => "meeting_notes",
      Self::Introductions => "introductions",
      Self::IntroductionParticipants => "introduction_participants",
      Self::Notifications => "notifications",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
  Insert,
  Update,
  Delete,
}

/// Which kinds of change a subscriber wants delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventMask {
  pub insert: bool,
  pub update: bool,
  pub delete: bool,
}

impl EventMask {
  pub const ALL: Self = Self { insert: true, update: true, delete: true };

  pub fn contains(self, kind: ChangeKind) -> bool {
    match kind {
      ChangeKind::Insert => self.insert,
      ChangeKind::Update => self.update,
      ChangeKind::Delete => self.delete,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
  pub table:     Table,
  pub kind:      ChangeKind,
  /// Primary key of the affected row. `None` when the feed cannot say which
  /// rows changed (e.g. after falling behind).
  pub record_id: Option<Uuid>,
}

/// A live subscription. Dropping the stream closes it.
pub type ChangeStream = BoxStream<'static, ChangeEvent>;
