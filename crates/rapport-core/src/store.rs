//! The remote store interface.
//!
//! The client never talks to a database directly. Everything it reads or
//! writes goes through these traits, implemented by a backend such as
//! `rapport-store-sqlite`. The traits are split by record group so that a
//! component can name only what it touches; [`RemoteStore`] is the union.
//!
//! All methods return `Send` futures so the traits can be used in
//! multi-threaded async runtimes and from spawned tasks.

use std::{collections::HashSet, future::Future};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  change::{ChangeStream, EventMask, Table},
  contact::{Contact, ContactPatch, NewContact},
  introduction::{IntroParticipant, IntroResponse, Introduction, NewIntroduction},
  meeting::{
    Meeting, MeetingNote, MeetingPatch, MeetingStatus, NewMeeting,
    NewParticipant, Participant, ResponseRecord,
  },
  notification::{NewNotification, Notification},
  profile::{NewProfile, Profile, ProfilePatch, ProfileQuery, UserSettings},
  relationship::{
    Direction, NewRequest, RelationshipRequest, RequestStatus,
    RequestWithProfile,
  },
};

// ─── Backend ─────────────────────────────────────────────────────────────────

/// Shared error type for every store trait a backend implements.
pub trait Backend: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;
}

// ─── Profiles ────────────────────────────────────────────────────────────────

pub trait ProfileStore: Backend {
  /// Create the profile for a newly registered user.
  fn add_profile(
    &self,
    input: NewProfile,
  ) -> impl Future<Output = Result<Profile, Self::Error>> + Send + '_;

  fn get_profile(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Option<Profile>, Self::Error>> + Send + '_;

  /// Returns `None` if the profile does not exist.
  fn update_profile(
    &self,
    user_id: Uuid,
    patch: ProfilePatch,
  ) -> impl Future<Output = Result<Option<Profile>, Self::Error>> + Send + '_;

  /// Case-insensitive substring search over public profile fields.
  fn search_profiles<'a>(
    &'a self,
    query: &'a ProfileQuery,
  ) -> impl Future<Output = Result<Vec<Profile>, Self::Error>> + Send + 'a;

  /// The subset of `user_ids` whose owners marked their profile private.
  fn private_profiles<'a>(
    &'a self,
    user_ids: &'a [Uuid],
  ) -> impl Future<Output = Result<HashSet<Uuid>, Self::Error>> + Send + 'a;

  /// Server-computed check: may `viewer` see `target`'s full profile?
  fn can_view_profile(
    &self,
    viewer: Uuid,
    target: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn get_settings(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Option<UserSettings>, Self::Error>> + Send + '_;

  /// Insert or replace the settings row and return what was stored.
  fn upsert_settings(
    &self,
    settings: UserSettings,
  ) -> impl Future<Output = Result<UserSettings, Self::Error>> + Send + '_;
}

// ─── Contacts ────────────────────────────────────────────────────────────────

pub trait ContactStore: Backend {
  /// All contacts owned by `owner_id`, newest first.
  fn list_contacts(
    &self,
    owner_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Contact>, Self::Error>> + Send + '_;

  fn get_contact(
    &self,
    contact_id: Uuid,
  ) -> impl Future<Output = Result<Option<Contact>, Self::Error>> + Send + '_;

  /// The oldest contact owned by `owner_id` that was copied from
  /// `linked_user_id`.
  fn find_linked_contact(
    &self,
    owner_id: Uuid,
    linked_user_id: Uuid,
  ) -> impl Future<Output = Result<Option<Contact>, Self::Error>> + Send + '_;

  fn add_contact(
    &self,
    input: NewContact,
  ) -> impl Future<Output = Result<Contact, Self::Error>> + Send + '_;

  fn update_contact(
    &self,
    contact_id: Uuid,
    patch: ContactPatch,
  ) -> impl Future<Output = Result<Option<Contact>, Self::Error>> + Send + '_;

  /// Returns `false` if nothing was deleted.
  fn delete_contact(
    &self,
    contact_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}

// ─── Relationship requests ───────────────────────────────────────────────────

pub trait RequestStore: Backend {
  /// Every request between `a` and `b`, in either direction.
  fn requests_between(
    &self,
    a: Uuid,
    b: Uuid,
  ) -> impl Future<Output = Result<Vec<RelationshipRequest>, Self::Error>> + Send + '_;

  fn get_request(
    &self,
    request_id: Uuid,
  ) -> impl Future<Output = Result<Option<RelationshipRequest>, Self::Error>>
  + Send
  + '_;

  /// Insert a `pending` request.
  fn add_request(
    &self,
    input: NewRequest,
  ) -> impl Future<Output = Result<RelationshipRequest, Self::Error>> + Send + '_;

  fn set_request_status(
    &self,
    request_id: Uuid,
    status: RequestStatus,
  ) -> impl Future<Output = Result<Option<RelationshipRequest>, Self::Error>>
  + Send
  + '_;

  /// Requests on one side of `user_id`, newest first, each joined with the
  /// other party's profile.
  fn list_requests(
    &self,
    user_id: Uuid,
    direction: Direction,
  ) -> impl Future<Output = Result<Vec<RequestWithProfile>, Self::Error>> + Send + '_;
}

// ─── Meetings ────────────────────────────────────────────────────────────────

pub trait MeetingStore: Backend {
  /// Meetings `user_id` organizes or is a registered participant of,
  /// ordered by date and time.
  fn list_meetings(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Meeting>, Self::Error>> + Send + '_;

  fn get_meeting(
    &self,
    meeting_id: Uuid,
  ) -> impl Future<Output = Result<Option<Meeting>, Self::Error>> + Send + '_;

  /// Meetings whose `parent_meeting_id` is `parent_id`.
  fn child_meetings(
    &self,
    parent_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Meeting>, Self::Error>> + Send + '_;

  fn add_meeting(
    &self,
    input: NewMeeting,
  ) -> impl Future<Output = Result<Meeting, Self::Error>> + Send + '_;

  fn update_meeting(
    &self,
    meeting_id: Uuid,
    patch: MeetingPatch,
  ) -> impl Future<Output = Result<Option<Meeting>, Self::Error>> + Send + '_;

  fn set_meeting_status(
    &self,
    meeting_id: Uuid,
    status: MeetingStatus,
  ) -> impl Future<Output = Result<Option<Meeting>, Self::Error>> + Send + '_;

  /// Null `parent_meeting_id` on every child of `parent_id`. Returns the
  /// number of children detached.
  fn detach_children(
    &self,
    parent_id: Uuid,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Null `connection_id` on every meeting pointing at `contact_id`.
  fn clear_connection(
    &self,
    contact_id: Uuid,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Delete the meeting row only. Returns `false` if it did not exist.
  fn delete_meeting(
    &self,
    meeting_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Participants ──────────────────────────────────────────────────────

  fn list_participants(
    &self,
    meeting_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Participant>, Self::Error>> + Send + '_;

  fn get_participant(
    &self,
    participant_id: Uuid,
  ) -> impl Future<Output = Result<Option<Participant>, Self::Error>> + Send + '_;

  fn add_participants(
    &self,
    meeting_id: Uuid,
    input: Vec<NewParticipant>,
  ) -> impl Future<Output = Result<Vec<Participant>, Self::Error>> + Send + '_;

  fn record_response(
    &self,
    participant_id: Uuid,
    record: ResponseRecord,
  ) -> impl Future<Output = Result<Option<Participant>, Self::Error>> + Send + '_;

  fn delete_participants(
    &self,
    meeting_id: Uuid,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  // ── Notes ─────────────────────────────────────────────────────────────

  fn list_notes(
    &self,
    meeting_id: Uuid,
  ) -> impl Future<Output = Result<Vec<MeetingNote>, Self::Error>> + Send + '_;

  fn add_note(
    &self,
    meeting_id: Uuid,
    author_id: Uuid,
    body: String,
  ) -> impl Future<Output = Result<MeetingNote, Self::Error>> + Send + '_;

  fn delete_notes(
    &self,
    meeting_id: Uuid,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;
}

// ─── Introductions ───────────────────────────────────────────────────────────

pub trait IntroductionStore: Backend {
  /// Insert the introduction and one `pending` row per participant.
  fn add_introduction(
    &self,
    input: NewIntroduction,
  ) -> impl Future<Output = Result<Introduction, Self::Error>> + Send + '_;

  fn get_introduction(
    &self,
    introduction_id: Uuid,
  ) -> impl Future<Output = Result<Option<Introduction>, Self::Error>> + Send + '_;

  /// Introductions `user_id` sent or takes part in, newest first.
  fn list_introductions(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Introduction>, Self::Error>> + Send + '_;

  fn count_introductions_since(
    &self,
    sender_id: Uuid,
    since: DateTime<Utc>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Write one participant's own response row.
  fn set_intro_response(
    &self,
    introduction_id: Uuid,
    user_id: Uuid,
    response: IntroResponse,
  ) -> impl Future<Output = Result<Option<IntroParticipant>, Self::Error>>
  + Send
  + '_;
}

// ─── Notifications ───────────────────────────────────────────────────────────

pub trait NotificationStore: Backend {
  /// Write a notification row for its recipient.
  fn dispatch_notification(
    &self,
    input: NewNotification,
  ) -> impl Future<Output = Result<Notification, Self::Error>> + Send + '_;

  /// Newest first.
  fn list_notifications(
    &self,
    recipient_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Notification>, Self::Error>> + Send + '_;

  fn mark_notification_read(
    &self,
    notification_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn mark_all_read(
    &self,
    recipient_id: Uuid,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;
}

// ─── Change feed ─────────────────────────────────────────────────────────────

pub trait ChangeFeed: Backend {
  /// Open a subscription to changes on `table` matching `mask`.
  ///
  /// Each call opens an independent channel; callers are expected to share
  /// one subscription per table.
  fn subscribe(&self, table: Table, mask: EventMask) -> ChangeStream;
}

// ─── Union ───────────────────────────────────────────────────────────────────

/// Everything the client needs from a backend.
pub trait RemoteStore:
  ProfileStore
  + ContactStore
  + RequestStore
  + MeetingStore
  + IntroductionStore
  + NotificationStore
  + ChangeFeed
{
}

impl<T> RemoteStore for T where
  T: ProfileStore
    + ContactStore
    + RequestStore
    + MeetingStore
    + IntroductionStore
    + NotificationStore
    + ChangeFeed
{
}
