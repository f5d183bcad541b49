//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`)
//! so that text ordering matches time ordering. Calendar dates and times use
//! their ISO forms. UUIDs are stored as hyphenated lowercase strings.

use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, SubsecRound as _, Utc};
use rapport_core::{
  contact::{Contact, ContactSource},
  introduction::{IntroParticipant, IntroResponse},
  meeting::{Meeting, MeetingNote, MeetingStatus, Participant, ParticipantResponse},
  notification::{Notification, NotificationKind},
  profile::{Profile, UserSettings},
  relationship::{RelationshipRequest, RequestStatus},
};
use rusqlite::Row;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

/// The current time at the precision timestamps are stored with, so that a
/// record returned from a write equals the same record read back.
pub fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_time(t: NaiveTime) -> String { t.format("%H:%M:%S").to_string() }

pub fn decode_time(s: &str) -> Result<NaiveTime> {
  NaiveTime::parse_from_str(s, "%H:%M:%S")
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Enums ───────────────────────────────────────────────────────────────────

fn unknown(column: &'static str, value: &str) -> Error {
  Error::Decode { column, value: value.to_owned() }
}

pub fn decode_contact_source(s: &str) -> Result<ContactSource> {
  match s {
    "manual" => Ok(ContactSource::Manual),
    "connection" => Ok(ContactSource::Connection),
    "card" => Ok(ContactSource::Card),
    other => Err(unknown("contacts.source", other)),
  }
}

pub fn decode_request_status(s: &str) -> Result<RequestStatus> {
  match s {
    "pending" => Ok(RequestStatus::Pending),
    "accepted" => Ok(RequestStatus::Accepted),
    "declined" => Ok(RequestStatus::Declined),
    other => Err(unknown("relationship_requests.status", other)),
  }
}

pub fn decode_meeting_status(s: &str) -> Result<MeetingStatus> {
  match s {
    "pending" => Ok(MeetingStatus::Pending),
    "confirmed" => Ok(MeetingStatus::Confirmed),
    "declined" => Ok(MeetingStatus::Declined),
    "cancelled" => Ok(MeetingStatus::Cancelled),
    "rescheduled" => Ok(MeetingStatus::Rescheduled),
    other => Err(unknown("meetings.status", other)),
  }
}

pub fn decode_response(s: &str) -> Result<ParticipantResponse> {
  match s {
    "confirmed" => Ok(ParticipantResponse::Confirmed),
    "declined" => Ok(ParticipantResponse::Declined),
    "rescheduled" => Ok(ParticipantResponse::Rescheduled),
    other => Err(unknown("meeting_participants.response", other)),
  }
}

pub fn decode_intro_response(s: &str) -> Result<IntroResponse> {
  match s {
    "pending" => Ok(IntroResponse::Pending),
    "accepted" => Ok(IntroResponse::Accepted),
    "declined" => Ok(IntroResponse::Declined),
    other => Err(unknown("introduction_participants.response", other)),
  }
}

pub fn decode_notification_kind(s: &str) -> Result<NotificationKind> {
  serde_json::from_value(serde_json::Value::String(s.to_owned()))
    .map_err(|_| unknown("notifications.kind", s))
}

// ─── Profiles ────────────────────────────────────────────────────────────────

pub const PROFILE_COLUMNS: &str = "user_id, full_name, email, phone, job_title, \
                                   company, bio, avatar_url, created_at, updated_at";

/// Raw strings read directly from a `profiles` row.
pub struct RawProfile {
  pub user_id:    String,
  pub full_name:  String,
  pub email:      Option<String>,
  pub phone:      Option<String>,
  pub job_title:  Option<String>,
  pub company:    Option<String>,
  pub bio:        Option<String>,
  pub avatar_url: Option<String>,
  pub created_at: String,
  pub updated_at: String,
}

impl RawProfile {
  /// Read the ten profile columns starting at `at`.
  pub fn from_row(row: &Row<'_>, at: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:    row.get(at)?,
      full_name:  row.get(at + 1)?,
      email:      row.get(at + 2)?,
      phone:      row.get(at + 3)?,
      job_title:  row.get(at + 4)?,
      company:    row.get(at + 5)?,
      bio:        row.get(at + 6)?,
      avatar_url: row.get(at + 7)?,
      created_at: row.get(at + 8)?,
      updated_at: row.get(at + 9)?,
    })
  }

  pub fn into_profile(self) -> Result<Profile> {
    Ok(Profile {
      user_id:    decode_uuid(&self.user_id)?,
      full_name:  self.full_name,
      email:      self.email,
      phone:      self.phone,
      job_title:  self.job_title,
      company:    self.company,
      bio:        self.bio,
      avatar_url: self.avatar_url,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

pub struct RawSettings {
  pub user_id:             String,
  pub is_private:          bool,
  pub email_notifications: bool,
  pub updated_at:          String,
}

impl RawSettings {
  pub fn into_settings(self) -> Result<UserSettings> {
    Ok(UserSettings {
      user_id:             decode_uuid(&self.user_id)?,
      is_private:          self.is_private,
      email_notifications: self.email_notifications,
      updated_at:          decode_dt(&self.updated_at)?,
    })
  }
}

// ─── Contacts ────────────────────────────────────────────────────────────────

pub const CONTACT_COLUMNS: &str = "contact_id, owner_id, linked_user_id, full_name, \
                                   job_title, company, email, phone, avatar_url, \
                                   notes, source, created_at";

pub struct RawContact {
  pub contact_id:     String,
  pub owner_id:       String,
  pub linked_user_id: Option<String>,
  pub full_name:      String,
  pub job_title:      Option<String>,
  pub company:        Option<String>,
  pub email:          Option<String>,
  pub phone:          Option<String>,
  pub avatar_url:     Option<String>,
  pub notes:          Option<String>,
  pub source:         String,
  pub created_at:     String,
}

impl RawContact {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      contact_id:     row.get(0)?,
      owner_id:       row.get(1)?,
      linked_user_id: row.get(2)?,
      full_name:      row.get(3)?,
      job_title:      row.get(4)?,
      company:        row.get(5)?,
      email:          row.get(6)?,
      phone:          row.get(7)?,
      avatar_url:     row.get(8)?,
      notes:          row.get(9)?,
      source:         row.get(10)?,
      created_at:     row.get(11)?,
    })
  }

  pub fn into_contact(self) -> Result<Contact> {
    Ok(Contact {
      contact_id:     decode_uuid(&self.contact_id)?,
      owner_id:       decode_uuid(&self.owner_id)?,
      linked_user_id: decode_opt_uuid(self.linked_user_id)?,
      full_name:      self.full_name,
      job_title:      self.job_title,
      company:        self.company,
      email:          self.email,
      phone:          self.phone,
      avatar_url:     self.avatar_url,
      notes:          self.notes,
      source:         decode_contact_source(&self.source)?,
      created_at:     decode_dt(&self.created_at)?,
    })
  }
}

// ─── Relationship requests ───────────────────────────────────────────────────

pub const REQUEST_COLUMNS: &str =
  "request_id, requester_id, target_id, status, created_at, updated_at";

pub struct RawRequest {
  pub request_id:   String,
  pub requester_id: String,
  pub target_id:    String,
  pub status:       String,
  pub created_at:   String,
  pub updated_at:   String,
}

impl RawRequest {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      request_id:   row.get(0)?,
      requester_id: row.get(1)?,
      target_id:    row.get(2)?,
      status:       row.get(3)?,
      created_at:   row.get(4)?,
      updated_at:   row.get(5)?,
    })
  }

  pub fn into_request(self) -> Result<RelationshipRequest> {
    Ok(RelationshipRequest {
      request_id:   decode_uuid(&self.request_id)?,
      requester_id: decode_uuid(&self.requester_id)?,
      target_id:    decode_uuid(&self.target_id)?,
      status:       decode_request_status(&self.status)?,
      created_at:   decode_dt(&self.created_at)?,
      updated_at:   decode_dt(&self.updated_at)?,
    })
  }
}

// ─── Meetings ────────────────────────────────────────────────────────────────

pub const MEETING_COLUMNS: &str = "m.meeting_id, m.organizer_id, m.connection_id, \
                                   m.title, m.description, m.date, m.time, \
                                   m.location, m.status, m.parent_meeting_id, \
                                   m.reminder_sent, m.follow_up_sent, \
                                   m.created_at, m.updated_at";

pub struct RawMeeting {
  pub meeting_id:        String,
  pub organizer_id:      String,
  pub connection_id:     Option<String>,
  pub title:             String,
  pub description:       Option<String>,
  pub date:              String,
  pub time:              String,
  pub location:          Option<String>,
  pub status:            String,
  pub parent_meeting_id: Option<String>,
  pub reminder_sent:     bool,
  pub follow_up_sent:    bool,
  pub created_at:        String,
  pub updated_at:        String,
}

impl RawMeeting {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      meeting_id:        row.get(0)?,
      organizer_id:      row.get(1)?,
      connection_id:     row.get(2)?,
      title:             row.get(3)?,
      description:       row.get(4)?,
      date:              row.get(5)?,
      time:              row.get(6)?,
      location:          row.get(7)?,
      status:            row.get(8)?,
      parent_meeting_id: row.get(9)?,
      reminder_sent:     row.get(10)?,
      follow_up_sent:    row.get(11)?,
      created_at:        row.get(12)?,
      updated_at:        row.get(13)?,
    })
  }

  pub fn into_meeting(self) -> Result<Meeting> {
    Ok(Meeting {
      meeting_id:        decode_uuid(&self.meeting_id)?,
      organizer_id:      decode_uuid(&self.organizer_id)?,
      connection_id:     decode_opt_uuid(self.connection_id)?,
      title:             self.title,
      description:       self.description,
      date:              decode_date(&self.date)?,
      time:              decode_time(&self.time)?,
      location:          self.location,
      status:            decode_meeting_status(&self.status)?,
      parent_meeting_id: decode_opt_uuid(self.parent_meeting_id)?,
      reminder_sent:     self.reminder_sent,
      follow_up_sent:    self.follow_up_sent,
      created_at:        decode_dt(&self.created_at)?,
      updated_at:        decode_dt(&self.updated_at)?,
    })
  }
}

pub const PARTICIPANT_COLUMNS: &str = "participant_id, meeting_id, email, display_name, \
                                       user_id, response, suggested_time, responded_at";

pub struct RawParticipant {
  pub participant_id: String,
  pub meeting_id:     String,
  pub email:          String,
  pub display_name:   Option<String>,
  pub user_id:        Option<String>,
  pub response:       Option<String>,
  pub suggested_time: Option<String>,
  pub responded_at:   Option<String>,
}

impl RawParticipant {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      participant_id: row.get(0)?,
      meeting_id:     row.get(1)?,
      email:          row.get(2)?,
      display_name:   row.get(3)?,
      user_id:        row.get(4)?,
      response:       row.get(5)?,
      suggested_time: row.get(6)?,
      responded_at:   row.get(7)?,
    })
  }

  pub fn into_participant(self) -> Result<Participant> {
    Ok(Participant {
      participant_id: decode_uuid(&self.participant_id)?,
      meeting_id:     decode_uuid(&self.meeting_id)?,
      email:          self.email,
      display_name:   self.display_name,
      user_id:        decode_opt_uuid(self.user_id)?,
      response:       self.response.as_deref().map(decode_response).transpose()?,
      suggested_time: self.suggested_time,
      responded_at:   decode_opt_dt(self.responded_at)?,
    })
  }
}

pub struct RawNote {
  pub note_id:    String,
  pub meeting_id: String,
  pub author_id:  String,
  pub body:       String,
  pub created_at: String,
}

impl RawNote {
  pub fn into_note(self) -> Result<MeetingNote> {
    Ok(MeetingNote {
      note_id:    decode_uuid(&self.note_id)?,
      meeting_id: decode_uuid(&self.meeting_id)?,
      author_id:  decode_uuid(&self.author_id)?,
      body:       self.body,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

// ─── Introductions ───────────────────────────────────────────────────────────

pub struct RawIntroduction {
  pub introduction_id: String,
  pub sender_id:       String,
  pub message:         Option<String>,
  pub created_at:      String,
}

pub struct RawIntroParticipant {
  pub introduction_id: String,
  pub user_id:         String,
  pub response:        String,
  pub responded_at:    Option<String>,
}

impl RawIntroParticipant {
  pub fn into_participant(self) -> Result<IntroParticipant> {
    Ok(IntroParticipant {
      introduction_id: decode_uuid(&self.introduction_id)?,
      user_id:         decode_uuid(&self.user_id)?,
      response:        decode_intro_response(&self.response)?,
      responded_at:    decode_opt_dt(self.responded_at)?,
    })
  }
}

// ─── Notifications ───────────────────────────────────────────────────────────

pub struct RawNotification {
  pub notification_id: String,
  pub recipient_id:    String,
  pub kind:            String,
  pub title:           String,
  pub message:         String,
  pub payload:         String,
  pub read:            bool,
  pub created_at:      String,
}

impl RawNotification {
  pub fn into_notification(self) -> Result<Notification> {
    Ok(Notification {
      notification_id: decode_uuid(&self.notification_id)?,
      recipient_id:    decode_uuid(&self.recipient_id)?,
      kind:            decode_notification_kind(&self.kind)?,
      title:           self.title,
      message:         self.message,
      payload:         serde_json::from_str(&self.payload)?,
      read:            self.read,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}
