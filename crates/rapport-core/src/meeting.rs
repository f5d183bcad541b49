//! Meetings, their participants, and the meeting status state machine.
//!
//! A meeting's `status` is written by whichever flow triggers a transition.
//! It is not recomputed from participant responses; with several
//! participants the most recent response wins.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeetingStatus {
  Pending,
  Confirmed,
  Declined,
  Cancelled,
  Rescheduled,
}

/// What caused a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeetingTrigger {
  /// A participant answered, through the app or a signed link.
  Respond(ParticipantResponse),
  /// The organizer cancelled.
  Cancel,
  /// The organizer moved the date or time.
  Reschedule,
}

impl MeetingStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Confirmed => "confirmed",
      Self::Declined => "declined",
      Self::Cancelled => "cancelled",
      Self::Rescheduled => "rescheduled",
    }
  }

  pub fn is_cancelled(self) -> bool { self == Self::Cancelled }

  /// The single transition function shared by every entry point.
  ///
  /// `cancelled` is terminal. Cancelling is only possible from `pending` or
  /// `confirmed`. Responses apply to any other live meeting. An organizer
  /// reschedule returns a `rescheduled` meeting to `pending` and leaves a
  /// `pending` one where it is.
  pub fn apply(self, trigger: MeetingTrigger) -> Result<MeetingStatus> {
    let to = match trigger {
      MeetingTrigger::Respond(r) => r.meeting_status(),
      MeetingTrigger::Cancel => Self::Cancelled,
      MeetingTrigger::Reschedule => Self::Pending,
    };
    let allowed = match (self, trigger) {
      (Self::Cancelled, _) => false,
      (Self::Pending | Self::Confirmed, MeetingTrigger::Cancel) => true,
      (_, MeetingTrigger::Cancel) => false,
      (Self::Pending | Self::Rescheduled, MeetingTrigger::Reschedule) => true,
      (_, MeetingTrigger::Reschedule) => false,
      _ => true,
    };
    if allowed {
      Ok(to)
    } else {
      Err(Error::InvalidMeetingTransition {
        from: self.as_str(),
        to:   to.as_str(),
      })
    }
  }
}

// ─── Participant response ────────────────────────────────────────────────────

/// A participant's answer. A participant who has not answered carries
/// `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantResponse {
  Confirmed,
  Declined,
  Rescheduled,
}

impl ParticipantResponse {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Confirmed => "confirmed",
      Self::Declined => "declined",
      Self::Rescheduled => "rescheduled",
    }
  }

  /// The meeting status this answer projects onto.
  pub fn meeting_status(self) -> MeetingStatus {
    match self {
      Self::Confirmed => MeetingStatus::Confirmed,
      Self::Declined => MeetingStatus::Declined,
      Self::Rescheduled => MeetingStatus::Rescheduled,
    }
  }
}

impl FromStr for ParticipantResponse {
  type Err = Error;

  /// Accepts both the stored form (`confirmed`) and the link action form
  /// (`confirm`).
  fn from_str(s: &str) -> Result<Self> {
    match s {
      "confirmed" | "confirm" => Ok(Self::Confirmed),
      "declined" | "decline" => Ok(Self::Declined),
      "rescheduled" | "reschedule" => Ok(Self::Rescheduled),
      other => Err(Error::UnknownVariant {
        kind:  "participant response",
        value: other.to_owned(),
      }),
    }
  }
}

// ─── Records ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meeting {
  pub meeting_id:        Uuid,
  pub organizer_id:      Uuid,
  /// The organizer's contact this meeting is with, if any. Cleared when
  /// that contact is deleted.
  pub connection_id:     Option<Uuid>,
  pub title:             String,
  pub description:       Option<String>,
  pub date:              NaiveDate,
  pub time:              NaiveTime,
  pub location:          Option<String>,
  pub status:            MeetingStatus,
  /// The meeting this one follows up on. Cleared when the parent is deleted.
  pub parent_meeting_id: Option<Uuid>,
  pub reminder_sent:     bool,
  pub follow_up_sent:    bool,
  pub created_at:        DateTime<Utc>,
  pub updated_at:        DateTime<Utc>,
}

/// Input to [`crate::store::MeetingStore::add_meeting`].
#[derive(Debug, Clone)]
pub struct NewMeeting {
  pub organizer_id:      Uuid,
  pub connection_id:     Option<Uuid>,
  pub title:             String,
  pub description:       Option<String>,
  pub date:              NaiveDate,
  pub time:              NaiveTime,
  pub location:          Option<String>,
  pub status:            MeetingStatus,
  pub parent_meeting_id: Option<Uuid>,
}

/// Organizer edits. Status is never part of an edit; it moves only through
/// [`MeetingStatus::apply`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MeetingPatch {
  pub title:         Option<String>,
  pub description:   Option<Option<String>>,
  pub date:          Option<NaiveDate>,
  pub time:          Option<NaiveTime>,
  pub location:      Option<Option<String>>,
  pub connection_id: Option<Option<Uuid>>,
}

impl MeetingPatch {
  /// Whether applying this patch to `meeting` moves it in time.
  pub fn moves(&self, meeting: &Meeting) -> bool {
    self.date.is_some_and(|d| d != meeting.date)
      || self.time.is_some_and(|t| t != meeting.time)
  }

  pub fn apply(self, mut meeting: Meeting) -> Meeting {
    if let Some(v) = self.title {
      meeting.title = v;
    }
    if let Some(v) = self.description {
      meeting.description = v;
    }
    if let Some(v) = self.date {
      meeting.date = v;
    }
    if let Some(v) = self.time {
      meeting.time = v;
    }
    if let Some(v) = self.location {
      meeting.location = v;
    }
    if let Some(v) = self.connection_id {
      meeting.connection_id = v;
    }
    meeting
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
  pub participant_id: Uuid,
  pub meeting_id:     Uuid,
  pub email:          String,
  pub display_name:   Option<String>,
  /// Set when the invitee is a registered user.
  pub user_id:        Option<Uuid>,
  pub response:       Option<ParticipantResponse>,
  /// Free-text alternate time offered with a `rescheduled` response.
  pub suggested_time: Option<String>,
  pub responded_at:   Option<DateTime<Utc>>,
}

/// Input to [`crate::store::MeetingStore::add_participants`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewParticipant {
  pub email:        String,
  pub display_name: Option<String>,
  pub user_id:      Option<Uuid>,
}

/// A participant's recorded answer, written in one step.
#[derive(Debug, Clone)]
pub struct ResponseRecord {
  pub response:       ParticipantResponse,
  pub suggested_time: Option<String>,
  pub responded_at:   DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingNote {
  pub note_id:    Uuid,
  pub meeting_id: Uuid,
  pub author_id:  Uuid,
  pub body:       String,
  pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
  use super::{MeetingStatus::*, MeetingTrigger::*, *};

  #[test]
  fn responses_project_onto_status() {
    assert_eq!(
      Pending.apply(Respond(ParticipantResponse::Confirmed)),
      Ok(Confirmed)
    );
    assert_eq!(
      Pending.apply(Respond(ParticipantResponse::Declined)),
      Ok(Declined)
    );
    assert_eq!(
      Pending.apply(Respond(ParticipantResponse::Rescheduled)),
      Ok(Rescheduled)
    );
  }

  #[test]
  fn last_response_wins() {
    let s = Pending
      .apply(Respond(ParticipantResponse::Confirmed))
      .and_then(|s| s.apply(Respond(ParticipantResponse::Declined)));
    assert_eq!(s, Ok(Declined));
  }

  #[test]
  fn cancel_only_from_pending_or_confirmed() {
    assert_eq!(Pending.apply(Cancel), Ok(Cancelled));
    assert_eq!(Confirmed.apply(Cancel), Ok(Cancelled));
    assert!(Declined.apply(Cancel).is_err());
    assert!(Rescheduled.apply(Cancel).is_err());
  }

  #[test]
  fn cancelled_is_terminal() {
    assert!(Cancelled.apply(Cancel).is_err());
    assert!(Cancelled.apply(Reschedule).is_err());
    assert!(
      Cancelled
        .apply(Respond(ParticipantResponse::Confirmed))
        .is_err()
    );
  }

  #[test]
  fn reschedule_returns_to_pending() {
    assert_eq!(Rescheduled.apply(Reschedule), Ok(Pending));
    assert_eq!(Pending.apply(Reschedule), Ok(Pending));
  }

  #[test]
  fn answered_meetings_are_not_rescheduled() {
    assert!(Confirmed.apply(Reschedule).is_err());
    assert!(Declined.apply(Reschedule).is_err());
  }

  #[test]
  fn link_actions_parse() {
    assert_eq!(
      "decline".parse::<ParticipantResponse>(),
      Ok(ParticipantResponse::Declined)
    );
    assert_eq!(
      "confirmed".parse::<ParticipantResponse>(),
      Ok(ParticipantResponse::Confirmed)
    );
    assert!("maybe".parse::<ParticipantResponse>().is_err());
  }
}
