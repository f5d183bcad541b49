//! Meetings: creation, organizer edits, cancellation, deletion and
//! participant responses.
//!
//! Every status change goes through [`MeetingStatus::apply`]. Responses have
//! two entry points, the signed-in participant ([`Scheduler::respond`]) and
//! the unauthenticated link ([`crate::respond_via_link`]); both run
//! [`apply_response`].

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, Utc};
use rapport_core::{
  meeting::{
    Meeting, MeetingNote, MeetingPatch, MeetingStatus, MeetingTrigger,
    NewMeeting, NewParticipant, Participant, ParticipantResponse,
    ResponseRecord,
  },
  notification::{NewNotification, NotificationKind},
  store::{MeetingStore, NotificationStore, RemoteStore},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::{Error, Result, Session, Step, notifications::notify};

/// What the organizer fills in to create a meeting.
#[derive(Debug, Clone, Deserialize)]
pub struct MeetingDraft {
  /// One of the organizer's own contacts.
  pub connection_id:     Option<Uuid>,
  pub title:             String,
  pub description:       Option<String>,
  pub date:              NaiveDate,
  pub time:              NaiveTime,
  pub location:          Option<String>,
  #[serde(default)]
  pub participants:      Vec<NewParticipant>,
  /// Makes the new meeting a follow-up of this one.
  #[serde(default)]
  pub parent_meeting_id: Option<Uuid>,
}

/// The meeting and participant row as they stand after a response.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseOutcome {
  pub meeting:     Meeting,
  pub participant: Participant,
}

pub struct Scheduler<S> {
  session: Arc<Session<S>>,
}

impl<S: RemoteStore + 'static> Scheduler<S> {
  pub fn new(session: Arc<Session<S>>) -> Self { Self { session } }

  fn me(&self) -> Uuid { self.session.user_id() }

  fn store(&self) -> &S { self.session.store() }

  // ── Organizer ─────────────────────────────────────────────────────────────

  /// Create a `pending` meeting and invite its participants.
  pub async fn create(&self, draft: MeetingDraft) -> Result<Meeting> {
    let title = draft.title.trim();
    if title.is_empty() {
      return Err(Error::Invalid("meeting title is empty".into()));
    }
    if let Some(contact_id) = draft.connection_id {
      self.own_contact(contact_id).await?;
    }
    if let Some(parent_id) = draft.parent_meeting_id {
      self.organized(parent_id).await?;
    }

    let meeting = self
      .store()
      .add_meeting(NewMeeting {
        organizer_id:      self.me(),
        connection_id:     draft.connection_id,
        title:             title.to_owned(),
        description:       draft.description,
        date:              draft.date,
        time:              draft.time,
        location:          draft.location,
        status:            MeetingStatus::Pending,
        parent_meeting_id: draft.parent_meeting_id,
      })
      .await
      .map_err(Error::remote)?;
    tracing::info!(
      meeting_id = %meeting.meeting_id,
      parent = ?meeting.parent_meeting_id,
      "meeting created"
    );

    if !draft.participants.is_empty()
      && let Err(e) = self.add_and_invite(&meeting, draft.participants).await
    {
      self.session.invalidate_after_write().await;
      return Err(e.after(&[Step::MeetingCreated(meeting.meeting_id)]));
    }

    self.session.invalidate_after_write().await;
    Ok(meeting)
  }

  /// Add participants to a live meeting and invite the registered ones.
  /// Also the way to finish a `create` that failed after the meeting row
  /// was written.
  pub async fn invite(
    &self,
    meeting_id: Uuid,
    participants: Vec<NewParticipant>,
  ) -> Result<Vec<Participant>> {
    let meeting = self.organized(meeting_id).await?;
    if meeting.status.is_cancelled() {
      return Err(Error::Conflict("a cancelled meeting cannot take new participants".into()));
    }
    let added = self.add_and_invite(&meeting, participants).await?;
    self.session.invalidate_after_write().await;
    Ok(added)
  }

  /// Create a meeting chained to `parent_id`. The parent is left as it is.
  pub async fn create_follow_up(
    &self,
    parent_id: Uuid,
    mut draft: MeetingDraft,
  ) -> Result<Meeting> {
    draft.parent_meeting_id = Some(parent_id);
    self.create(draft).await
  }

  pub async fn follow_ups(&self, parent_id: Uuid) -> Result<Vec<Meeting>> {
    self.store().child_meetings(parent_id).await.map_err(Error::remote)
  }

  /// Apply an organizer edit. Moving the date or time of a `rescheduled`
  /// meeting sends it back to `pending` so participants answer again. Any
  /// other status is kept.
  pub async fn update(&self, meeting_id: Uuid, patch: MeetingPatch) -> Result<Meeting> {
    let meeting = self.organized(meeting_id).await?;
    if meeting.status.is_cancelled() {
      return Err(Error::Conflict("a cancelled meeting cannot be edited".into()));
    }
    if let Some(Some(contact_id)) = patch.connection_id {
      self.own_contact(contact_id).await?;
    }

    let next = if patch.moves(&meeting) && meeting.status == MeetingStatus::Rescheduled {
      Some(meeting.status.apply(MeetingTrigger::Reschedule)?)
    } else {
      None
    };

    let mut updated = self
      .store()
      .update_meeting(meeting_id, patch)
      .await
      .map_err(Error::remote)?
      .ok_or_else(|| Error::not_found("meeting", meeting_id))?;

    if let Some(next) = next.filter(|&s| s != updated.status) {
      updated = self
        .store()
        .set_meeting_status(meeting_id, next)
        .await
        .map_err(Error::remote)
        .and_then(|m| m.ok_or_else(|| Error::not_found("meeting", meeting_id)))
        .map_err(|e| e.after(&[Step::MeetingUpdated]))?;
      tracing::info!(%meeting_id, status = next.as_str(), "meeting rescheduled");
    }

    self
      .notify_participants(&updated, NotificationKind::MeetingUpdated, "Meeting updated", "updated")
      .await;
    self.session.invalidate_after_write().await;
    Ok(updated)
  }

  /// Cancel a `pending` or `confirmed` meeting. Recorded participant
  /// responses are kept.
  pub async fn cancel(&self, meeting_id: Uuid) -> Result<Meeting> {
    let meeting = self.organized(meeting_id).await?;
    let next = meeting.status.apply(MeetingTrigger::Cancel)?;

    let cancelled = self
      .store()
      .set_meeting_status(meeting_id, next)
      .await
      .map_err(Error::remote)?
      .ok_or_else(|| Error::not_found("meeting", meeting_id))?;
    tracing::info!(%meeting_id, from = meeting.status.as_str(), "meeting cancelled");

    self
      .notify_participants(&cancelled, NotificationKind::MeetingCancelled, "Meeting cancelled", "cancelled")
      .await;
    self.session.invalidate_after_write().await;
    Ok(cancelled)
  }

  /// Delete a meeting with its participants and notes.
  ///
  /// Children are detached first and the meeting row goes last, so a failure
  /// part-way leaves a meeting that can simply be deleted again.
  pub async fn delete(&self, meeting_id: Uuid) -> Result<()> {
    self.organized(meeting_id).await?;
    let mut done = Vec::new();

    let detached = self
      .store()
      .detach_children(meeting_id)
      .await
      .map_err(Error::remote)?;
    done.push(Step::ChildrenDetached);

    self
      .store()
      .delete_participants(meeting_id)
      .await
      .map_err(|e| Error::remote(e).after(&done))?;
    done.push(Step::ParticipantsDeleted);

    self
      .store()
      .delete_notes(meeting_id)
      .await
      .map_err(|e| Error::remote(e).after(&done))?;
    done.push(Step::NotesDeleted);

    let deleted = self
      .store()
      .delete_meeting(meeting_id)
      .await
      .map_err(|e| Error::remote(e).after(&done))?;
    if !deleted {
      return Err(Error::not_found("meeting", meeting_id).after(&done));
    }
    tracing::info!(%meeting_id, detached, "meeting deleted");

    self.session.invalidate_after_write().await;
    Ok(())
  }

  // ── Participant ───────────────────────────────────────────────────────────

  /// Answer an invitation as the signed-in participant.
  pub async fn respond(
    &self,
    meeting_id: Uuid,
    response: ParticipantResponse,
    suggested_time: Option<String>,
  ) -> Result<ResponseOutcome> {
    let me = self.me();
    let participant = self
      .participants(meeting_id)
      .await?
      .into_iter()
      .find(|p| p.user_id == Some(me))
      .ok_or_else(|| Error::Forbidden("not a participant of this meeting".into()))?;

    let outcome = apply_response(
      self.store(),
      meeting_id,
      participant.participant_id,
      response,
      suggested_time,
    )
    .await?;
    self.session.invalidate_after_write().await;
    Ok(outcome)
  }

  pub async fn participants(&self, meeting_id: Uuid) -> Result<Vec<Participant>> {
    self.store().list_participants(meeting_id).await.map_err(Error::remote)
  }

  // ── Notes ─────────────────────────────────────────────────────────────────

  pub async fn add_note(&self, meeting_id: Uuid, body: &str) -> Result<MeetingNote> {
    let body = body.trim();
    if body.is_empty() {
      return Err(Error::Invalid("note is empty".into()));
    }
    self.meeting(meeting_id).await?;
    self
      .store()
      .add_note(meeting_id, self.me(), body.to_owned())
      .await
      .map_err(Error::remote)
  }

  pub async fn notes(&self, meeting_id: Uuid) -> Result<Vec<MeetingNote>> {
    self.store().list_notes(meeting_id).await.map_err(Error::remote)
  }

  // ── Helpers ───────────────────────────────────────────────────────────────

  async fn meeting(&self, meeting_id: Uuid) -> Result<Meeting> {
    self
      .store()
      .get_meeting(meeting_id)
      .await
      .map_err(Error::remote)?
      .ok_or_else(|| Error::not_found("meeting", meeting_id))
  }

  /// Fetch a meeting the signed-in user organizes.
  async fn organized(&self, meeting_id: Uuid) -> Result<Meeting> {
    let meeting = self.meeting(meeting_id).await?;
    if meeting.organizer_id != self.me() {
      return Err(Error::Forbidden("only the organizer may change a meeting".into()));
    }
    Ok(meeting)
  }

  async fn own_contact(&self, contact_id: Uuid) -> Result<()> {
    let contact = self
      .store()
      .get_contact(contact_id)
      .await
      .map_err(Error::remote)?
      .ok_or_else(|| Error::not_found("contact", contact_id))?;
    if contact.owner_id != self.me() {
      return Err(Error::Forbidden("meetings may only reference your own contacts".into()));
    }
    Ok(())
  }

  /// Registered users among `participants`, other than the organizer.
  async fn add_and_invite(
    &self,
    meeting: &Meeting,
    participants: Vec<NewParticipant>,
  ) -> Result<Vec<Participant>> {
    let participants = self
      .store()
      .add_participants(meeting.meeting_id, participants)
      .await
      .map_err(Error::remote)?;

    let organizer = self.session.display_name();
    for participant in self.registered(&participants) {
      notify(self.store(), NewNotification {
        recipient_id: participant,
        kind:         NotificationKind::MeetingInvite,
        title:        "Meeting invitation".into(),
        message:      format!("{organizer} invited you to {}", meeting.title),
        payload:      json!({ "meeting_id": meeting.meeting_id }),
      })
      .await;
    }
    Ok(participants)
  }

  fn registered<'a>(&self, participants: &'a [Participant]) -> impl Iterator<Item = Uuid> + 'a {
    let me = self.me();
    participants
      .iter()
      .filter_map(|p| p.user_id)
      .filter(move |&id| id != me)
  }

  async fn notify_participants(
    &self,
    meeting: &Meeting,
    kind: NotificationKind,
    title: &str,
    verb: &str,
  ) {
    let participants = match self.participants(meeting.meeting_id).await {
      Ok(p) => p,
      Err(e) => {
        tracing::warn!(meeting_id = %meeting.meeting_id, error = %e, "could not load participants to notify");
        return;
      }
    };
    let organizer = self.session.display_name();
    for participant in self.registered(&participants) {
      notify(self.store(), NewNotification {
        recipient_id: participant,
        kind,
        title: title.to_owned(),
        message: format!("{organizer} {verb} {}", meeting.title),
        payload: json!({ "meeting_id": meeting.meeting_id, "status": meeting.status }),
      })
      .await;
    }
  }
}

/// Load a meeting and one of its participants for a response.
pub(crate) async fn response_target<S: MeetingStore>(
  store: &S,
  meeting_id: Uuid,
  participant_id: Uuid,
) -> Result<(Meeting, Participant)> {
  let meeting = store
    .get_meeting(meeting_id)
    .await
    .map_err(Error::remote)?
    .ok_or_else(|| Error::not_found("meeting", meeting_id))?;
  let participant = store
    .get_participant(participant_id)
    .await
    .map_err(Error::remote)?
    .ok_or_else(|| Error::not_found("participant", participant_id))?;
  if participant.meeting_id != meeting_id {
    return Err(Error::Forbidden("participant belongs to another meeting".into()));
  }
  Ok((meeting, participant))
}

/// Record one participant's answer and move the meeting's status to match.
///
/// The single response transition behind both the in-app and the signed
/// link path. The latest answer sets the meeting's status. A suggested time
/// is only kept with a `rescheduled` answer.
pub async fn apply_response<S>(
  store: &S,
  meeting_id: Uuid,
  participant_id: Uuid,
  response: ParticipantResponse,
  suggested_time: Option<String>,
) -> Result<ResponseOutcome>
where
  S: MeetingStore + NotificationStore,
{
  let (meeting, _) = response_target(store, meeting_id, participant_id).await?;
  let next = meeting.status.apply(MeetingTrigger::Respond(response))?;
  let suggested_time = match response {
    ParticipantResponse::Rescheduled => suggested_time
      .map(|t| t.trim().to_owned())
      .filter(|t| !t.is_empty()),
    _ => None,
  };

  let participant = store
    .record_response(participant_id, ResponseRecord {
      response,
      suggested_time,
      responded_at: Utc::now(),
    })
    .await
    .map_err(Error::remote)?
    .ok_or_else(|| Error::not_found("participant", participant_id))?;

  let meeting = store
    .set_meeting_status(meeting_id, next)
    .await
    .map_err(Error::remote)
    .and_then(|m| m.ok_or_else(|| Error::not_found("meeting", meeting_id)))
    .map_err(|e| e.after(&[Step::ResponseRecorded]))?;
  tracing::info!(
    %meeting_id,
    %participant_id,
    response = response.as_str(),
    status = next.as_str(),
    "meeting response recorded"
  );

  let who = participant
    .display_name
    .clone()
    .unwrap_or_else(|| participant.email.clone());
  notify(store, NewNotification {
    recipient_id: meeting.organizer_id,
    kind:         NotificationKind::MeetingResponse,
    title:        "Meeting response".into(),
    message:      format!("{who} {} {}", response.as_str(), meeting.title),
    payload:      json!({
      "meeting_id": meeting_id,
      "participant_id": participant_id,
      "response": response,
      "suggested_time": participant.suggested_time,
    }),
  })
  .await;

  Ok(ResponseOutcome { meeting, participant })
}
