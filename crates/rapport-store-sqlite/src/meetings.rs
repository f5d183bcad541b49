//! [`MeetingStore`] for [`SqliteStore`]: meetings, participants and notes.

use rapport_core::{
  change::{ChangeKind, Table},
  meeting::{
    Meeting, MeetingNote, MeetingPatch, MeetingStatus, NewMeeting, NewParticipant,
    Participant, ResponseRecord,
  },
  store::MeetingStore,
};
use uuid::Uuid;

use crate::{
  Result, SqliteStore,
  encode::{
    MEETING_COLUMNS, PARTICIPANT_COLUMNS, RawMeeting, RawNote, RawParticipant,
    encode_date, encode_dt, encode_time, encode_uuid, now,
  },
};

impl SqliteStore {
  async fn query_meetings(
    &self,
    tail: &'static str,
    params: Vec<String>,
  ) -> Result<Vec<Meeting>> {
    let raws: Vec<RawMeeting> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!("SELECT {MEETING_COLUMNS} FROM meetings m {tail}"))?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), RawMeeting::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMeeting::into_meeting).collect()
  }

  async fn query_participants(
    &self,
    where_clause: &'static str,
    param: String,
  ) -> Result<Vec<Participant>> {
    let raws: Vec<RawParticipant> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {PARTICIPANT_COLUMNS} FROM meeting_participants {where_clause}"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![param], RawParticipant::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawParticipant::into_participant).collect()
  }

  /// Execute a single-parameter statement and return the affected row count.
  async fn execute_one(&self, sql: &'static str, param: String) -> Result<u64> {
    let n = self
      .conn
      .call(move |conn| Ok(conn.execute(sql, rusqlite::params![param])?))
      .await?;
    Ok(n as u64)
  }
}

impl MeetingStore for SqliteStore {
  async fn list_meetings(&self, user_id: Uuid) -> Result<Vec<Meeting>> {
    self
      .query_meetings(
        "WHERE m.organizer_id = ?1
            OR EXISTS (SELECT 1 FROM meeting_participants mp
                       WHERE mp.meeting_id = m.meeting_id AND mp.user_id = ?1)
         ORDER BY m.date, m.time, m.rowid",
        vec![encode_uuid(user_id)],
      )
      .await
  }

  async fn get_meeting(&self, meeting_id: Uuid) -> Result<Option<Meeting>> {
    let mut found = self
      .query_meetings("WHERE m.meeting_id = ?1", vec![encode_uuid(meeting_id)])
      .await?;
    Ok(found.pop())
  }

  async fn child_meetings(&self, parent_id: Uuid) -> Result<Vec<Meeting>> {
    self
      .query_meetings(
        "WHERE m.parent_meeting_id = ?1 ORDER BY m.date, m.time, m.rowid",
        vec![encode_uuid(parent_id)],
      )
      .await
  }

  async fn add_meeting(&self, input: NewMeeting) -> Result<Meeting> {
    let now = now();
    let meeting = Meeting {
      meeting_id:        Uuid::new_v4(),
      organizer_id:      input.organizer_id,
      connection_id:     input.connection_id,
      title:             input.title,
      description:       input.description,
      date:              input.date,
      time:              input.time,
      location:          input.location,
      status:            input.status,
      parent_meeting_id: input.parent_meeting_id,
      reminder_sent:     false,
      follow_up_sent:    false,
      created_at:        now,
      updated_at:        now,
    };

    let id          = encode_uuid(meeting.meeting_id);
    let organizer   = encode_uuid(meeting.organizer_id);
    let connection  = meeting.connection_id.map(encode_uuid);
    let title       = meeting.title.clone();
    let description = meeting.description.clone();
    let date        = encode_date(meeting.date);
    let time        = encode_time(meeting.time);
    let location    = meeting.location.clone();
    let status      = meeting.status.as_str();
    let parent      = meeting.parent_meeting_id.map(encode_uuid);
    let at          = encode_dt(now);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO meetings (
             meeting_id, organizer_id, connection_id, title, description,
             date, time, location, status, parent_meeting_id,
             created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
          rusqlite::params![
            id, organizer, connection, title, description, date, time, location,
            status, parent, at,
          ],
        )?;
        Ok(())
      })
      .await?;

    self.emit(Table::Meetings, ChangeKind::Insert, Some(meeting.meeting_id));
    Ok(meeting)
  }

  async fn update_meeting(
    &self,
    meeting_id: Uuid,
    patch: MeetingPatch,
  ) -> Result<Option<Meeting>> {
    let Some(current) = self.get_meeting(meeting_id).await? else {
      return Ok(None);
    };
    let mut updated = patch.apply(current);
    updated.updated_at = now();

    let id          = encode_uuid(meeting_id);
    let title       = updated.title.clone();
    let description = updated.description.clone();
    let date        = encode_date(updated.date);
    let time        = encode_time(updated.time);
    let location    = updated.location.clone();
    let connection  = updated.connection_id.map(encode_uuid);
    let at          = encode_dt(updated.updated_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE meetings
             SET title = ?2, description = ?3, date = ?4, time = ?5,
                 location = ?6, connection_id = ?7, updated_at = ?8
           WHERE meeting_id = ?1",
          rusqlite::params![id, title, description, date, time, location, connection, at],
        )?;
        Ok(())
      })
      .await?;

    self.emit(Table::Meetings, ChangeKind::Update, Some(meeting_id));
    Ok(Some(updated))
  }

  async fn set_meeting_status(
    &self,
    meeting_id: Uuid,
    status: MeetingStatus,
  ) -> Result<Option<Meeting>> {
    let id         = encode_uuid(meeting_id);
    let status_str = status.as_str();
    let at         = encode_dt(now());

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE meetings SET status = ?2, updated_at = ?3 WHERE meeting_id = ?1",
          rusqlite::params![id, status_str, at],
        )?)
      })
      .await?;

    if changed == 0 {
      return Ok(None);
    }
    self.emit(Table::Meetings, ChangeKind::Update, Some(meeting_id));
    self.get_meeting(meeting_id).await
  }

  async fn detach_children(&self, parent_id: Uuid) -> Result<u64> {
    let n = self
      .execute_one(
        "UPDATE meetings SET parent_meeting_id = NULL WHERE parent_meeting_id = ?1",
        encode_uuid(parent_id),
      )
      .await?;
    if n > 0 {
      self.emit(Table::Meetings, ChangeKind::Update, None);
    }
    Ok(n)
  }

  async fn clear_connection(&self, contact_id: Uuid) -> Result<u64> {
    let n = self
      .execute_one(
        "UPDATE meetings SET connection_id = NULL WHERE connection_id = ?1",
        encode_uuid(contact_id),
      )
      .await?;
    if n > 0 {
      self.emit(Table::Meetings, ChangeKind::Update, None);
    }
    Ok(n)
  }

  async fn delete_meeting(&self, meeting_id: Uuid) -> Result<bool> {
    let n = self
      .execute_one("DELETE FROM meetings WHERE meeting_id = ?1", encode_uuid(meeting_id))
      .await?;
    if n > 0 {
      self.emit(Table::Meetings, ChangeKind::Delete, Some(meeting_id));
    }
    Ok(n > 0)
  }

  // ── Participants ──────────────────────────────────────────────────────────

  async fn list_participants(&self, meeting_id: Uuid) -> Result<Vec<Participant>> {
    self
      .query_participants("WHERE meeting_id = ?1 ORDER BY rowid", encode_uuid(meeting_id))
      .await
  }

  async fn get_participant(&self, participant_id: Uuid) -> Result<Option<Participant>> {
    let mut found = self
      .query_participants("WHERE participant_id = ?1", encode_uuid(participant_id))
      .await?;
    Ok(found.pop())
  }

  async fn add_participants(
    &self,
    meeting_id: Uuid,
    input: Vec<NewParticipant>,
  ) -> Result<Vec<Participant>> {
    let participants: Vec<Participant> = input
      .into_iter()
      .map(|p| Participant {
        participant_id: Uuid::new_v4(),
        meeting_id,
        email: p.email,
        display_name: p.display_name,
        user_id: p.user_id,
        response: None,
        suggested_time: None,
        responded_at: None,
      })
      .collect();

    let rows: Vec<(String, String, String, Option<String>, Option<String>)> = participants
      .iter()
      .map(|p| {
        (
          encode_uuid(p.participant_id),
          encode_uuid(p.meeting_id),
          p.email.clone(),
          p.display_name.clone(),
          p.user_id.map(encode_uuid),
        )
      })
      .collect();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO meeting_participants (
               participant_id, meeting_id, email, display_name, user_id
             ) VALUES (?1, ?2, ?3, ?4, ?5)",
          )?;
          for (id, meeting, email, name, user) in &rows {
            stmt.execute(rusqlite::params![id, meeting, email, name, user])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    for p in &participants {
      self.emit(Table::MeetingParticipants, ChangeKind::Insert, Some(p.participant_id));
    }
    Ok(participants)
  }

  async fn record_response(
    &self,
    participant_id: Uuid,
    record: ResponseRecord,
  ) -> Result<Option<Participant>> {
    let id        = encode_uuid(participant_id);
    let response  = record.response.as_str();
    let suggested = record.suggested_time;
    let at        = encode_dt(record.responded_at);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE meeting_participants
             SET response = ?2, suggested_time = ?3, responded_at = ?4
           WHERE participant_id = ?1",
          rusqlite::params![id, response, suggested, at],
        )?)
      })
      .await?;

    if changed == 0 {
      return Ok(None);
    }
    self.emit(Table::MeetingParticipants, ChangeKind::Update, Some(participant_id));
    self.get_participant(participant_id).await
  }

  async fn delete_participants(&self, meeting_id: Uuid) -> Result<u64> {
    let n = self
      .execute_one(
        "DELETE FROM meeting_participants WHERE meeting_id = ?1",
        encode_uuid(meeting_id),
      )
      .await?;
    if n > 0 {
      self.emit(Table::MeetingParticipants, ChangeKind::Delete, None);
    }
    Ok(n)
  }

  // ── Notes ─────────────────────────────────────────────────────────────────

  async fn list_notes(&self, meeting_id: Uuid) -> Result<Vec<MeetingNote>> {
    let id = encode_uuid(meeting_id);

    let raws: Vec<RawNote> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT note_id, meeting_id, author_id, body, created_at
           FROM meeting_notes WHERE meeting_id = ?1
           ORDER BY created_at, rowid",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id], |row| {
            Ok(RawNote {
              note_id:    row.get(0)?,
              meeting_id: row.get(1)?,
              author_id:  row.get(2)?,
              body:       row.get(3)?,
              created_at: row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawNote::into_note).collect()
  }

  async fn add_note(
    &self,
    meeting_id: Uuid,
    author_id: Uuid,
    body: String,
  ) -> Result<MeetingNote> {
    let note = MeetingNote {
      note_id: Uuid::new_v4(),
      meeting_id,
      author_id,
      body,
      created_at: now(),
    };

    let id      = encode_uuid(note.note_id);
    let meeting = encode_uuid(meeting_id);
    let author  = encode_uuid(author_id);
    let body    = note.body.clone();
    let at      = encode_dt(note.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO meeting_notes (note_id, meeting_id, author_id, body, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id, meeting, author, body, at],
        )?;
        Ok(())
      })
      .await?;

    self.emit(Table::MeetingNotes, ChangeKind::Insert, Some(note.note_id));
    Ok(note)
  }

  async fn delete_notes(&self, meeting_id: Uuid) -> Result<u64> {
    let n = self
      .execute_one("DELETE FROM meeting_notes WHERE meeting_id = ?1", encode_uuid(meeting_id))
      .await?;
    if n > 0 {
      self.emit(Table::MeetingNotes, ChangeKind::Delete, None);
    }
    Ok(n)
  }
}
