//! [`IntroductionStore`] for [`SqliteStore`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rapport_core::{
  change::{ChangeKind, Table},
  introduction::{IntroParticipant, IntroResponse, Introduction, NewIntroduction},
  store::IntroductionStore,
};
use uuid::Uuid;

use crate::{
  Result, SqliteStore,
  encode::{
    RawIntroParticipant, RawIntroduction, decode_dt, decode_uuid, encode_dt, encode_uuid, now,
  },
};

impl SqliteStore {
  /// Load introductions matching `where_clause` along with every participant
  /// row, grouped under their parent.
  async fn query_introductions(
    &self,
    where_clause: &'static str,
    param: String,
  ) -> Result<Vec<Introduction>> {
    let (intros, parts): (Vec<RawIntroduction>, Vec<RawIntroParticipant>) = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT i.introduction_id, i.sender_id, i.message, i.created_at
           FROM introductions i {where_clause}
           ORDER BY i.created_at DESC, i.rowid DESC"
        ))?;
        let intros = stmt
          .query_map(rusqlite::params![param], |row| {
            Ok(RawIntroduction {
              introduction_id: row.get(0)?,
              sender_id:       row.get(1)?,
              message:         row.get(2)?,
              created_at:      row.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(&format!(
          "SELECT ip.introduction_id, ip.user_id, ip.response, ip.responded_at
           FROM introduction_participants ip
           WHERE ip.introduction_id IN (
             SELECT i.introduction_id FROM introductions i {where_clause}
           )
           ORDER BY ip.rowid"
        ))?;
        let parts = stmt
          .query_map(rusqlite::params![param], |row| {
            Ok(RawIntroParticipant {
              introduction_id: row.get(0)?,
              user_id:         row.get(1)?,
              response:        row.get(2)?,
              responded_at:    row.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((intros, parts))
      })
      .await?;

    let mut grouped: HashMap<Uuid, Vec<IntroParticipant>> = HashMap::new();
    for raw in parts {
      let p = raw.into_participant()?;
      grouped.entry(p.introduction_id).or_default().push(p);
    }

    intros
      .into_iter()
      .map(|raw| {
        let introduction_id = decode_uuid(&raw.introduction_id)?;
        Ok(Introduction {
          introduction_id,
          sender_id: decode_uuid(&raw.sender_id)?,
          message: raw.message,
          created_at: decode_dt(&raw.created_at)?,
          participants: grouped.remove(&introduction_id).unwrap_or_default(),
        })
      })
      .collect()
  }
}

impl IntroductionStore for SqliteStore {
  async fn add_introduction(&self, input: NewIntroduction) -> Result<Introduction> {
    let introduction_id = Uuid::new_v4();
    let intro = Introduction {
      introduction_id,
      sender_id: input.sender_id,
      message: input.message,
      created_at: now(),
      participants: input
        .participant_ids
        .iter()
        .map(|&user_id| IntroParticipant {
          introduction_id,
          user_id,
          response: IntroResponse::Pending,
          responded_at: None,
        })
        .collect(),
    };

    let id      = encode_uuid(introduction_id);
    let sender  = encode_uuid(intro.sender_id);
    let message = intro.message.clone();
    let at      = encode_dt(intro.created_at);
    let users: Vec<String> = input.participant_ids.into_iter().map(encode_uuid).collect();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO introductions (introduction_id, sender_id, message, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id, sender, message, at],
        )?;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO introduction_participants (introduction_id, user_id, response)
             VALUES (?1, ?2, 'pending')",
          )?;
          for user in &users {
            stmt.execute(rusqlite::params![id, user])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    self.emit(Table::Introductions, ChangeKind::Insert, Some(introduction_id));
    self.emit(Table::IntroductionParticipants, ChangeKind::Insert, None);
    Ok(intro)
  }

  async fn get_introduction(&self, introduction_id: Uuid) -> Result<Option<Introduction>> {
    let mut found = self
      .query_introductions("WHERE i.introduction_id = ?1", encode_uuid(introduction_id))
      .await?;
    Ok(found.pop())
  }

  async fn list_introductions(&self, user_id: Uuid) -> Result<Vec<Introduction>> {
    self
      .query_introductions(
        "WHERE i.sender_id = ?1
            OR EXISTS (SELECT 1 FROM introduction_participants x
                       WHERE x.introduction_id = i.introduction_id AND x.user_id = ?1)",
        encode_uuid(user_id),
      )
      .await
  }

  async fn count_introductions_since(
    &self,
    sender_id: Uuid,
    since: DateTime<Utc>,
  ) -> Result<usize> {
    let sender = encode_uuid(sender_id);
    let since  = encode_dt(since);

    let n: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM introductions WHERE sender_id = ?1 AND created_at >= ?2",
          rusqlite::params![sender, since],
          |row| row.get(0),
        )?)
      })
      .await?;

    Ok(n as usize)
  }

  async fn set_intro_response(
    &self,
    introduction_id: Uuid,
    user_id: Uuid,
    response: IntroResponse,
  ) -> Result<Option<IntroParticipant>> {
    let responded_at = now();
    let intro        = encode_uuid(introduction_id);
    let user         = encode_uuid(user_id);
    let response_str = response.as_str();
    let at           = encode_dt(responded_at);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE introduction_participants SET response = ?3, responded_at = ?4
           WHERE introduction_id = ?1 AND user_id = ?2",
          rusqlite::params![intro, user, response_str, at],
        )?)
      })
      .await?;

    if changed == 0 {
      return Ok(None);
    }
    self.emit(Table::IntroductionParticipants, ChangeKind::Update, Some(introduction_id));
    Ok(Some(IntroParticipant {
      introduction_id,
      user_id,
      response,
      responded_at: Some(responded_at),
    }))
  }
}
