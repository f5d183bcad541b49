//! [`ProfileStore`] for [`SqliteStore`].

use std::collections::HashSet;

use rapport_core::{
  change::{ChangeKind, Table},
  profile::{NewProfile, Profile, ProfilePatch, ProfileQuery, UserSettings},
  store::ProfileStore,
};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use crate::{
  Result, SqliteStore,
  encode::{
    PROFILE_COLUMNS, RawProfile, RawSettings, decode_uuid, encode_dt, encode_uuid, now,
  },
};

impl SqliteStore {
  /// Insert a new profile row, or overwrite the mutable columns of an
  /// existing one.
  async fn write_profile(&self, p: &Profile) -> Result<()> {
    let id         = encode_uuid(p.user_id);
    let full_name  = p.full_name.clone();
    let email      = p.email.clone();
    let phone      = p.phone.clone();
    let job_title  = p.job_title.clone();
    let company    = p.company.clone();
    let bio        = p.bio.clone();
    let avatar_url = p.avatar_url.clone();
    let created_at = encode_dt(p.created_at);
    let updated_at = encode_dt(p.updated_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO profiles (
             user_id, full_name, email, phone, job_title, company, bio,
             avatar_url, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
           ON CONFLICT (user_id) DO UPDATE
             SET full_name  = excluded.full_name,
                 email      = excluded.email,
                 phone      = excluded.phone,
                 job_title  = excluded.job_title,
                 company    = excluded.company,
                 bio        = excluded.bio,
                 avatar_url = excluded.avatar_url,
                 updated_at = excluded.updated_at",
          rusqlite::params![
            id, full_name, email, phone, job_title, company, bio, avatar_url,
            created_at, updated_at,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

impl ProfileStore for SqliteStore {
  async fn add_profile(&self, input: NewProfile) -> Result<Profile> {
    let now = now();
    let profile = Profile {
      user_id:    input.user_id,
      full_name:  input.full_name,
      email:      input.email,
      phone:      input.phone,
      job_title:  input.job_title,
      company:    input.company,
      bio:        input.bio,
      avatar_url: input.avatar_url,
      created_at: now,
      updated_at: now,
    };
    self.write_profile(&profile).await?;
    self.emit(Table::Profiles, ChangeKind::Insert, Some(profile.user_id));
    Ok(profile)
  }

  async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>> {
    let id = encode_uuid(user_id);

    let raw: Option<RawProfile> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_id = ?1"),
              rusqlite::params![id],
              |row| RawProfile::from_row(row, 0),
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawProfile::into_profile).transpose()
  }

  async fn update_profile(
    &self,
    user_id: Uuid,
    patch: ProfilePatch,
  ) -> Result<Option<Profile>> {
    let Some(current) = self.get_profile(user_id).await? else {
      return Ok(None);
    };
    let mut updated = patch.apply(current);
    updated.updated_at = now();
    self.write_profile(&updated).await?;
    self.emit(Table::Profiles, ChangeKind::Update, Some(user_id));
    Ok(Some(updated))
  }

  async fn search_profiles(&self, query: &ProfileQuery) -> Result<Vec<Profile>> {
    let pattern = format!("%{}%", query.text.to_lowercase());
    let exclude = query.exclude.map(encode_uuid);
    let limit   = query.limit.unwrap_or(20) as i64;

    let raws: Vec<RawProfile> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {PROFILE_COLUMNS} FROM profiles
           WHERE (?1 IS NULL OR user_id != ?1)
             AND (lower(full_name) LIKE ?2
               OR (user_id NOT IN (SELECT user_id FROM user_settings WHERE is_private = 1)
                 AND (lower(coalesce(email, ''))     LIKE ?2
                   OR lower(coalesce(job_title, '')) LIKE ?2
                   OR lower(coalesce(company, ''))   LIKE ?2)))
           ORDER BY full_name
           LIMIT ?3"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![exclude, pattern, limit], |row| {
            RawProfile::from_row(row, 0)
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawProfile::into_profile).collect()
  }

  async fn private_profiles(&self, user_ids: &[Uuid]) -> Result<HashSet<Uuid>> {
    if user_ids.is_empty() {
      return Ok(HashSet::new());
    }
    let ids: Vec<String> = user_ids.iter().copied().map(encode_uuid).collect();

    let rows: Vec<String> = self
      .conn
      .call(move |conn| {
        let placeholders = vec!["?"; ids.len()].join(", ");
        let mut stmt = conn.prepare(&format!(
          "SELECT user_id FROM user_settings
           WHERE is_private = 1 AND user_id IN ({placeholders})"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(ids.iter()), |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;

    rows.iter().map(|s| decode_uuid(s)).collect()
  }

  async fn can_view_profile(&self, viewer: Uuid, target: Uuid) -> Result<bool> {
    if viewer == target {
      return Ok(true);
    }
    let viewer = encode_uuid(viewer);
    let target = encode_uuid(target);

    let visible: bool = self
      .conn
      .call(move |conn| {
        let private: bool = conn
          .query_row(
            "SELECT is_private FROM user_settings WHERE user_id = ?1",
            rusqlite::params![target],
            |r| r.get(0),
          )
          .optional()?
          .unwrap_or(false);
        if !private {
          return Ok(true);
        }
        let connected = conn
          .query_row(
            "SELECT 1 FROM relationship_requests
             WHERE status = 'accepted'
               AND ((requester_id = ?1 AND target_id = ?2)
                 OR (requester_id = ?2 AND target_id = ?1))
             LIMIT 1",
            rusqlite::params![viewer, target],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        Ok(connected)
      })
      .await?;

    Ok(visible)
  }

  async fn get_settings(&self, user_id: Uuid) -> Result<Option<UserSettings>> {
    let id = encode_uuid(user_id);

    let raw: Option<RawSettings> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT user_id, is_private, email_notifications, updated_at
               FROM user_settings WHERE user_id = ?1",
              rusqlite::params![id],
              |row| {
                Ok(RawSettings {
                  user_id:             row.get(0)?,
                  is_private:          row.get(1)?,
                  email_notifications: row.get(2)?,
                  updated_at:          row.get(3)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSettings::into_settings).transpose()
  }

  async fn upsert_settings(&self, settings: UserSettings) -> Result<UserSettings> {
    let id         = encode_uuid(settings.user_id);
    let is_private = settings.is_private;
    let email      = settings.email_notifications;
    let at         = encode_dt(now());

    let (raw, existed): (RawSettings, bool) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let existed = tx
          .query_row(
            "SELECT 1 FROM user_settings WHERE user_id = ?1",
            rusqlite::params![id],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        let raw = tx.query_row(
          "INSERT INTO user_settings (user_id, is_private, email_notifications, updated_at)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT (user_id) DO UPDATE
             SET is_private          = excluded.is_private,
                 email_notifications = excluded.email_notifications,
                 updated_at          = excluded.updated_at
           RETURNING user_id, is_private, email_notifications, updated_at",
          rusqlite::params![id, is_private, email, at],
          |row| {
            Ok(RawSettings {
              user_id:             row.get(0)?,
              is_private:          row.get(1)?,
              email_notifications: row.get(2)?,
              updated_at:          row.get(3)?,
            })
          },
        )?;
        tx.commit()?;
        Ok((raw, existed))
      })
      .await?;

    let stored = raw.into_settings()?;
    let kind = if existed { ChangeKind::Update } else { ChangeKind::Insert };
    self.emit(Table::UserSettings, kind, Some(stored.user_id));
    Ok(stored)
  }
}
