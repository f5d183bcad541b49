//! [`RequestStore`] for [`SqliteStore`].

use rapport_core::{
  change::{ChangeKind, Table},
  relationship::{
    Direction, NewRequest, RelationshipRequest, RequestStatus, RequestWithProfile,
  },
  store::RequestStore,
};
use uuid::Uuid;

use crate::{
  Result, SqliteStore,
  encode::{
    PROFILE_COLUMNS, REQUEST_COLUMNS, RawProfile, RawRequest, encode_dt, encode_uuid, now,
  },
};

impl SqliteStore {
  async fn query_requests(
    &self,
    where_clause: &'static str,
    params: Vec<String>,
  ) -> Result<Vec<RelationshipRequest>> {
    let raws: Vec<RawRequest> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {REQUEST_COLUMNS} FROM relationship_requests {where_clause}"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), RawRequest::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRequest::into_request).collect()
  }
}

impl RequestStore for SqliteStore {
  async fn requests_between(&self, a: Uuid, b: Uuid) -> Result<Vec<RelationshipRequest>> {
    self
      .query_requests(
        "WHERE (requester_id = ?1 AND target_id = ?2)
            OR (requester_id = ?2 AND target_id = ?1)
         ORDER BY created_at DESC, rowid DESC",
        vec![encode_uuid(a), encode_uuid(b)],
      )
      .await
  }

  async fn get_request(&self, request_id: Uuid) -> Result<Option<RelationshipRequest>> {
    let mut found = self
      .query_requests("WHERE request_id = ?1", vec![encode_uuid(request_id)])
      .await?;
    Ok(found.pop())
  }

  async fn add_request(&self, input: NewRequest) -> Result<RelationshipRequest> {
    let now = now();
    let request = RelationshipRequest {
      request_id:   Uuid::new_v4(),
      requester_id: input.requester_id,
      target_id:    input.target_id,
      status:       RequestStatus::Pending,
      created_at:   now,
      updated_at:   now,
    };

    let id        = encode_uuid(request.request_id);
    let requester = encode_uuid(request.requester_id);
    let target    = encode_uuid(request.target_id);
    let status    = request.status.as_str();
    let at        = encode_dt(now);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO relationship_requests (
             request_id, requester_id, target_id, status, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
          rusqlite::params![id, requester, target, status, at],
        )?;
        Ok(())
      })
      .await?;

    self.emit(Table::RelationshipRequests, ChangeKind::Insert, Some(request.request_id));
    Ok(request)
  }

  async fn set_request_status(
    &self,
    request_id: Uuid,
    status: RequestStatus,
  ) -> Result<Option<RelationshipRequest>> {
    let id         = encode_uuid(request_id);
    let status_str = status.as_str();
    let at         = encode_dt(now());

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE relationship_requests SET status = ?2, updated_at = ?3
           WHERE request_id = ?1",
          rusqlite::params![id, status_str, at],
        )?)
      })
      .await?;

    if changed == 0 {
      return Ok(None);
    }
    self.emit(Table::RelationshipRequests, ChangeKind::Update, Some(request_id));
    self.get_request(request_id).await
  }

  async fn list_requests(
    &self,
    user_id: Uuid,
    direction: Direction,
  ) -> Result<Vec<RequestWithProfile>> {
    let id = encode_uuid(user_id);
    // The viewer's column, and the column naming the other party.
    let (mine, theirs) = match direction {
      Direction::Incoming => ("target_id", "requester_id"),
      Direction::Outgoing => ("requester_id", "target_id"),
    };

    let raws: Vec<(RawRequest, Option<RawProfile>)> = self
      .conn
      .call(move |conn| {
        let profile_cols = PROFILE_COLUMNS
          .split(", ")
          .map(|c| format!("p.{c}"))
          .collect::<Vec<_>>()
          .join(", ");
        let mut stmt = conn.prepare(&format!(
          "SELECT r.request_id, r.requester_id, r.target_id, r.status,
                  r.created_at, r.updated_at, {profile_cols}
           FROM relationship_requests r
           LEFT JOIN profiles p ON p.user_id = r.{theirs}
           WHERE r.{mine} = ?1
           ORDER BY r.created_at DESC, r.rowid DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id], |row| {
            let request = RawRequest::from_row(row)?;
            let counterpart = match row.get::<_, Option<String>>(6)? {
              Some(_) => Some(RawProfile::from_row(row, 6)?),
              None => None,
            };
            Ok((request, counterpart))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|(r, p)| {
        Ok(RequestWithProfile {
          request:     r.into_request()?,
          counterpart: p.map(RawProfile::into_profile).transpose()?,
        })
      })
      .collect()
  }
}
