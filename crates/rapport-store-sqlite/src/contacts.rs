//! [`ContactStore`] for [`SqliteStore`].

use rapport_core::{
  change::{ChangeKind, Table},
  contact::{Contact, ContactPatch, NewContact},
  store::ContactStore,
};
use uuid::Uuid;

use crate::{
  Result, SqliteStore,
  encode::{CONTACT_COLUMNS, RawContact, encode_dt, encode_uuid, now},
};

impl SqliteStore {
  /// Run a contact `SELECT` with positional parameters.
  async fn query_contacts(
    &self,
    where_clause: &'static str,
    params: Vec<String>,
  ) -> Result<Vec<Contact>> {
    let raws: Vec<RawContact> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CONTACT_COLUMNS} FROM contacts {where_clause}"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), RawContact::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawContact::into_contact).collect()
  }
}

impl ContactStore for SqliteStore {
  async fn list_contacts(&self, owner_id: Uuid) -> Result<Vec<Contact>> {
    self
      .query_contacts(
        "WHERE owner_id = ?1 ORDER BY created_at DESC, rowid DESC",
        vec![encode_uuid(owner_id)],
      )
      .await
  }

  async fn get_contact(&self, contact_id: Uuid) -> Result<Option<Contact>> {
    let mut found = self
      .query_contacts("WHERE contact_id = ?1", vec![encode_uuid(contact_id)])
      .await?;
    Ok(found.pop())
  }

  async fn find_linked_contact(
    &self,
    owner_id: Uuid,
    linked_user_id: Uuid,
  ) -> Result<Option<Contact>> {
    let mut found = self
      .query_contacts(
        "WHERE owner_id = ?1 AND linked_user_id = ?2
         ORDER BY created_at, rowid LIMIT 1",
        vec![encode_uuid(owner_id), encode_uuid(linked_user_id)],
      )
      .await?;
    Ok(found.pop())
  }

  async fn add_contact(&self, input: NewContact) -> Result<Contact> {
    let contact = Contact {
      contact_id:     Uuid::new_v4(),
      owner_id:       input.owner_id,
      linked_user_id: input.linked_user_id,
      full_name:      input.full_name,
      job_title:      input.job_title,
      company:        input.company,
      email:          input.email,
      phone:          input.phone,
      avatar_url:     input.avatar_url,
      notes:          input.notes,
      source:         input.source,
      created_at:     now(),
    };

    let id         = encode_uuid(contact.contact_id);
    let owner      = encode_uuid(contact.owner_id);
    let linked     = contact.linked_user_id.map(encode_uuid);
    let full_name  = contact.full_name.clone();
    let job_title  = contact.job_title.clone();
    let company    = contact.company.clone();
    let email      = contact.email.clone();
    let phone      = contact.phone.clone();
    let avatar_url = contact.avatar_url.clone();
    let notes      = contact.notes.clone();
    let source     = contact.source.as_str();
    let created_at = encode_dt(contact.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO contacts (
             contact_id, owner_id, linked_user_id, full_name, job_title,
             company, email, phone, avatar_url, notes, source, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
          rusqlite::params![
            id, owner, linked, full_name, job_title, company, email, phone,
            avatar_url, notes, source, created_at,
          ],
        )?;
        Ok(())
      })
      .await?;

    self.emit(Table::Contacts, ChangeKind::Insert, Some(contact.contact_id));
    Ok(contact)
  }

  async fn update_contact(
    &self,
    contact_id: Uuid,
    patch: ContactPatch,
  ) -> Result<Option<Contact>> {
    let Some(current) = self.get_contact(contact_id).await? else {
      return Ok(None);
    };
    let updated = patch.apply(current);

    let id        = encode_uuid(contact_id);
    let full_name = updated.full_name.clone();
    let job_title = updated.job_title.clone();
    let company   = updated.company.clone();
    let email     = updated.email.clone();
    let phone     = updated.phone.clone();
    let notes     = updated.notes.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE contacts
             SET full_name = ?2, job_title = ?3, company = ?4,
                 email = ?5, phone = ?6, notes = ?7
           WHERE contact_id = ?1",
          rusqlite::params![id, full_name, job_title, company, email, phone, notes],
        )?;
        Ok(())
      })
      .await?;

    self.emit(Table::Contacts, ChangeKind::Update, Some(contact_id));
    Ok(Some(updated))
  }

  async fn delete_contact(&self, contact_id: Uuid) -> Result<bool> {
    let id = encode_uuid(contact_id);

    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM contacts WHERE contact_id = ?1", rusqlite::params![id])?)
      })
      .await?;

    if deleted > 0 {
      self.emit(Table::Contacts, ChangeKind::Delete, Some(contact_id));
    }
    Ok(deleted > 0)
  }
}
