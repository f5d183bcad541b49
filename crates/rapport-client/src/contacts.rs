//! The signed-in user's address book.

use std::sync::Arc;

use rapport_core::{
  contact::{Contact, ContactPatch, ContactSource, NewContact},
  store::RemoteStore,
};
use uuid::Uuid;

use crate::{Error, Result, Session, Step};

pub struct ContactBook<S> {
  session: Arc<Session<S>>,
}

impl<S: RemoteStore + 'static> ContactBook<S> {
  pub fn new(session: Arc<Session<S>>) -> Self { Self { session } }

  fn me(&self) -> Uuid { self.session.user_id() }

  fn store(&self) -> &S { self.session.store() }

  /// Contacts from the session's cache.
  pub fn contacts(&self) -> Vec<Contact> { self.session.cache().get().contacts.clone() }

  pub async fn add(&self, mut input: NewContact) -> Result<Contact> {
    input.owner_id = self.me();
    if input.full_name.trim().is_empty() {
      return Err(Error::Invalid("contact name is empty".into()));
    }
    let contact = self.store().add_contact(input).await.map_err(Error::remote)?;
    tracing::info!(contact_id = %contact.contact_id, source = contact.source.as_str(), "contact added");
    self.session.invalidate_after_write().await;
    Ok(contact)
  }

  /// Save another user's public card.
  ///
  /// Returns the existing entry if one was already copied from that user.
  pub async fn add_from_card(&self, user_id: Uuid) -> Result<Contact> {
    let me = self.me();
    if user_id == me {
      return Err(Error::Invalid("cannot add your own card".into()));
    }
    if !self
      .store()
      .can_view_profile(me, user_id)
      .await
      .map_err(Error::remote)?
    {
      return Err(Error::Forbidden("this profile is private".into()));
    }
    if let Some(existing) = self
      .store()
      .find_linked_contact(me, user_id)
      .await
      .map_err(Error::remote)?
    {
      return Ok(existing);
    }

    let profile = self
      .store()
      .get_profile(user_id)
      .await
      .map_err(Error::remote)?
      .ok_or_else(|| Error::not_found("profile", user_id))?;
    self
      .add(NewContact::from_profile(me, &profile, ContactSource::Card))
      .await
  }

  pub async fn update(&self, contact_id: Uuid, patch: ContactPatch) -> Result<Contact> {
    self.owned(contact_id).await?;
    let contact = self
      .store()
      .update_contact(contact_id, patch)
      .await
      .map_err(Error::remote)?
      .ok_or_else(|| Error::not_found("contact", contact_id))?;
    self.session.invalidate_after_write().await;
    Ok(contact)
  }

  /// Delete a contact. Meetings that referenced it keep existing with the
  /// reference cleared.
  pub async fn delete(&self, contact_id: Uuid) -> Result<()> {
    self.owned(contact_id).await?;

    let cleared = self
      .store()
      .clear_connection(contact_id)
      .await
      .map_err(Error::remote)?;
    let deleted = self
      .store()
      .delete_contact(contact_id)
      .await
      .map_err(|e| Error::remote(e).after(&[Step::ConnectionCleared]))?;
    if !deleted {
      return Err(Error::not_found("contact", contact_id).after(&[Step::ConnectionCleared]));
    }
    tracing::info!(%contact_id, meetings = cleared, "contact deleted");

    self.session.invalidate_after_write().await;
    Ok(())
  }

  async fn owned(&self, contact_id: Uuid) -> Result<Contact> {
    let contact = self
      .store()
      .get_contact(contact_id)
      .await
      .map_err(Error::remote)?
      .ok_or_else(|| Error::not_found("contact", contact_id))?;
    if contact.owner_id != self.me() {
      return Err(Error::Forbidden("not your contact".into()));
    }
    Ok(contact)
  }
}

#[cfg(test)]
mod tests {
  use chrono::{NaiveDate, NaiveTime};
  use rapport_core::store::MeetingStore;

  use super::*;
  use crate::{
    MeetingDraft, Relationships, Scheduler,
    testing::{make_private, probe, seed_user, signed_in},
  };

  fn manual(name: &str) -> NewContact {
    NewContact { full_name: name.into(), ..Default::default() }
  }

  #[tokio::test]
  async fn add_is_owned_by_session_user() {
    let store = probe().await;
    let alice = seed_user(&store, "Alice").await;
    let book = ContactBook::new(signed_in(&store, alice).await);

    let mut input = manual("Dana");
    input.owner_id = Uuid::new_v4();
    let contact = book.add(input).await.unwrap();
    assert_eq!(contact.owner_id, alice);
    assert_eq!(contact.source, ContactSource::Manual);
    assert_eq!(book.contacts(), vec![contact]);

    let err = book.add(manual(" ")).await.unwrap_err();
    assert!(matches!(err, Error::Invalid(_)));
  }

  #[tokio::test]
  async fn card_copy_respects_privacy_and_deduplicates() {
    let store = probe().await;
    let alice = seed_user(&store, "Alice").await;
    let bob = seed_user(&store, "Bob").await;
    let carol = seed_user(&store, "Carol").await;
    make_private(&store, carol).await;
    let book = ContactBook::new(signed_in(&store, alice).await);

    let first = book.add_from_card(bob).await.unwrap();
    assert_eq!(first.source, ContactSource::Card);
    assert_eq!(first.linked_user_id, Some(bob));
    assert_eq!(first.job_title.as_deref(), Some("Bob's title"));
    let again = book.add_from_card(bob).await.unwrap();
    assert_eq!(again.contact_id, first.contact_id);
    assert_eq!(book.contacts().len(), 1);

    let err = book.add_from_card(carol).await.unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));
    let err = book.add_from_card(alice).await.unwrap_err();
    assert!(matches!(err, Error::Invalid(_)));
  }

  #[tokio::test]
  async fn private_card_visible_once_connected() {
    let store = probe().await;
    let alice = seed_user(&store, "Alice").await;
    let carol = seed_user(&store, "Carol").await;
    make_private(&store, carol).await;

    let a = Relationships::new(signed_in(&store, alice).await);
    let c = Relationships::new(signed_in(&store, carol).await);
    let req = a.send_request(carol).await.unwrap();
    c.accept(req.request_id).await.unwrap();

    // Accepting already materialized the contact; the card returns it.
    let book = ContactBook::new(signed_in(&store, alice).await);
    let contact = book.add_from_card(carol).await.unwrap();
    assert_eq!(contact.source, ContactSource::Connection);
  }

  #[tokio::test]
  async fn only_owner_edits() {
    let store = probe().await;
    let alice = seed_user(&store, "Alice").await;
    let bob = seed_user(&store, "Bob").await;
    let a = ContactBook::new(signed_in(&store, alice).await);
    let b = ContactBook::new(signed_in(&store, bob).await);

    let contact = a.add(manual("Dana")).await.unwrap();
    let patch = ContactPatch { notes: Some(Some("met at the fair".into())), ..Default::default() };
    let err = b.update(contact.contact_id, patch.clone()).await.unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));
    let err = b.delete(contact.contact_id).await.unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));

    let updated = a.update(contact.contact_id, patch).await.unwrap();
    assert_eq!(updated.notes.as_deref(), Some("met at the fair"));
    assert_eq!(a.contacts()[0].notes.as_deref(), Some("met at the fair"));
  }

  #[tokio::test]
  async fn deleting_contact_clears_meeting_reference() {
    let store = probe().await;
    let alice = seed_user(&store, "Alice").await;
    let session = signed_in(&store, alice).await;
    let book = ContactBook::new(session.clone());
    let scheduler = Scheduler::new(session);

    let contact = book.add(manual("Dana")).await.unwrap();
    let meeting = scheduler
      .create(MeetingDraft {
        connection_id:     Some(contact.contact_id),
        title:             "Catch up".into(),
        description:       None,
        date:              NaiveDate::from_ymd_opt(2026, 12, 1).unwrap(),
        time:              NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
        location:          None,
        participants:      vec![],
        parent_meeting_id: None,
      })
      .await
      .unwrap();

    book.delete(contact.contact_id).await.unwrap();

    let meeting = store.get_meeting(meeting.meeting_id).await.unwrap().unwrap();
    assert_eq!(meeting.connection_id, None);
    assert!(book.contacts().is_empty());

    let err = book.delete(contact.contact_id).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
  }
}
