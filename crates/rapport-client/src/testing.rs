//! Test harness: the SQLite store wrapped with call counters, injected
//! failures and gates that hold a call open until released.

use std::{
  collections::{HashMap, HashSet},
  sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
  },
};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rapport_core::{
  change::{ChangeStream, EventMask, Table},
  contact::{Contact, ContactPatch, NewContact},
  introduction::{IntroParticipant, IntroResponse, Introduction, NewIntroduction},
  meeting::{
    Meeting, MeetingNote, MeetingPatch, MeetingStatus, NewMeeting, NewParticipant,
    Participant, ResponseRecord,
  },
  notification::{NewNotification, Notification},
  profile::{NewProfile, Profile, ProfilePatch, ProfileQuery, UserSettings},
  relationship::{
    Direction, NewRequest, RelationshipRequest, RequestStatus, RequestWithProfile,
  },
  store::{
    Backend, ChangeFeed, ContactStore, IntroductionStore, MeetingStore, NotificationStore,
    ProfileStore, RequestStore,
  },
};
use rapport_store_sqlite::SqliteStore;
use thiserror::Error;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::{ClientConfig, Session};

#[derive(Debug, Error)]
pub enum ProbeError {
  #[error(transparent)]
  Store(#[from] rapport_store_sqlite::Error),
  #[error("injected failure: {0}")]
  Injected(&'static str),
}

type Result<T> = std::result::Result<T, ProbeError>;

#[derive(Default)]
struct Gates {
  contacts: Option<Arc<Semaphore>>,
  search:   HashMap<String, Arc<Semaphore>>,
}

pub struct ProbeStore {
  inner:               SqliteStore,
  profile_fetches:     AtomicUsize,
  contact_fetches:     AtomicUsize,
  meeting_fetches:     AtomicUsize,
  fail_contacts:       AtomicBool,
  fail_notifications:  AtomicBool,
  fail_meeting_delete: AtomicBool,
  fail_status_writes:  AtomicBool,
  fail_participants:   AtomicBool,
  fail_search:         AtomicBool,
  fail_contact_owner:  Mutex<Option<Uuid>>,
  gates:               Mutex<Gates>,
}

pub async fn probe() -> Arc<ProbeStore> {
  let inner = SqliteStore::open_in_memory()
    .await
    .expect("in-memory store");
  Arc::new(ProbeStore {
    inner,
    profile_fetches: AtomicUsize::new(0),
    contact_fetches: AtomicUsize::new(0),
    meeting_fetches: AtomicUsize::new(0),
    fail_contacts: AtomicBool::new(false),
    fail_notifications: AtomicBool::new(false),
    fail_meeting_delete: AtomicBool::new(false),
    fail_status_writes: AtomicBool::new(false),
    fail_participants: AtomicBool::new(false),
    fail_search: AtomicBool::new(false),
    fail_contact_owner: Mutex::new(None),
    gates: Mutex::new(Gates::default()),
  })
}

pub async fn seed_user(store: &ProbeStore, name: &str) -> Uuid {
  store
    .inner
    .add_profile(NewProfile {
      user_id: Uuid::new_v4(),
      full_name: name.into(),
      email: Some(format!("{}@example.com", name.to_lowercase())),
      job_title: Some(format!("{name}'s title")),
      company: Some("Acme".into()),
      ..Default::default()
    })
    .await
    .expect("seed profile")
    .user_id
}

pub async fn make_private(store: &ProbeStore, user_id: Uuid) {
  let mut settings = UserSettings::defaults_for(user_id);
  settings.is_private = true;
  store.inner.upsert_settings(settings).await.expect("settings");
}

pub async fn signed_in(store: &Arc<ProbeStore>, user_id: Uuid) -> Arc<Session<ProbeStore>> {
  Session::sign_in(store.clone(), user_id, ClientConfig::default())
    .await
    .expect("sign in")
}

async fn pass(gate: Option<Arc<Semaphore>>) {
  if let Some(gate) = gate {
    // A closed gate lets everyone through.
    let _ = gate.acquire().await;
  }
}

impl ProbeStore {
  pub fn sqlite(&self) -> &SqliteStore { &self.inner }

  pub fn profile_fetches(&self) -> usize { self.profile_fetches.load(Ordering::SeqCst) }

  pub fn contact_fetches(&self) -> usize { self.contact_fetches.load(Ordering::SeqCst) }

  pub fn meeting_fetches(&self) -> usize { self.meeting_fetches.load(Ordering::SeqCst) }

  pub fn fail_contact_fetches(&self, on: bool) { self.fail_contacts.store(on, Ordering::SeqCst) }

  pub fn fail_notifications(&self, on: bool) {
    self.fail_notifications.store(on, Ordering::SeqCst)
  }

  pub fn fail_meeting_delete(&self, on: bool) {
    self.fail_meeting_delete.store(on, Ordering::SeqCst)
  }

  pub fn fail_status_writes(&self, on: bool) {
    self.fail_status_writes.store(on, Ordering::SeqCst)
  }

  pub fn fail_participant_adds(&self, on: bool) {
    self.fail_participants.store(on, Ordering::SeqCst)
  }

  /// Make `search_profiles` fail once its gate, if any, opens.
  pub fn fail_search(&self, on: bool) { self.fail_search.store(on, Ordering::SeqCst) }

  /// Make `add_contact` fail for contacts owned by `owner`.
  pub fn fail_contacts_owned_by(&self, owner: Option<Uuid>) {
    *self.fail_contact_owner.lock() = owner;
  }

  /// Hold every `list_contacts` call until released.
  pub fn hold_contact_fetches(&self) {
    self.gates.lock().contacts = Some(Arc::new(Semaphore::new(0)));
  }

  pub fn release_contact_fetches(&self) {
    if let Some(gate) = self.gates.lock().contacts.take() {
      gate.close();
    }
  }

  /// Hold `search_profiles` calls for exactly `text` until released.
  pub fn hold_search(&self, text: &str) {
    self
      .gates
      .lock()
      .search
      .insert(text.to_owned(), Arc::new(Semaphore::new(0)));
  }

  pub fn release_search(&self, text: &str) {
    if let Some(gate) = self.gates.lock().search.remove(text) {
      gate.close();
    }
  }
}

impl Backend for ProbeStore {
  type Error = ProbeError;
}

impl ProfileStore for ProbeStore {
  async fn add_profile(&self, input: NewProfile) -> Result<Profile> {
    Ok(self.inner.add_profile(input).await?)
  }

  async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>> {
    self.profile_fetches.fetch_add(1, Ordering::SeqCst);
    Ok(self.inner.get_profile(user_id).await?)
  }

  async fn update_profile(&self, user_id: Uuid, patch: ProfilePatch) -> Result<Option<Profile>> {
    Ok(self.inner.update_profile(user_id, patch).await?)
  }

  async fn search_profiles(&self, query: &ProfileQuery) -> Result<Vec<Profile>> {
    let gate = self.gates.lock().search.get(&query.text).cloned();
    pass(gate).await;
    if self.fail_search.load(Ordering::SeqCst) {
      return Err(ProbeError::Injected("search_profiles"));
    }
    Ok(self.inner.search_profiles(query).await?)
  }

  async fn private_profiles(&self, user_ids: &[Uuid]) -> Result<HashSet<Uuid>> {
    Ok(self.inner.private_profiles(user_ids).await?)
  }

  async fn can_view_profile(&self, viewer: Uuid, target: Uuid) -> Result<bool> {
    Ok(self.inner.can_view_profile(viewer, target).await?)
  }

  async fn get_settings(&self, user_id: Uuid) -> Result<Option<UserSettings>> {
    Ok(self.inner.get_settings(user_id).await?)
  }

  async fn upsert_settings(&self, settings: UserSettings) -> Result<UserSettings> {
    Ok(self.inner.upsert_settings(settings).await?)
  }
}

impl ContactStore for ProbeStore {
  async fn list_contacts(&self, owner_id: Uuid) -> Result<Vec<Contact>> {
    self.contact_fetches.fetch_add(1, Ordering::SeqCst);
    let gate = self.gates.lock().contacts.clone();
    pass(gate).await;
    if self.fail_contacts.load(Ordering::SeqCst) {
      return Err(ProbeError::Injected("list_contacts"));
    }
    Ok(self.inner.list_contacts(owner_id).await?)
  }

  async fn get_contact(&self, contact_id: Uuid) -> Result<Option<Contact>> {
    Ok(self.inner.get_contact(contact_id).await?)
  }

  async fn find_linked_contact(
    &self,
    owner_id: Uuid,
    linked_user_id: Uuid,
  ) -> Result<Option<Contact>> {
    Ok(self.inner.find_linked_contact(owner_id, linked_user_id).await?)
  }

  async fn add_contact(&self, input: NewContact) -> Result<Contact> {
    if *self.fail_contact_owner.lock() == Some(input.owner_id) {
      return Err(ProbeError::Injected("add_contact"));
    }
    Ok(self.inner.add_contact(input).await?)
  }

  async fn update_contact(&self, contact_id: Uuid, patch: ContactPatch) -> Result<Option<Contact>> {
    Ok(self.inner.update_contact(contact_id, patch).await?)
  }

  async fn delete_contact(&self, contact_id: Uuid) -> Result<bool> {
    Ok(self.inner.delete_contact(contact_id).await?)
  }
}

impl RequestStore for ProbeStore {
  async fn requests_between(&self, a: Uuid, b: Uuid) -> Result<Vec<RelationshipRequest>> {
    Ok(self.inner.requests_between(a, b).await?)
  }

  async fn get_request(&self, request_id: Uuid) -> Result<Option<RelationshipRequest>> {
    Ok(self.inner.get_request(request_id).await?)
  }

  async fn add_request(&self, input: NewRequest) -> Result<RelationshipRequest> {
    Ok(self.inner.add_request(input).await?)
  }

  async fn set_request_status(
    &self,
    request_id: Uuid,
    status: RequestStatus,
  ) -> Result<Option<RelationshipRequest>> {
    Ok(self.inner.set_request_status(request_id, status).await?)
  }

  async fn list_requests(
    &self,
    user_id: Uuid,
    direction: Direction,
  ) -> Result<Vec<RequestWithProfile>> {
    Ok(self.inner.list_requests(user_id, direction).await?)
  }
}

impl MeetingStore for ProbeStore {
  async fn list_meetings(&self, user_id: Uuid) -> Result<Vec<Meeting>> {
    self.meeting_fetches.fetch_add(1, Ordering::SeqCst);
    Ok(self.inner.list_meetings(user_id).await?)
  }

  async fn get_meeting(&self, meeting_id: Uuid) -> Result<Option<Meeting>> {
    Ok(self.inner.get_meeting(meeting_id).await?)
  }

  async fn child_meetings(&self, parent_id: Uuid) -> Result<Vec<Meeting>> {
    Ok(self.inner.child_meetings(parent_id).await?)
  }

  async fn add_meeting(&self, input: NewMeeting) -> Result<Meeting> {
    Ok(self.inner.add_meeting(input).await?)
  }

  async fn update_meeting(&self, meeting_id: Uuid, patch: MeetingPatch) -> Result<Option<Meeting>> {
    Ok(self.inner.update_meeting(meeting_id, patch).await?)
  }

  async fn set_meeting_status(
    &self,
    meeting_id: Uuid,
    status: MeetingStatus,
  ) -> Result<Option<Meeting>> {
    if self.fail_status_writes.load(Ordering::SeqCst) {
      return Err(ProbeError::Injected("set_meeting_status"));
    }
    Ok(self.inner.set_meeting_status(meeting_id, status).await?)
  }

  async fn detach_children(&self, parent_id: Uuid) -> Result<u64> {
    Ok(self.inner.detach_children(parent_id).await?)
  }

  async fn clear_connection(&self, contact_id: Uuid) -> Result<u64> {
    Ok(self.inner.clear_connection(contact_id).await?)
  }

  async fn delete_meeting(&self, meeting_id: Uuid) -> Result<bool> {
    if self.fail_meeting_delete.load(Ordering::SeqCst) {
      return Err(ProbeError::Injected("delete_meeting"));
    }
    Ok(self.inner.delete_meeting(meeting_id).await?)
  }

  async fn list_participants(&self, meeting_id: Uuid) -> Result<Vec<Participant>> {
    Ok(self.inner.list_participants(meeting_id).await?)
  }

  async fn get_participant(&self, participant_id: Uuid) -> Result<Option<Participant>> {
    Ok(self.inner.get_participant(participant_id).await?)
  }

  async fn add_participants(
    &self,
    meeting_id: Uuid,
    input: Vec<NewParticipant>,
  ) -> Result<Vec<Participant>> {
    if self.fail_participants.load(Ordering::SeqCst) {
      return Err(ProbeError::Injected("add_participants"));
    }
    Ok(self.inner.add_participants(meeting_id, input).await?)
  }

  async fn record_response(
    &self,
    participant_id: Uuid,
    record: ResponseRecord,
  ) -> Result<Option<Participant>> {
    Ok(self.inner.record_response(participant_id, record).await?)
  }

  async fn delete_participants(&self, meeting_id: Uuid) -> Result<u64> {
    Ok(self.inner.delete_participants(meeting_id).await?)
  }

  async fn list_notes(&self, meeting_id: Uuid) -> Result<Vec<MeetingNote>> {
    Ok(self.inner.list_notes(meeting_id).await?)
  }

  async fn add_note(&self, meeting_id: Uuid, author_id: Uuid, body: String) -> Result<MeetingNote> {
    Ok(self.inner.add_note(meeting_id, author_id, body).await?)
  }

  async fn delete_notes(&self, meeting_id: Uuid) -> Result<u64> {
    Ok(self.inner.delete_notes(meeting_id).await?)
  }
}

impl IntroductionStore for ProbeStore {
  async fn add_introduction(&self, input: NewIntroduction) -> Result<Introduction> {
    Ok(self.inner.add_introduction(input).await?)
  }

  async fn get_introduction(&self, introduction_id: Uuid) -> Result<Option<Introduction>> {
    Ok(self.inner.get_introduction(introduction_id).await?)
  }

  async fn list_introductions(&self, user_id: Uuid) -> Result<Vec<Introduction>> {
    Ok(self.inner.list_introductions(user_id).await?)
  }

  async fn count_introductions_since(
    &self,
    sender_id: Uuid,
    since: DateTime<Utc>,
  ) -> Result<usize> {
    Ok(self.inner.count_introductions_since(sender_id, since).await?)
  }

  async fn set_intro_response(
    &self,
    introduction_id: Uuid,
    user_id: Uuid,
    response: IntroResponse,
  ) -> Result<Option<IntroParticipant>> {
    Ok(self.inner.set_intro_response(introduction_id, user_id, response).await?)
  }
}

impl NotificationStore for ProbeStore {
  async fn dispatch_notification(&self, input: NewNotification) -> Result<Notification> {
    if self.fail_notifications.load(Ordering::SeqCst) {
      return Err(ProbeError::Injected("dispatch_notification"));
    }
    Ok(self.inner.dispatch_notification(input).await?)
  }

  async fn list_notifications(&self, recipient_id: Uuid) -> Result<Vec<Notification>> {
    Ok(self.inner.list_notifications(recipient_id).await?)
  }

  async fn mark_notification_read(&self, notification_id: Uuid) -> Result<bool> {
    Ok(self.inner.mark_notification_read(notification_id).await?)
  }

  async fn mark_all_read(&self, recipient_id: Uuid) -> Result<u64> {
    Ok(self.inner.mark_all_read(recipient_id).await?)
  }
}

impl ChangeFeed for ProbeStore {
  fn subscribe(&self, table: Table, mask: EventMask) -> ChangeStream {
    self.inner.subscribe(table, mask)
  }
}
