//! Contacts: one-directional address-book entries owned by a user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::profile::Profile;

/// How a contact entered its owner's address book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactSource {
  /// Typed in by the owner.
  #[default]
  Manual,
  /// Materialised when a connection request was accepted.
  Connection,
  /// Copied from another user's public card.
  Card,
}

impl ContactSource {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Manual => "manual",
      Self::Connection => "connection",
      Self::Card => "card",
    }
  }
}

/// An address-book entry. Owned by exactly one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
  pub contact_id:     Uuid,
  pub owner_id:       Uuid,
  /// The user this entry was copied from, when it came from a connection or
  /// a scanned card.
  pub linked_user_id: Option<Uuid>,
  pub full_name:      String,
  pub job_title:      Option<String>,
  pub company:        Option<String>,
  pub email:          Option<String>,
  pub phone:          Option<String>,
  pub avatar_url:     Option<String>,
  pub notes:          Option<String>,
  pub source:         ContactSource,
  pub created_at:     DateTime<Utc>,
}

/// Input to [`crate::store::ContactStore::add_contact`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewContact {
  pub owner_id:       Uuid,
  pub linked_user_id: Option<Uuid>,
  pub full_name:      String,
  pub job_title:      Option<String>,
  pub company:        Option<String>,
  pub email:          Option<String>,
  pub phone:          Option<String>,
  pub avatar_url:     Option<String>,
  pub notes:          Option<String>,
  #[serde(default)]
  pub source:         ContactSource,
}

impl NewContact {
  /// A contact owned by `owner_id` carrying `profile`'s public fields.
  pub fn from_profile(
    owner_id: Uuid,
    profile: &Profile,
    source: ContactSource,
  ) -> Self {
    Self {
      owner_id,
      linked_user_id: Some(profile.user_id),
      full_name: profile.full_name.clone(),
      job_title: profile.job_title.clone(),
      company: profile.company.clone(),
      email: profile.email.clone(),
      phone: profile.phone.clone(),
      avatar_url: profile.avatar_url.clone(),
      notes: None,
      source,
    }
  }
}

/// Partial update of a [`Contact`]; see [`crate::profile::ProfilePatch`] for
/// the `Option<Option<_>>` convention.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactPatch {
  pub full_name: Option<String>,
  pub job_title: Option<Option<String>>,
  pub company:   Option<Option<String>>,
  pub email:     Option<Option<String>>,
  pub phone:     Option<Option<String>>,
  pub notes:     Option<Option<String>>,
}

impl ContactPatch {
  pub fn apply(self, mut contact: Contact) -> Contact {
    if let Some(v) = self.full_name {
      contact.full_name = v;
    }
    if let Some(v) = self.job_title {
      contact.job_title = v;
    }
    if let Some(v) = self.company {
      contact.company = v;
    }
    if let Some(v) = self.email {
      contact.email = v;
    }
    if let Some(v) = self.phone {
      contact.phone = v;
    }
    if let Some(v) = self.notes {
      contact.notes = v;
    }
    contact
  }
}
