//! Profiles (a signed-in user's public identity) and their visibility
//! settings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user's own profile record. Every authenticated user owns exactly one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
  pub user_id:    Uuid,
  pub full_name:  String,
  pub email:      Option<String>,
  pub phone:      Option<String>,
  pub job_title:  Option<String>,
  pub company:    Option<String>,
  pub bio:        Option<String>,
  /// Reference into blob storage; never the image bytes themselves.
  pub avatar_url: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Profile {
  /// Null every field except identifier, name and avatar.
  ///
  /// Applied to profiles whose owner has marked them private before they
  /// reach any cache or display surface.
  pub fn scrubbed(self) -> Self {
    Self {
      email: None,
      phone: None,
      job_title: None,
      company: None,
      bio: None,
      ..self
    }
  }
}

/// Input to [`crate::store::ProfileStore::add_profile`].
#[derive(Debug, Clone, Default)]
pub struct NewProfile {
  pub user_id:    Uuid,
  pub full_name:  String,
  pub email:      Option<String>,
  pub phone:      Option<String>,
  pub job_title:  Option<String>,
  pub company:    Option<String>,
  pub bio:        Option<String>,
  pub avatar_url: Option<String>,
}

/// Partial update of a [`Profile`]. `None` leaves the field untouched;
/// `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfilePatch {
  pub full_name:  Option<String>,
  pub email:      Option<Option<String>>,
  pub phone:      Option<Option<String>>,
  pub job_title:  Option<Option<String>>,
  pub company:    Option<Option<String>>,
  pub bio:        Option<Option<String>>,
  pub avatar_url: Option<Option<String>>,
}

impl ProfilePatch {
  /// Apply this patch on top of `profile`, returning the updated record.
  pub fn apply(self, mut profile: Profile) -> Profile {
    if let Some(v) = self.full_name {
      profile.full_name = v;
    }
    if let Some(v) = self.email {
      profile.email = v;
    }
    if let Some(v) = self.phone {
      profile.phone = v;
    }
    if let Some(v) = self.job_title {
      profile.job_title = v;
    }
    if let Some(v) = self.company {
      profile.company = v;
    }
    if let Some(v) = self.bio {
      profile.bio = v;
    }
    if let Some(v) = self.avatar_url {
      profile.avatar_url = v;
    }
    profile
  }
}

/// Per-user preferences. Written with an insert-or-update primitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
  pub user_id:             Uuid,
  /// When set, other users only ever see name and avatar.
  pub is_private:          bool,
  pub email_notifications: bool,
  pub updated_at:          DateTime<Utc>,
}

impl UserSettings {
  /// Settings applied to users who never saved any.
  pub fn defaults_for(user_id: Uuid) -> Self {
    Self {
      user_id,
      is_private: false,
      email_notifications: true,
      updated_at: DateTime::<Utc>::UNIX_EPOCH,
    }
  }
}

/// Parameters for [`crate::store::ProfileStore::search_profiles`].
#[derive(Debug, Clone, Default)]
pub struct ProfileQuery {
  /// Case-insensitive substring matched against name, email, title and
  /// company.
  pub text:    String,
  /// Usually the viewer; never returned in results.
  pub exclude: Option<Uuid>,
  pub limit:   Option<usize>,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn profile() -> Profile {
    Profile {
      user_id:    Uuid::new_v4(),
      full_name:  "Anna Karenina".into(),
      email:      Some("anna@example.com".into()),
      phone:      Some("+7 495 000".into()),
      job_title:  Some("Socialite".into()),
      company:    Some("St Petersburg".into()),
      bio:        Some("It's complicated".into()),
      avatar_url: Some("avatars/anna.png".into()),
      created_at: Utc::now(),
      updated_at: Utc::now(),
    }
  }

  #[test]
  fn scrub_keeps_only_identity() {
    let p = profile();
    let id = p.user_id;
    let s = p.scrubbed();
    assert_eq!(s.user_id, id);
    assert_eq!(s.full_name, "Anna Karenina");
    assert_eq!(s.avatar_url.as_deref(), Some("avatars/anna.png"));
    assert!(s.email.is_none());
    assert!(s.phone.is_none());
    assert!(s.job_title.is_none());
    assert!(s.company.is_none());
    assert!(s.bio.is_none());
  }

  #[test]
  fn patch_distinguishes_untouched_from_cleared() {
    let patch = ProfilePatch {
      company: Some(None),
      job_title: Some(Some("Author".into())),
      ..Default::default()
    };
    let p = patch.apply(profile());
    assert!(p.company.is_none());
    assert_eq!(p.job_title.as_deref(), Some("Author"));
    assert_eq!(p.email.as_deref(), Some("anna@example.com"));
  }
}
