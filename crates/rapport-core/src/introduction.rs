//! Introductions ("plugs"): one sender connecting two to five people.
//!
//! The sender owns the introduction; each participant owns only their own
//! response row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Smallest and largest number of people one introduction may connect.
pub const MIN_PARTICIPANTS: usize = 2;
pub const MAX_PARTICIPANTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntroResponse {
  Pending,
  Accepted,
  Declined,
}

impl IntroResponse {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Accepted => "accepted",
      Self::Declined => "declined",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntroParticipant {
  pub introduction_id: Uuid,
  pub user_id:         Uuid,
  pub response:        IntroResponse,
  pub responded_at:    Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Introduction {
  pub introduction_id: Uuid,
  pub sender_id:       Uuid,
  pub message:         Option<String>,
  pub created_at:      DateTime<Utc>,
  pub participants:    Vec<IntroParticipant>,
}

impl Introduction {
  /// The response row owned by `user_id`, if they are a participant.
  pub fn participant(&self, user_id: Uuid) -> Option<&IntroParticipant> {
    self.participants.iter().find(|p| p.user_id == user_id)
  }
}

/// Input to [`crate::store::IntroductionStore::add_introduction`]. Every
/// participant starts `pending`.
#[derive(Debug, Clone)]
pub struct NewIntroduction {
  pub sender_id:       Uuid,
  pub participant_ids: Vec<Uuid>,
  pub message:         Option<String>,
}
