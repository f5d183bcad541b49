//! Connection requests between two users.
//!
//! A request is a directed edge. Its status only ever moves forward:
//! `pending → accepted` or `pending → declined`. Rows are never deleted; a
//! terminal request is history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, profile::Profile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
  Pending,
  Accepted,
  Declined,
}

impl RequestStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Accepted => "accepted",
      Self::Declined => "declined",
    }
  }

  /// Pending and accepted edges block a new request between the same pair.
  pub fn is_active(self) -> bool { matches!(self, Self::Pending | Self::Accepted) }

  /// Validate a move to `to`. Only a pending request may change.
  pub fn transition(self, to: RequestStatus) -> Result<RequestStatus> {
    match (self, to) {
      (Self::Pending, Self::Accepted | Self::Declined) => Ok(to),
      _ => Err(Error::InvalidRequestTransition {
        from: self.as_str(),
        to:   to.as_str(),
      }),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipRequest {
  pub request_id:   Uuid,
  pub requester_id: Uuid,
  pub target_id:    Uuid,
  pub status:       RequestStatus,
  pub created_at:   DateTime<Utc>,
  pub updated_at:   DateTime<Utc>,
}

impl RelationshipRequest {
  /// Whether this edge connects `a` and `b`, in either direction.
  pub fn joins(&self, a: Uuid, b: Uuid) -> bool {
    (self.requester_id == a && self.target_id == b)
      || (self.requester_id == b && self.target_id == a)
  }
}

/// Input to [`crate::store::RequestStore::add_request`]. New requests are
/// always `pending`.
#[derive(Debug, Clone)]
pub struct NewRequest {
  pub requester_id: Uuid,
  pub target_id:    Uuid,
}

/// Which side of an edge the viewer sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
  /// The viewer is the target.
  Incoming,
  /// The viewer is the requester.
  Outgoing,
}

/// A request joined with the other party's profile, as the UI lists them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestWithProfile {
  pub request:     RelationshipRequest,
  /// Absent when the other user's profile has vanished.
  pub counterpart: Option<Profile>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn only_pending_moves() {
    use RequestStatus::*;
    assert_eq!(Pending.transition(Accepted), Ok(Accepted));
    assert_eq!(Pending.transition(Declined), Ok(Declined));
    assert!(Accepted.transition(Declined).is_err());
    assert!(Declined.transition(Accepted).is_err());
    assert!(Pending.transition(Pending).is_err());
  }

  #[test]
  fn declined_is_not_active() {
    assert!(RequestStatus::Pending.is_active());
    assert!(RequestStatus::Accepted.is_active());
    assert!(!RequestStatus::Declined.is_active());
  }
}
