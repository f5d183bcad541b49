//! Error types for `rapport-client`.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

/// A sub-step of a multi-write transition that committed before a later one
/// failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
  RequestAccepted,
  ContactForAcceptor,
  ContactForRequester,
  /// The meeting row exists; [`crate::Scheduler::invite`] finishes it.
  MeetingCreated(Uuid),
  MeetingUpdated,
  ResponseRecorded,
  ChildrenDetached,
  ParticipantsDeleted,
  NotesDeleted,
  ConnectionCleared,
}

#[derive(Debug, Clone, Error)]
pub enum Error {
  /// The remote store call failed. Never retried automatically.
  #[error("remote store error: {0}")]
  Remote(#[source] Arc<dyn std::error::Error + Send + Sync>),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("partial write after {completed:?}: {source}")]
  PartialWrite {
    completed: Vec<Step>,
    #[source]
    source:    Box<Error>,
  },

  #[error("not found: {0}")]
  NotFound(String),

  #[error("not signed in")]
  NotSignedIn,

  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("invalid input: {0}")]
  Invalid(String),

  #[error("invalid response link: {0}")]
  InvalidLink(String),
}

impl Error {
  /// Wrap any store error.
  pub fn remote<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Remote(Arc::new(e))
  }

  pub(crate) fn not_found(what: &str, id: impl std::fmt::Display) -> Self {
    Self::NotFound(format!("{what} {id}"))
  }

  /// Turn a failure after `completed` steps into a partial write. Nothing
  /// committed means nothing to report beyond the original error.
  pub(crate) fn after(self, completed: &[Step]) -> Self {
    if completed.is_empty() {
      return self;
    }
    tracing::error!(?completed, error = %self, "partial write");
    Self::PartialWrite { completed: completed.to_vec(), source: Box::new(self) }
  }
}

/// Rejected state-machine transitions leave state unchanged and surface as
/// conflicts.
impl From<rapport_core::Error> for Error {
  fn from(e: rapport_core::Error) -> Self { Self::Conflict(e.to_string()) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn after_without_steps_keeps_error() {
    let err = Error::NotFound("meeting".into()).after(&[]);
    assert!(matches!(err, Error::NotFound(_)));
  }

  #[test]
  fn after_with_steps_wraps_source() {
    let err = Error::Conflict("boom".into()).after(&[Step::RequestAccepted]);
    match err {
      Error::PartialWrite { completed, source } => {
        assert_eq!(completed, vec![Step::RequestAccepted]);
        assert!(matches!(*source, Error::Conflict(_)));
      }
      other => panic!("expected partial write, got {other:?}"),
    }
  }

  #[test]
  fn transition_errors_are_conflicts() {
    let core = rapport_core::Error::InvalidRequestTransition {
      from: "accepted",
      to:   "declined",
    };
    assert!(matches!(Error::from(core), Error::Conflict(_)));
  }
}
